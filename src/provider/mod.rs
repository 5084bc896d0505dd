//! Vision-model providers behind a common capability interface.
//!
//! The whole pipeline consumes exactly one operation:
//! `generate(prompt, optional image) -> text`. Providers form a closed set
//! selected by name through [`create_provider`], which fails fast on an
//! unknown name or a missing API key — configuration errors surface at
//! construction time, never on the first call mid-batch.

mod anthropic;
mod gemini;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;

use crate::error::ExtractError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use std::sync::Arc;

/// Provider names accepted by [`create_provider`].
pub const AVAILABLE_PROVIDERS: &[&str] = &["anthropic", "gemini"];

/// A base64-encoded image attachment for a vision request.
#[derive(Debug, Clone)]
pub struct ImageData {
    /// Base64-encoded image bytes.
    pub data: String,
    /// MIME type, e.g. `image/png`.
    pub mime_type: String,
}

impl ImageData {
    /// Wrap already-encoded PNG bytes.
    pub fn from_png_bytes(bytes: &[u8]) -> Self {
        Self {
            data: STANDARD.encode(bytes),
            mime_type: "image/png".to_string(),
        }
    }

    /// Read and encode an image file. PNG is assumed unless the extension
    /// says JPEG; the capture stage only ever writes PNG.
    pub fn from_file(path: &Path) -> Result<Self, ExtractError> {
        let bytes = std::fs::read(path).map_err(|e| ExtractError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mime_type = match path.extension().and_then(|e| e.to_str()) {
            Some("jpg") | Some("jpeg") => "image/jpeg",
            _ => "image/png",
        };
        Ok(Self {
            data: STANDARD.encode(&bytes),
            mime_type: mime_type.to_string(),
        })
    }
}

/// A vision-capable model provider.
///
/// Implementations are `Send + Sync` trait objects so the gate and the
/// transcription service can share one provider across concurrent calls.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Stable provider name, for error messages and logs.
    fn name(&self) -> &'static str;

    /// Send `prompt` (and optionally an image) to the model; return its
    /// textual response.
    async fn generate(
        &self,
        prompt: &str,
        image: Option<&ImageData>,
    ) -> Result<String, ExtractError>;
}

impl std::fmt::Debug for dyn VisionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionProvider")
            .field("name", &self.name())
            .finish()
    }
}

/// Instantiate a provider by name.
///
/// `name` is matched case-insensitively; `"claude"` is an alias for
/// `"anthropic"`. When `api_key` is `None`, the key is read from the
/// provider's environment variable. Unknown names and missing keys are
/// reported immediately.
pub fn create_provider(
    name: &str,
    api_key: Option<&str>,
    model: Option<&str>,
    timeout_secs: u64,
) -> Result<Arc<dyn VisionProvider>, ExtractError> {
    match name.to_ascii_lowercase().as_str() {
        "anthropic" | "claude" => {
            let key = resolve_key(api_key, "anthropic", "ANTHROPIC_API_KEY")?;
            Ok(Arc::new(AnthropicProvider::new(key, model, timeout_secs)?))
        }
        "gemini" => {
            let key = resolve_key(api_key, "gemini", "GEMINI_API_KEY")?;
            Ok(Arc::new(GeminiProvider::new(key, model, timeout_secs)?))
        }
        _ => Err(ExtractError::UnknownProvider {
            name: name.to_string(),
            available: AVAILABLE_PROVIDERS.join(", "),
        }),
    }
}

fn resolve_key(
    explicit: Option<&str>,
    provider: &str,
    env_var: &str,
) -> Result<String, ExtractError> {
    if let Some(key) = explicit {
        if !key.is_empty() {
            return Ok(key.to_string());
        }
    }
    match std::env::var(env_var) {
        Ok(key) if !key.is_empty() => Ok(key),
        _ => Err(ExtractError::MissingApiKey {
            provider: provider.to_string(),
            env_var: env_var.to_string(),
        }),
    }
}

/// Shared HTTP client construction for both providers.
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, ExtractError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ExtractError::Internal(format!("HTTP client build failed: {e}")))
}

/// Map a reqwest transport error to the crate error taxonomy.
pub(crate) fn transport_error(
    provider: &'static str,
    timeout_secs: u64,
    e: reqwest::Error,
) -> ExtractError {
    if e.is_timeout() {
        ExtractError::ApiTimeout {
            provider: provider.to_string(),
            elapsed_ms: timeout_secs * 1000,
        }
    } else {
        ExtractError::ApiError {
            message: format!("{provider}: {e}"),
        }
    }
}

/// Map a non-success HTTP status to the crate error taxonomy.
pub(crate) fn status_error(
    provider: &'static str,
    status: reqwest::StatusCode,
    retry_after_secs: Option<u64>,
    body: String,
) -> ExtractError {
    match status.as_u16() {
        401 | 403 => ExtractError::AuthError {
            provider: provider.to_string(),
            detail: body,
        },
        429 => ExtractError::RateLimitExceeded {
            provider: provider.to_string(),
            retry_after_secs,
        },
        _ => ExtractError::ApiError {
            message: format!("{provider}: HTTP {status}: {body}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_fails_fast() {
        let err = create_provider("mistral", Some("key"), None, 60).unwrap_err();
        match err {
            ExtractError::UnknownProvider { name, available } => {
                assert_eq!(name, "mistral");
                assert!(available.contains("anthropic"));
                assert!(available.contains("gemini"));
            }
            other => panic!("expected UnknownProvider, got {other:?}"),
        }
    }

    #[test]
    fn claude_is_an_alias_for_anthropic() {
        let provider = create_provider("Claude", Some("sk-test"), None, 60).unwrap();
        assert_eq!(provider.name(), "anthropic");
    }

    #[test]
    fn empty_explicit_key_falls_through_to_env() {
        // An empty explicit key must not be accepted as configured.
        let err = resolve_key(Some(""), "gemini", "PDF2TABLE_TEST_UNSET_KEY").unwrap_err();
        assert!(matches!(err, ExtractError::MissingApiKey { .. }));
    }

    #[test]
    fn image_data_encodes_png_bytes() {
        let img = ImageData::from_png_bytes(&[0x89, 0x50, 0x4E, 0x47]);
        assert_eq!(img.mime_type, "image/png");
        let decoded = STANDARD.decode(&img.data).unwrap();
        assert_eq!(decoded, vec![0x89, 0x50, 0x4E, 0x47]);
    }

    #[test]
    fn status_error_classification() {
        let e = status_error("anthropic", reqwest::StatusCode::UNAUTHORIZED, None, "bad key".into());
        assert!(matches!(e, ExtractError::AuthError { .. }));
        let e = status_error("gemini", reqwest::StatusCode::TOO_MANY_REQUESTS, Some(30), String::new());
        assert!(matches!(
            e,
            ExtractError::RateLimitExceeded {
                retry_after_secs: Some(30),
                ..
            }
        ));
        let e = status_error("gemini", reqwest::StatusCode::INTERNAL_SERVER_ERROR, None, "boom".into());
        assert!(matches!(e, ExtractError::ApiError { .. }));
    }
}

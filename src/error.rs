//! Error types for the pdf2table library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExtractError`] — **Fatal**: the run cannot proceed at all for this
//!   document (bad input file, unknown provider, missing API key). Returned
//!   as `Err(ExtractError)` from the top-level `extract*` functions.
//!
//! * [`ItemError`] — **Non-fatal**: a single candidate image failed (model
//!   call error, file move/delete error) but the rest of the batch is fine.
//!   Accumulated into the failure lists on
//!   [`crate::output::ExtractionOutput`] and
//!   [`crate::output::TranscriptionOutput`] so callers can inspect partial
//!   success rather than losing a whole batch to one bad item.
//!
//! The separation lets callers decide their own tolerance: abort on the
//! first item failure, log and continue, or collect everything for a
//! post-run report. Note that a candidate *rejected* by a heuristic or by
//! the verification gate is not an error at all — rejections are reported
//! as skipped items, never through these types.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2table library.
///
/// Item-level failures use [`ItemError`] and are stored in the batch
/// outputs rather than propagated here.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided, or it was wrong.
    #[error("PDF '{path}' is encrypted; provide the correct password.")]
    PasswordRequired { path: PathBuf },

    // ── Provider configuration errors (fail fast, at construction) ───────
    /// Provider name did not match any registered provider.
    #[error("Unknown vision provider '{name}'. Available options are: {available}")]
    UnknownProvider { name: String, available: String },

    /// No API key was supplied and none was found in the environment.
    #[error("Missing API key for provider '{provider}'.\nSet {env_var} or pass the key explicitly.")]
    MissingApiKey { provider: String, env_var: String },

    // ── Provider call errors ──────────────────────────────────────────────
    /// The vision API returned an authentication error (401/403).
    #[error("Authentication error from provider '{provider}': {detail}")]
    AuthError { provider: String, detail: String },

    /// The vision API returned HTTP 429 — caller should back off.
    #[error("Rate limit exceeded for provider '{provider}'")]
    RateLimitExceeded {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    /// The vision API call timed out.
    #[error("API call to provider '{provider}' timed out after {elapsed_ms}ms")]
    ApiTimeout { provider: String, elapsed_ms: u64 },

    /// The vision API returned a non-retryable error.
    #[error("Vision API error: {message}")]
    ApiError { message: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file or directory.
    #[error("Failed to write output '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single candidate image.
///
/// Stored in the failure lists of the batch outputs. The overall run
/// continues past any number of these.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ItemError {
    /// The verification call failed after all retries.
    #[error("'{image}': verification call failed after {retries} retries: {detail}")]
    VerificationFailed {
        image: String,
        retries: u32,
        detail: String,
    },

    /// The transcription call failed.
    #[error("'{image}': transcription call failed: {detail}")]
    TranscriptionFailed { image: String, detail: String },

    /// The model returned an empty transcription.
    #[error("'{image}': model returned an empty transcription")]
    EmptyTranscription { image: String },

    /// A file move, write, or delete failed for this item.
    #[error("'{path}': file operation failed: {detail}")]
    FileOpFailed { path: String, detail: String },

    /// The item was not processed because cancellation was requested.
    #[error("'{image}': cancelled before processing")]
    Cancelled { image: String },
}

impl ItemError {
    /// The image (or file) this error is about, for failure reports.
    pub fn item(&self) -> &str {
        match self {
            ItemError::VerificationFailed { image, .. } => image,
            ItemError::TranscriptionFailed { image, .. } => image,
            ItemError::EmptyTranscription { image } => image,
            ItemError::FileOpFailed { path, .. } => path,
            ItemError::Cancelled { image } => image,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_display_lists_options() {
        let e = ExtractError::UnknownProvider {
            name: "gpt5".into(),
            available: "anthropic, gemini".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("gpt5"), "got: {msg}");
        assert!(msg.contains("anthropic, gemini"), "got: {msg}");
    }

    #[test]
    fn missing_api_key_display_names_env_var() {
        let e = ExtractError::MissingApiKey {
            provider: "gemini".into(),
            env_var: "GEMINI_API_KEY".into(),
        };
        assert!(e.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn item_error_reports_its_item() {
        let e = ItemError::VerificationFailed {
            image: "doc_page_2_table_1_20250101_120000.png".into(),
            retries: 3,
            detail: "timeout".into(),
        };
        assert_eq!(e.item(), "doc_page_2_table_1_20250101_120000.png");
        assert!(e.to_string().contains("3 retries"));
    }

    #[test]
    fn cancelled_display() {
        let e = ItemError::Cancelled {
            image: "x.png".into(),
        };
        assert!(e.to_string().contains("cancelled"));
    }
}

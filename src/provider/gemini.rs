//! Google Gemini generateContent provider.
//!
//! Prompt text and inline image data go in one `parts` array; the response
//! text is the concatenation of the first candidate's text parts.

use super::{http_client, status_error, transport_error, ImageData, VisionProvider};
use crate::error::ExtractError;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-1.5-pro-002";

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl GeminiProvider {
    pub fn new(
        api_key: String,
        model: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self, ExtractError> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            api_key,
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            timeout_secs,
        })
    }

    fn endpoint(&self) -> String {
        format!("{API_BASE}/{}:generateContent", self.model)
    }
}

/// Build the request body for one generate call.
fn request_body(prompt: &str, image: Option<&ImageData>) -> Value {
    let mut parts = vec![json!({ "text": prompt })];
    if let Some(img) = image {
        parts.push(json!({
            "inline_data": {
                "mime_type": img.mime_type,
                "data": img.data,
            }
        }));
    }
    json!({ "contents": [{ "parts": parts }] })
}

/// Concatenate the text parts of the first response candidate.
fn response_text(body: &Value) -> String {
    body.get("candidates")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .and_then(|c| c.pointer("/content/parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

#[async_trait]
impl VisionProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate(
        &self,
        prompt: &str,
        image: Option<&ImageData>,
    ) -> Result<String, ExtractError> {
        let body = request_body(prompt, image);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("gemini", self.timeout_secs, e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let text = response.text().await.unwrap_or_default();
            return Err(status_error("gemini", status, retry_after, text));
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|e| transport_error("gemini", self.timeout_secs, e))?;
        let text = response_text(&parsed);
        debug!("gemini: {} response chars", text.len());
        Ok(text)
    }
}

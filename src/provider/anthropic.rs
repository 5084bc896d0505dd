//! Anthropic Messages API provider.
//!
//! Images travel as base64 blocks ahead of the text prompt in a single
//! user turn; the response text is the concatenation of all `text` blocks.

use super::{http_client, status_error, transport_error, ImageData, VisionProvider};
use crate::error::ExtractError;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
/// Dense tables can exceed 1k output tokens; 4096 covers real-world tables
/// without unbounded cost.
const MAX_TOKENS: u32 = 4096;

pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl AnthropicProvider {
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
}

/// Build the request body for one generate call.
fn request_body(model: &str, prompt: &str, image: Option<&ImageData>) -> Value {
    let mut content = Vec::new();
    if let Some(img) = image {
        content.push(json!({
            "type": "image",
            "source": {
                "type": "base64",
                "media_type": img.mime_type,
                "data": img.data,
            },
        }));
    }
    content.push(json!({ "type": "text", "text": prompt }));

    json!({
        "model": model,
        "max_tokens": MAX_TOKENS,
        "messages": [{ "role": "user", "content": content }],
    })
}

/// Concatenate the `text` blocks of a Messages API response.
fn response_text(body: &Value) -> String {
    body.get("content")
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

#[async_trait]
impl VisionProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn generate(
        &self,
        prompt: &str,
        image: Option<&ImageData>,
    ) -> Result<String, ExtractError> {
        let body = request_body(&self.model, prompt, image);

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("anthropic", self.timeout_secs, e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let text = response.text().await.unwrap_or_default();
            return Err(status_error("anthropic", status, retry_after, text));
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|e| transport_error("anthropic", self.timeout_secs, e))?;
        let text = response_text(&parsed);
        debug!("anthropic: {} response chars", text.len());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_places_image_before_prompt() {
        let img = ImageData {
            data: "QUJD".into(),
            mime_type: "image/png".into(),
        };
        let body = request_body("claude-3-5-sonnet-20241022", "is this a table?", Some(&img));
        let content = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(content[0]["type"], "image");
        assert_eq!(content[0]["source"]["media_type"], "image/png");
        assert_eq!(content[1]["type"], "text");
        assert_eq!(content[1]["text"], "is this a table?");
    }

    #[test]
    fn request_body_without_image_is_text_only() {
        let body = request_body("m", "repair this table", None);
        let content = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(content.len(), 1);
        assert_eq!(content[0]["type"], "text");
    }

    #[test]
    fn response_text_concatenates_text_blocks() {
        let body = json!({
            "content": [
                { "type": "text", "text": "<table>" },
                { "type": "tool_use", "id": "x" },
                { "type": "text", "text": "</table>" },
            ]
        });
        assert_eq!(response_text(&body), "<table></table>");
    }

    #[test]
    fn response_text_tolerates_missing_content() {
        assert_eq!(response_text(&json!({})), "");
    }
}

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::generation::{GenerationBackend, GenerationError};
use crate::llm::media::mime_for_base64;
use crate::utils::http::get_http_client;
use crate::utils::timing::log_llm_timing;

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
    Other(Value),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

/// `GenerationBackend` speaking the Gemini `generateContent` REST API.
#[derive(Debug, Clone)]
pub struct GeminiBackend {
    api_key: String,
    base_url: String,
    text_model: String,
    image_model: String,
    timeout: Duration,
}

impl GeminiBackend {
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_key: config.gemini_api_key.clone(),
            base_url: config.gemini_base_url.clone(),
            text_model: config.gemini_text_model.clone(),
            image_model: config.gemini_image_model.clone(),
            timeout: Duration::from_secs(config.gemini_request_timeout_seconds.max(1)),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, model
        )
    }

    async fn call_api(&self, model: &str, payload: Value) -> Result<GeminiResponse, GenerationError> {
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(target: "llm.gemini", model, request = %redact_payload(&payload));
        }

        let response = get_http_client()
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                warn!(
                    timeout = err.is_timeout(),
                    connect = err.is_connect(),
                    "Gemini request was not delivered: {err}"
                );
                GenerationError::Transport(err.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let (message, logged_body) = read_error_body(&body);
            warn!(%status, body = %logged_body, "Gemini rejected the request");
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message: message.unwrap_or(logged_body),
            });
        }

        let value = response.json::<GeminiResponse>().await?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(target: "llm.gemini", model, response = %describe_response(&value));
        }
        Ok(value)
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    async fn classify_image(
        &self,
        image_base64: &str,
        prompt: &str,
    ) -> Result<String, GenerationError> {
        let payload = json!({
            "contents": [{ "role": "user", "parts": build_image_parts(image_base64, prompt) }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "isValid": { "type": "BOOLEAN" },
                        "reason": { "type": "STRING" }
                    },
                    "required": ["isValid", "reason"]
                }
            }
        });

        let model = self.text_model.as_str();
        log_llm_timing("gemini", model, "validate_image", None, || async move {
            let response = self.call_api(model, payload).await?;
            Ok::<_, GenerationError>(extract_text_from_response(response))
        })
        .await
    }

    async fn render_image(
        &self,
        image_base64: &str,
        prompt: &str,
    ) -> Result<Option<String>, GenerationError> {
        let payload = json!({
            "contents": [{ "role": "user", "parts": build_image_parts(image_base64, prompt) }],
            "generationConfig": { "responseModalities": ["IMAGE"] }
        });

        let model = self.image_model.as_str();
        let metadata = json!({ "promptChars": prompt.chars().count() });
        log_llm_timing("gemini", model, "generate_image", Some(metadata), || async move {
            let response = self.call_api(model, payload).await?;
            Ok::<_, GenerationError>(extract_first_image(response))
        })
        .await
    }

    fn image_model(&self) -> &str {
        &self.image_model
    }
}

fn build_image_parts(image_base64: &str, prompt: &str) -> Vec<Value> {
    vec![
        json!({
            "inlineData": {
                "mimeType": mime_for_base64(image_base64),
                "data": image_base64
            }
        }),
        json!({ "text": prompt }),
    ]
}

fn clip(value: &str, limit: usize) -> String {
    match value.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}... (truncated)", &value[..cut]),
        None => value.to_string(),
    }
}

/// Copy of a request body that is safe to log: prompt text is clipped and
/// inline image data is replaced by its length.
fn redact_payload(payload: &Value) -> Value {
    let mut redacted = payload.clone();
    let parts = redacted
        .get_mut("contents")
        .and_then(Value::as_array_mut)
        .into_iter()
        .flatten()
        .filter_map(|content| content.get_mut("parts").and_then(Value::as_array_mut))
        .flatten();
    for part in parts {
        if let Some(Value::String(text)) = part.get_mut("text") {
            *text = clip(text, 200);
        }
        if let Some(Value::Object(inline)) = part.get_mut("inlineData") {
            let bytes = inline.get("data").and_then(Value::as_str).map_or(0, str::len);
            inline.insert("data".to_string(), json!(format!("<{bytes} base64 chars>")));
        }
    }
    redacted
}

fn describe_response(response: &GeminiResponse) -> Value {
    let texts: Vec<&str> = response_parts(response)
        .filter_map(|part| match part {
            GeminiPart::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    let images = response_parts(response)
        .filter(|part| {
            matches!(part, GeminiPart::InlineData { inline_data } if inline_data.mime_type.starts_with("image/"))
        })
        .count();
    let first_text = texts.iter().find(|text| !text.trim().is_empty());

    json!({
        "candidates": response.candidates.as_ref().map_or(0, Vec::len),
        "texts": texts.len(),
        "images": images,
        "firstText": first_text.map(|text| clip(text, 200)),
    })
}

/// Returns the service's own error message when the body carries one, plus a
/// clipped copy of the body for the log.
fn read_error_body(body: &str) -> (Option<String>, String) {
    let body = body.trim();
    if body.is_empty() {
        return (None, "empty response body".to_string());
    }
    let Ok(parsed) = serde_json::from_str::<Value>(body) else {
        return (None, clip(body, 2000));
    };
    let message = ["/error/message", "/message"]
        .iter()
        .find_map(|path| parsed.pointer(path).and_then(Value::as_str))
        .map(str::to_string);
    (message, clip(&parsed.to_string(), 2000))
}

fn response_parts(response: &GeminiResponse) -> impl Iterator<Item = &GeminiPart> {
    response
        .candidates
        .iter()
        .flatten()
        .filter_map(|candidate| candidate.content.as_ref())
        .filter_map(|content| content.parts.as_ref())
        .flatten()
}

fn extract_text_from_response(response: GeminiResponse) -> String {
    let text_parts: Vec<&str> = response_parts(&response)
        .filter_map(|part| match part {
            GeminiPart::Text { text } if !text.trim().is_empty() => Some(text.as_str()),
            _ => None,
        })
        .collect();
    text_parts.join("\n")
}

/// Only the first candidate is considered, matching one image per call.
fn extract_first_image(response: GeminiResponse) -> Option<String> {
    let candidate = response.candidates?.into_iter().next()?;
    candidate
        .content?
        .parts?
        .into_iter()
        .find_map(|part| match part {
            GeminiPart::InlineData { inline_data } if !inline_data.data.is_empty() => {
                Some(inline_data.data)
            }
            _ => None,
        })
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProxyError;

/// Every image part is forwarded with this detail level, regardless of what
/// the caller sent.
const FORCED_IMAGE_DETAIL: &str = "high";

/// Inbound body of `POST /api/v1/chat/completions`. Unknown top-level fields
/// (temperature, top_p, ...) are captured and forwarded verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub stream: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: Content,
}

/// Message content is either a plain string or an ordered list of typed
/// parts. Any other shape lands in the `Raw` arm and is classified during
/// normalization; it never survives to the outbound request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
    Raw(Value),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
    #[serde(default)]
    pub detail: String,
}

/// Normalize every message in place and report whether any part anywhere in
/// the conversation references image content.
///
/// Message and part ordering is preserved exactly. Validation failure aborts
/// the whole request; there is no partial success.
///
/// # Errors
///
/// Returns `ProxyError::InvalidContent` for a malformed part and
/// `ProxyError::UnsupportedContentType` when content is neither a string nor
/// an array of parts.
pub fn normalize_messages(messages: &mut [Message]) -> Result<bool, ProxyError> {
    let mut has_images = false;

    for message in messages.iter_mut() {
        match &mut message.content {
            Content::Text(_) => {}
            Content::Parts(parts) => {
                for part in parts.iter_mut() {
                    if let ContentPart::ImageUrl { image_url } = part {
                        has_images = true;
                        image_url.detail = FORCED_IMAGE_DETAIL.to_string();
                    }
                }
            }
            Content::Raw(value) => {
                // The typed arms did not match; classify the raw value to
                // produce a precise error for the whole request.
                let parts = parts_from_raw(value)?;
                has_images |= parts
                    .iter()
                    .any(|part| matches!(part, ContentPart::ImageUrl { .. }));
                message.content = Content::Parts(parts);
            }
        }
    }

    Ok(has_images)
}

fn parts_from_raw(value: &Value) -> Result<Vec<ContentPart>, ProxyError> {
    let Value::Array(elements) = value else {
        return Err(ProxyError::UnsupportedContentType(format!(
            "message content must be a string or an array of parts, got {}",
            json_type_name(value)
        )));
    };

    let mut parts = Vec::with_capacity(elements.len());
    for element in elements {
        let Value::Object(map) = element else {
            return Err(ProxyError::InvalidContent(format!(
                "content part must be an object, got {}",
                json_type_name(element)
            )));
        };
        let Some(kind) = map.get("type").and_then(Value::as_str) else {
            return Err(ProxyError::InvalidContent(
                "content part is missing a string 'type' discriminator".to_string(),
            ));
        };
        match kind {
            "text" => {
                let Some(text) = map.get("text").and_then(Value::as_str) else {
                    return Err(ProxyError::InvalidContent(
                        "text part is missing a string 'text' field".to_string(),
                    ));
                };
                parts.push(ContentPart::Text {
                    text: text.to_string(),
                });
            }
            "image_url" => {
                let url = map
                    .get("image_url")
                    .and_then(Value::as_object)
                    .and_then(|image_url| image_url.get("url"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ProxyError::InvalidContent(
                            "image_url part is missing a string 'image_url.url' field".to_string(),
                        )
                    })?;
                parts.push(ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: url.to_string(),
                        detail: FORCED_IMAGE_DETAIL.to_string(),
                    },
                });
            }
            other => {
                return Err(ProxyError::InvalidContent(format!(
                    "unknown content part type '{other}'"
                )));
            }
        }
    }

    Ok(parts)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

use axum::response::{IntoResponse, Response};
use http::header::CONTENT_TYPE;

/// Static models descriptor served on `GET /api/v1/models`.
const MODELS_RESPONSE_JSON: &str = r#"{
  "data": [
    {
      "created": 0,
      "id": "gpt-4o-mini",
      "context_length": 128000,
      "architecture": {
        "modality": "text+image->text",
        "input_modalities": ["text", "image", "file"],
        "output_modalities": ["text"],
        "tokenizer": "GPT"
      },
      "object": "model",
      "owned_by": "openai"
    },
    {
      "created": 1,
      "id": "gemini-2.0-flash",
      "context_length": 1048576,
      "architecture": {
        "modality": "text+image->text",
        "input_modalities": ["text", "image", "file"],
        "output_modalities": ["text"],
        "tokenizer": "Gemini"
      },
      "object": "model",
      "owned_by": "google"
    },
    {
      "created": 2,
      "id": "deepseek-v3",
      "context_length": 65536,
      "architecture": {
        "modality": "text->text",
        "input_modalities": ["text"],
        "output_modalities": ["text"],
        "tokenizer": "DeepSeek"
      },
      "object": "model",
      "owned_by": "deepseek"
    }
  ],
  "object": "list"
}"#;

pub async fn handler() -> Response {
    (
        [(CONTENT_TYPE, "application/json; charset=utf-8")],
        MODELS_RESPONSE_JSON,
    )
        .into_response()
}

//! JSON encoding of request bodies and decoding of response bodies.
//!
//! # Design
//! All bodies go through `serde_json`, so string escaping (quotes,
//! backslashes, control characters) is handled by the encoder rather than by
//! hand. Error bodies are parsed best-effort: a structured `{"error": ..}` or
//! `{"message": ..}` object wins, otherwise the raw body becomes the message.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ApiError;
use crate::http::HttpResponse;

pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string(value).map_err(|e| ApiError::Serialization(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::Deserialization(e.to_string()))
}

/// Map a non-2xx response to `ApiError::Http`.
pub fn decode_error(status: u16, body: &str) -> ApiError {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let field = |names: &[&str]| -> Option<String> {
        let object = parsed.as_ref()?.as_object()?;
        names
            .iter()
            .find_map(|name| object.get(*name).and_then(|v| v.as_str()))
            .map(str::to_string)
    };

    let message = field(&["error", "message", "detail"]).unwrap_or_else(|| {
        if body.trim().is_empty() {
            format!("HTTP {status}")
        } else {
            body.to_string()
        }
    });

    ApiError::Http {
        status,
        message,
        code: field(&["code", "error_code"]),
    }
}

/// Reject anything outside `[200, 300)`.
pub fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        Ok(())
    } else {
        Err(decode_error(response.status, &response.body))
    }
}

/// Status check followed by typed decoding of the body.
pub fn parse_json<T: DeserializeOwned>(response: HttpResponse) -> Result<T, ApiError> {
    check_status(&response)?;
    decode(&response.body)
}

/// Status check only; the body of an acknowledgment is ignored.
pub fn parse_empty(response: HttpResponse) -> Result<(), ApiError> {
    check_status(&response)
}

//! Client error taxonomy and HTTP status mapping

use std::collections::BTreeMap;

use medivault_core::{LifecycleError, ValidationErrors};
use serde_json::Value;

/// Field name → messages, as the server reports a rejected form
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("Validation failed: {}", format_fields(.0))]
    Validation(FieldErrors),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Not authorized: {0}")]
    Authorization(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Busy: {0} already has a change in flight")]
    Busy(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

fn format_fields(fields: &FieldErrors) -> String {
    fields
        .iter()
        .map(|(field, messages)| format!("{}: {}", field, messages.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ApiError {
    /// Map a non-success response to an error.
    ///
    /// 401 lands here only after the refresh-and-retry path has given up.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let json: Option<Value> = serde_json::from_slice(body).ok();
        let detail = json
            .as_ref()
            .and_then(message_of)
            .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());

        match status {
            400 => match json {
                Some(Value::Object(map)) => {
                    if let Some(message) = map.get("error").and_then(first_text) {
                        return ApiError::InvalidState(message);
                    }
                    if let Some(message) = map.get("patient_id").and_then(first_text) {
                        if message.to_lowercase().contains("no patient found") {
                            return ApiError::NotFound(message);
                        }
                    }
                    ApiError::Validation(field_map(&map))
                }
                _ => ApiError::InvalidState(detail),
            },
            401 => ApiError::Auth(or_default(detail, "session expired")),
            403 => ApiError::Authorization(or_default(detail, "permission denied")),
            404 => ApiError::NotFound(or_default(detail, "resource not found")),
            _ => ApiError::Network(format!("unexpected status {}: {}", status, detail)),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Auth(_))
    }

    /// Messages for one field of a validation error
    pub fn field_messages(&self, field: &str) -> Vec<String> {
        match self {
            ApiError::Validation(fields) => fields.get(field).cloned().unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

fn or_default(detail: String, fallback: &str) -> String {
    if detail.is_empty() {
        fallback.to_string()
    } else {
        detail
    }
}

fn message_of(value: &Value) -> Option<String> {
    let map = value.as_object()?;
    map.get("detail")
        .or_else(|| map.get("error"))
        .and_then(first_text)
}

fn first_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(first_text),
        _ => None,
    }
}

fn field_map(map: &serde_json::Map<String, Value>) -> FieldErrors {
    map.iter()
        .map(|(field, value)| {
            let messages = match value {
                Value::Array(items) => items.iter().filter_map(first_text).collect(),
                Value::String(s) => vec![s.clone()],
                other => vec![other.to_string()],
            };
            (field.clone(), messages)
        })
        .collect()
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        for error in errors.0 {
            fields.entry(error.field).or_default().push(error.message);
        }
        ApiError::Validation(fields)
    }
}

impl From<LifecycleError> for ApiError {
    fn from(error: LifecycleError) -> Self {
        match error {
            LifecycleError::Validation(errors) => errors.into(),
            LifecycleError::InvalidState { .. } => ApiError::InvalidState(error.to_string()),
            LifecycleError::NotPermitted(reason) => ApiError::Authorization(reason),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        ApiError::Network(error.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        ApiError::Network(format!("unparseable response body: {}", error))
    }
}

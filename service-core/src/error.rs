//! Error payloads returned by the identity provider and backing store.
//!
//! Both services answer failed requests with a JSON body that is either
//! `{"detail": "..."}`, a map of field names to message lists
//! (`{"username": ["already taken"]}`), or occasionally a bare string.
//! [`ErrorPayload`] turns those shapes into a single line fit for a user.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A field name paired with the label shown to the user.
pub type FieldLabel<'a> = (&'a str, &'a str);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorPayload(Value);

impl ErrorPayload {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Parse a response body. Non-JSON bodies are kept as a string payload.
    pub fn from_body(body: &[u8]) -> Option<Self> {
        if body.is_empty() {
            return None;
        }
        match serde_json::from_slice::<Value>(body) {
            Ok(value) => Some(Self(value)),
            Err(_) => {
                let text = String::from_utf8_lossy(body).trim().to_string();
                (!text.is_empty()).then(|| Self(Value::String(text)))
            }
        }
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    /// The provider's `detail` message, if the payload has one.
    pub fn detail(&self) -> Option<&str> {
        self.0.get("detail").and_then(Value::as_str)
    }

    /// Messages attached to `field`, joined with `", "`.
    pub fn field_errors(&self, field: &str) -> Option<String> {
        match self.0.get(field)? {
            Value::Array(items) => {
                let messages: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
                (!messages.is_empty()).then(|| messages.join(", "))
            }
            Value::String(message) => Some(message.clone()),
            _ => None,
        }
    }

    /// First matching field error, rendered as `"Label: msg1, msg2"`.
    pub fn first_field_error(&self, fields: &[FieldLabel<'_>]) -> Option<String> {
        fields.iter().find_map(|(field, label)| {
            self.field_errors(field)
                .map(|messages| format!("{}: {}", label, messages))
        })
    }

    pub fn as_text(&self) -> Option<&str> {
        self.0.as_str()
    }

    /// Best user-facing description: field errors, then `detail`, then a
    /// bare string body.
    pub fn describe(&self, fields: &[FieldLabel<'_>]) -> Option<String> {
        self.first_field_error(fields)
            .or_else(|| self.detail().map(str::to_string))
            .or_else(|| self.as_text().map(str::to_string))
    }
}

impl fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(text) => f.write_str(text),
            other => write!(f, "{}", other),
        }
    }
}

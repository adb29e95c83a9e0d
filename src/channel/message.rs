//! Classification of inbound channel payloads.

use serde_json::Value;

/// A JSON document received over the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// Anything that is not error-shaped, passed through untouched.
    Data(Value),
    /// Server-reported failure: `{"error": ..., "details"?: ...}`.
    Error {
        /// Error code reported by the server.
        error: String,
        /// Human-readable detail, when the server sent one.
        details: Option<String>,
    },
}

impl InboundMessage {
    /// Classify a text frame.
    ///
    /// A JSON object with a non-null `error` key is error-shaped; every
    /// other JSON document is data. Text that is not JSON at all is kept as
    /// a data message holding the raw string.
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Self::from_value(value),
            Err(e) => {
                log::debug!("[Channel] Non-JSON frame kept as text: {}", e);
                Self::Data(Value::String(text.to_string()))
            }
        }
    }

    /// Classify an already-decoded JSON document.
    pub fn from_value(value: Value) -> Self {
        let Some(error) = value.get("error").filter(|e| !e.is_null()) else {
            return Self::Data(value);
        };

        let details = value
            .get("details")
            .filter(|d| !d.is_null())
            .map(text_of);

        Self::Error {
            error: text_of(error),
            details,
        }
    }

    /// The string the view layer shows for an error message: the details,
    /// falling back to the error code. `None` for data messages.
    pub fn error_text(&self) -> Option<&str> {
        match self {
            Self::Data(_) => None,
            Self::Error { error, details } => Some(details.as_deref().unwrap_or(error)),
        }
    }
}

/// Strings are taken verbatim, anything else is rendered as compact JSON.
fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

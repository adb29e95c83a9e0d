//! The immutable state object the view layer renders from.
//!
//! A snapshot is never mutated once published. Every transition goes through
//! one of the `with_*` builders, which consume the old value and return the
//! next one; the controller swaps the result in behind an `Arc`.

use serde::Serialize;
use serde_json::Value;

/// Everything the view layer may show.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Whether the session is authenticated.
    pub authenticated: bool,
    /// Latest pushed payload, if any.
    pub data: Option<Value>,
    /// Latest user-visible error, if any.
    pub error: Option<String>,
    /// Short human-readable progress line.
    pub status_message: String,
    /// True until the startup probe finishes.
    pub loading: bool,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            authenticated: false,
            data: None,
            error: None,
            status_message: String::new(),
            loading: true,
        }
    }
}

impl SessionSnapshot {
    /// Replace `authenticated`.
    pub fn with_authenticated(self, authenticated: bool) -> Self {
        Self {
            authenticated,
            ..self
        }
    }

    /// Replace `loading`.
    pub fn with_loading(self, loading: bool) -> Self {
        Self { loading, ..self }
    }

    /// Replace `status_message`.
    pub fn with_status(self, status_message: impl Into<String>) -> Self {
        Self {
            status_message: status_message.into(),
            ..self
        }
    }

    /// Show a payload; a payload always clears the error.
    pub fn with_data(self, data: Value) -> Self {
        Self {
            data: Some(data),
            error: None,
            ..self
        }
    }

    /// Show an error while keeping whatever data is displayed.
    pub fn with_error(self, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..self
        }
    }

    /// Show an error and drop the displayed payload.
    pub fn with_error_replacing_data(self, error: impl Into<String>) -> Self {
        Self {
            data: None,
            error: Some(error.into()),
            ..self
        }
    }

    /// Drop both payload and error, e.g. before a new fetch.
    pub fn cleared(self) -> Self {
        Self {
            data: None,
            error: None,
            ..self
        }
    }
}

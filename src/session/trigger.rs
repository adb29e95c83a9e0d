//! Asks the backend to start pushing data over the channel.
//!
//! The HTTP response only confirms the request was accepted. The payload
//! itself arrives later as a channel message.

use reqwest::StatusCode;
use serde_json::Value;

use crate::backend::Backend;
use crate::constants::GET_DATA_PATH;
use crate::error::TriggerError;

/// One-shot "begin pushing" request.
#[derive(Debug, Clone)]
pub struct TriggerRequester {
    backend: Backend,
}

impl TriggerRequester {
    /// Requester against `backend`.
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Send the trigger. `Ok` means "accepted", not "data received".
    pub async fn trigger(&self) -> Result<(), TriggerError> {
        let url = self.backend.endpoint(GET_DATA_PATH);
        log::debug!("[Trigger] GET {}", url);

        let response = self.backend.client().get(&url).send().await.map_err(|e| {
            log::warn!("[Trigger] {} unreachable: {}", url, e);
            TriggerError::Unreachable
        })?;

        let status = response.status();
        if status.is_success() {
            log::info!("[Trigger] Accepted ({})", status);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let message = rejection_message(status, &body);
        log::warn!("[Trigger] Rejected ({}): {}", status, message);
        Err(TriggerError::Rejected(message))
    }
}

/// Pick the most specific human-readable message out of an error body.
///
/// Order: `detail.error` (nested object), `detail` (string), top-level
/// `error` (string), then a generic fallback naming the status.
pub(crate) fn rejection_message(status: StatusCode, body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let field = |value: Option<&Value>| value.and_then(Value::as_str).map(str::to_string);

    parsed
        .as_ref()
        .and_then(|json| {
            let detail = json.get("detail");
            field(detail.and_then(|d| d.get("error")))
                .or_else(|| field(detail))
                .or_else(|| field(json.get("error")))
        })
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("request failed with HTTP {}", status.as_u16()))
}

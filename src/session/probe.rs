//! Startup authentication check.

use serde::Deserialize;

use crate::backend::Backend;
use crate::constants::STATUS_PATH;
use crate::error::ProbeError;

/// Body of a successful `GET /api/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ProbeStatus {
    /// Whether the session cookie belongs to a logged-in user.
    pub authenticated: bool,
}

/// One-shot check of the current authentication status.
#[derive(Debug, Clone)]
pub struct SessionProbe {
    backend: Backend,
}

impl SessionProbe {
    /// Probe against `backend`.
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Ask the backend whether the session is authenticated.
    ///
    /// Non-success statuses map to [`ProbeError::StatusCheckFailed`];
    /// connect/DNS/timeout failures to [`ProbeError::BackendUnreachable`].
    pub async fn check_status(&self) -> Result<ProbeStatus, ProbeError> {
        let url = self.backend.endpoint(STATUS_PATH);
        log::debug!("[Probe] GET {}", url);

        let response = self.backend.client().get(&url).send().await.map_err(|e| {
            log::warn!("[Probe] {} unreachable: {}", url, e);
            ProbeError::BackendUnreachable
        })?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("[Probe] Status check failed: {}", status);
            return Err(ProbeError::StatusCheckFailed {
                status: status.as_u16(),
            });
        }

        let body = response.json::<ProbeStatus>().await.map_err(|e| {
            if e.is_decode() {
                log::warn!("[Probe] Invalid status body: {}", e);
                ProbeError::InvalidResponse
            } else {
                log::warn!("[Probe] Status body not received: {}", e);
                ProbeError::BackendUnreachable
            }
        })?;

        log::info!("[Probe] authenticated={}", body.authenticated);
        Ok(body)
    }
}

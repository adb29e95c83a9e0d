//! Application-wide constants for livefeed.
//!
//! Centralizes endpoint paths, user-facing status strings and timeouts so
//! the controller, the channel manager and the CLI agree on them.
//!
//! # Categories
//!
//! - **Endpoints**: Backend paths relative to the configured base URL
//! - **Status messages**: Strings surfaced through the snapshot
//! - **Timeouts**: Network and CLI wait limits

use std::time::Duration;

// ============================================================================
// Endpoints
// ============================================================================

/// Authentication status probe.
pub const STATUS_PATH: &str = "/api/status";

/// Asks the backend to start pushing data over the channel.
pub const GET_DATA_PATH: &str = "/api/get-data";

/// Browser login entry point (external collaborator sets the session cookie).
pub const LOGIN_PATH: &str = "/login";

/// Browser logout entry point.
pub const LOGOUT_PATH: &str = "/logout";

/// Realtime push channel, appended to the ws(s):// form of the backend URL.
pub const CHANNEL_PATH: &str = "/ws";

// ============================================================================
// Status messages
// ============================================================================

/// Channel handshake completed; data fetches are allowed.
pub const STATUS_CONNECTED: &str = "connected, ready";

/// An inbound message (data or server error) was applied.
pub const STATUS_DATA_RECEIVED: &str = "data received";

/// The channel closed, for whatever reason.
pub const STATUS_DISCONNECTED: &str = "disconnected";

/// A trigger request is in flight.
pub const STATUS_REQUESTING: &str = "requesting…";

/// Generic message for transport-level channel failures.
///
/// The underlying error text goes to the log, not to the snapshot.
pub const CHANNEL_ERROR_MESSAGE: &str = "realtime channel error";

// ============================================================================
// Timeouts
// ============================================================================

/// Default HTTP request timeout for the probe and trigger calls.
///
/// Timeouts surface as the "unreachable" variants of the probe and trigger
/// errors.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time `livefeed fetch` waits for the channel and the first payload.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// WebSocket close codes
// ============================================================================

/// Normal closure.
pub const CLOSE_NORMAL: u16 = 1000;

/// Abnormal closure (no close frame was received).
pub const CLOSE_ABNORMAL: u16 = 1006;

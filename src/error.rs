//! Error taxonomy for the session client.
//!
//! None of these are retried. Each ends up as the snapshot's `error` string
//! via its `Display` impl, and the user recovers by re-triggering the action
//! or re-toggling authentication.

/// Failure of the one-shot authentication status probe.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    /// The status endpoint answered with a non-success HTTP status.
    #[error("failed to check authentication status (HTTP {status})")]
    StatusCheckFailed {
        /// HTTP status code returned by the backend.
        status: u16,
    },

    /// Network unreachable, DNS failure or timeout.
    #[error("backend unreachable")]
    BackendUnreachable,

    /// A success response whose body is not `{"authenticated": bool}`.
    #[error("invalid authentication status response")]
    InvalidResponse,
}

/// Failure of the data trigger request.
///
/// Success of the trigger only means the backend accepted the request; the
/// data itself arrives over the channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TriggerError {
    /// Non-success HTTP status, with the message extracted from the body.
    #[error("{0}")]
    Rejected(String),

    /// Network unreachable, DNS failure or timeout.
    #[error("backend unreachable")]
    Unreachable,
}

/// Local faults on the realtime channel.
///
/// Server-reported errors are not here: they arrive as
/// [`InboundMessage::Error`](crate::channel::InboundMessage::Error).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// Handshake, read or protocol failure reported by the transport.
    #[error("channel transport error: {0}")]
    TransportError(String),

    /// The channel closed without the client asking for it.
    #[error("channel closed unexpectedly (code {code}: {reason})")]
    UnexpectedClose {
        /// WebSocket close code.
        code: u16,
        /// Close reason sent by the peer, possibly empty.
        reason: String,
    },

    /// An event arrived for the current channel that its state cannot accept.
    #[error("illegal channel transition: {event} while {state}")]
    IllegalTransition {
        /// State name at the time of the event.
        state: &'static str,
        /// Event name.
        event: &'static str,
    },
}

//! Authentication-gated realtime push channel.
//!
//! The channel is live if and only if the session is authenticated. This
//! module owns that invariant: [`ChannelManager`] holds the only handle to
//! the transport and drives an explicit state machine from two inputs, the
//! authentication signal and the transport's events.
//!
//! # Architecture
//!
//! ```text
//!   SessionController
//!         │ set_authenticated(bool)          ▲ ChannelNotice
//!         ▼                                  │
//!   ChannelManager ── Connector::connect ──► transport task (WsConnector)
//!         ▲                                  │
//!         │        SessionEvent::Channel     │
//!         └────────── event queue ◄──────────┘
//! ```
//!
//! Transport tasks never touch manager state. They only push
//! [`ChannelEvent`]s, tagged with the [`ChannelId`] they were started for,
//! into the controller's event queue. Events from a channel that is no
//! longer current are recognized by id and dropped.
//!
//! # Event order
//!
//! Per channel, the transport emits `Opened`, then any number of `Message`
//! and `TransportError` events, then exactly one `Closed`. A close
//! requested before the handshake finishes yields only `Closed`.

pub mod connection;
pub mod manager;
pub mod message;
pub mod state;

pub use connection::{WsConnector, WsLink};
pub use manager::ChannelManager;
pub use message::InboundMessage;
pub use state::{ChannelNotice, ChannelStatus};

use crate::events::EventSender;

/// Identity of one channel instance created by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(pub u64);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ch_{}", self.0)
    }
}

/// An event produced by a channel transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEvent {
    /// Which channel produced this event.
    pub id: ChannelId,
    /// The event payload.
    pub kind: ChannelEventKind,
}

impl ChannelEvent {
    /// Shorthand constructor.
    pub fn new(id: ChannelId, kind: ChannelEventKind) -> Self {
        Self { id, kind }
    }
}

/// Discriminant for channel transport events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEventKind {
    /// Handshake completed.
    Opened,
    /// A text frame (binary frames are decoded lossily) was received.
    Message(String),
    /// Transport or protocol failure. A `Closed` may or may not follow.
    TransportError(String),
    /// The channel is gone, whoever closed it.
    Closed {
        /// WebSocket close code (1000 = normal, 1006 = abnormal).
        code: u16,
        /// Human-readable close reason.
        reason: String,
    },
}

impl ChannelEventKind {
    /// Short name used in logs and transition errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Opened => "opened",
            Self::Message(_) => "message",
            Self::TransportError(_) => "transport_error",
            Self::Closed { .. } => "closed",
        }
    }
}

/// Opens channel transports on behalf of the manager.
///
/// The production implementation is [`WsConnector`]; tests substitute a
/// recorder and feed synthetic [`ChannelEvent`]s instead.
pub trait Connector {
    /// Live handle type returned for each channel.
    type Link: ChannelLink;

    /// Start connecting channel `id`. Every event for it must go to `events`.
    fn connect(&mut self, id: ChannelId, events: EventSender) -> Self::Link;
}

/// Exclusive handle to one live channel transport.
///
/// Dropping the link abandons the transport without a close handshake and
/// without further events.
pub trait ChannelLink {
    /// Ask the transport to close. The transport answers with a single
    /// `Closed` event (also when the handshake had not finished yet).
    fn close(&mut self);
}

//! The channel lifecycle as an explicit state machine.
//!
//! ```text
//!            connect                 Opened
//!   None ─────────────► Connecting ─────────► Open
//!    ▲                      │  │                │  │
//!    │   Closed (unasked)   │  │ close()        │  │ close()
//!    ├──────────────────────┘  ▼                │  ▼
//!    │                        Closed ◄──────────┼──┘
//!    │   Closed (asked)         │               │
//!    ├──────────────────────────┘               │
//!    │   Closed (unasked)                       │
//!    └──────────────────────────────────────────┘
//! ```
//!
//! [`apply`] is the exhaustive transition function for events addressed to
//! the current channel. Events for other channels are filtered out by the
//! manager before they get here.

use super::{ChannelEventKind, ChannelId, InboundMessage};
use crate::error::ChannelError;

/// Lifecycle state, owning the live link while there is one.
#[derive(Debug)]
pub(crate) enum ChannelState<L> {
    /// No channel exists.
    None,
    /// Handshake in progress.
    Connecting {
        /// Channel identity.
        id: ChannelId,
        /// Live transport handle.
        link: L,
    },
    /// Handshake done; payloads may arrive.
    Open {
        /// Channel identity.
        id: ChannelId,
        /// Live transport handle.
        link: L,
    },
    /// Close requested; waiting for the transport's final `Closed` event.
    Closed {
        /// Channel identity.
        id: ChannelId,
    },
}

impl<L> ChannelState<L> {
    /// Id of the current channel, if any.
    pub(crate) fn id(&self) -> Option<ChannelId> {
        match self {
            Self::None => None,
            Self::Connecting { id, .. } | Self::Open { id, .. } | Self::Closed { id } => Some(*id),
        }
    }

    /// Public, link-free view of the state.
    pub(crate) fn status(&self) -> ChannelStatus {
        match self {
            Self::None => ChannelStatus::None,
            Self::Connecting { .. } => ChannelStatus::Connecting,
            Self::Open { .. } => ChannelStatus::Open,
            Self::Closed { .. } => ChannelStatus::Closed,
        }
    }
}

/// Channel state as seen from outside the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    /// No channel.
    None,
    /// Handshake in progress.
    Connecting,
    /// Ready for data.
    Open,
    /// Close requested, not yet confirmed.
    Closed,
}

impl ChannelStatus {
    /// Lowercase name for logs and errors.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a channel transition means for the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelNotice {
    /// The channel reached `Open`.
    Connected,
    /// A payload or server-reported error arrived.
    Inbound(InboundMessage),
    /// Local transport failure; the state is unchanged.
    Fault(ChannelError),
    /// The channel is gone. `unexpected` is set when nobody asked for it.
    Disconnected {
        /// Present for server-initiated or abnormal closes.
        unexpected: Option<ChannelError>,
    },
}

/// Result of feeding one event to the state machine.
#[derive(Debug)]
pub(crate) enum Transition {
    /// State changed (or not) and the snapshot needs an update.
    Notice(ChannelNotice),
    /// Expected race, nothing to do (e.g. payload after close was asked).
    Ignored(&'static str),
    /// The event cannot happen in this state.
    Rejected(ChannelError),
}

/// Apply an event addressed to the current channel.
///
/// Returns the next state and what the transition means.
pub(crate) fn apply<L>(
    state: ChannelState<L>,
    event: ChannelEventKind,
) -> (ChannelState<L>, Transition) {
    match (state, event) {
        // Connecting
        (ChannelState::Connecting { id, link }, ChannelEventKind::Opened) => (
            ChannelState::Open { id, link },
            Transition::Notice(ChannelNotice::Connected),
        ),
        (state @ ChannelState::Connecting { .. }, ChannelEventKind::TransportError(e)) => (
            state,
            Transition::Notice(ChannelNotice::Fault(ChannelError::TransportError(e))),
        ),
        (
            ChannelState::Connecting { .. } | ChannelState::Open { .. },
            ChannelEventKind::Closed { code, reason },
        ) => (
            ChannelState::None,
            Transition::Notice(ChannelNotice::Disconnected {
                unexpected: Some(ChannelError::UnexpectedClose { code, reason }),
            }),
        ),
        (state @ ChannelState::Connecting { .. }, event @ ChannelEventKind::Message(_)) => {
            reject(state, &event)
        }

        // Open
        (state @ ChannelState::Open { .. }, ChannelEventKind::Message(text)) => (
            state,
            Transition::Notice(ChannelNotice::Inbound(InboundMessage::parse(&text))),
        ),
        (state @ ChannelState::Open { .. }, ChannelEventKind::TransportError(e)) => (
            state,
            Transition::Notice(ChannelNotice::Fault(ChannelError::TransportError(e))),
        ),
        (state @ ChannelState::Open { .. }, event @ ChannelEventKind::Opened) => {
            reject(state, &event)
        }

        // Closed: only the final close is meaningful
        (ChannelState::Closed { .. }, ChannelEventKind::Closed { .. }) => (
            ChannelState::None,
            Transition::Notice(ChannelNotice::Disconnected { unexpected: None }),
        ),
        (state @ ChannelState::Closed { .. }, ChannelEventKind::Opened) => {
            (state, Transition::Ignored("opened after close was requested"))
        }
        (state @ ChannelState::Closed { .. }, ChannelEventKind::Message(_)) => {
            (state, Transition::Ignored("message after close was requested"))
        }
        (state @ ChannelState::Closed { .. }, ChannelEventKind::TransportError(_)) => {
            (state, Transition::Ignored("transport error after close was requested"))
        }

        // None: there is no current channel to address
        (state @ ChannelState::None, event) => reject(state, &event),
    }
}

fn reject<L>(state: ChannelState<L>, event: &ChannelEventKind) -> (ChannelState<L>, Transition) {
    let error = ChannelError::IllegalTransition {
        state: state.status().as_str(),
        event: event.name(),
    };
    (state, Transition::Rejected(error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ID: ChannelId = ChannelId(1);

    fn connecting() -> ChannelState<()> {
        ChannelState::Connecting { id: ID, link: () }
    }

    fn open() -> ChannelState<()> {
        ChannelState::Open { id: ID, link: () }
    }

    fn closed_event() -> ChannelEventKind {
        ChannelEventKind::Closed {
            code: 1000,
            reason: String::new(),
        }
    }

    #[test]
    fn test_connecting_to_open() {
        let (next, transition) = apply(connecting(), ChannelEventKind::Opened);
        assert_eq!(next.status(), ChannelStatus::Open);
        assert!(matches!(transition, Transition::Notice(ChannelNotice::Connected)));
    }

    #[test]
    fn test_message_while_open_is_classified() {
        let (next, transition) = apply(open(), ChannelEventKind::Message(r#"{"temp":21}"#.into()));
        assert_eq!(next.status(), ChannelStatus::Open);
        match transition {
            Transition::Notice(ChannelNotice::Inbound(InboundMessage::Data(v))) => {
                assert_eq!(v, json!({"temp": 21}));
            }
            other => panic!("unexpected transition: {other:?}"),
        }
    }

    #[test]
    fn test_transport_error_does_not_close() {
        for state in [connecting(), open()] {
            let before = state.status();
            let (next, transition) = apply(state, ChannelEventKind::TransportError("reset".into()));
            assert_eq!(next.status(), before);
            assert!(matches!(
                transition,
                Transition::Notice(ChannelNotice::Fault(ChannelError::TransportError(_)))
            ));
        }
    }

    #[test]
    fn test_unrequested_close_is_unexpected() {
        let (next, transition) = apply(open(), closed_event());
        assert_eq!(next.status(), ChannelStatus::None);
        assert!(matches!(
            transition,
            Transition::Notice(ChannelNotice::Disconnected {
                unexpected: Some(ChannelError::UnexpectedClose { code: 1000, .. })
            })
        ));
    }

    #[test]
    fn test_requested_close_completes() {
        let (next, transition) = apply(ChannelState::<()>::Closed { id: ID }, closed_event());
        assert_eq!(next.status(), ChannelStatus::None);
        assert!(matches!(
            transition,
            Transition::Notice(ChannelNotice::Disconnected { unexpected: None })
        ));
    }

    #[test]
    fn test_open_after_close_request_never_takes_effect() {
        let (next, transition) =
            apply(ChannelState::<()>::Closed { id: ID }, ChannelEventKind::Opened);
        assert_eq!(next.status(), ChannelStatus::Closed);
        assert!(matches!(transition, Transition::Ignored(_)));
    }

    #[test]
    fn test_illegal_transitions_are_rejected() {
        let (next, transition) = apply(connecting(), ChannelEventKind::Message("{}".into()));
        assert_eq!(next.status(), ChannelStatus::Connecting);
        assert!(matches!(
            transition,
            Transition::Rejected(ChannelError::IllegalTransition {
                state: "connecting",
                event: "message"
            })
        ));

        let (_, transition) = apply(open(), ChannelEventKind::Opened);
        assert!(matches!(transition, Transition::Rejected(_)));

        let (next, transition) =
            apply(ChannelState::<()>::None, ChannelEventKind::Message("{}".into()));
        assert_eq!(next.status(), ChannelStatus::None);
        assert!(matches!(
            transition,
            Transition::Rejected(ChannelError::IllegalTransition { state: "none", .. })
        ));
    }
}

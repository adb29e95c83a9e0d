//! Owner of the push channel.
//!
//! [`ChannelManager`] keeps "channel is live iff authenticated" true. It is
//! the only holder of the transport link; everything else sees the derived
//! [`ChannelStatus`] and the [`ChannelNotice`]s returned from
//! [`ChannelManager::handle_event`].
//!
//! There is no reconnect: a channel the server closes while the session is
//! still authenticated stays gone until authentication toggles false→true
//! again. A false→true toggle that lands while a requested close is still
//! pending is remembered, and the replacement channel opens as soon as the
//! old one reports `Closed`.

use super::state::{self, ChannelState, Transition};
use super::{ChannelEvent, ChannelId, ChannelLink, ChannelNotice, ChannelStatus, Connector};
use crate::events::EventSender;

/// Authentication-gated channel lifecycle manager.
pub struct ChannelManager<C: Connector> {
    connector: C,
    events: EventSender,
    state: ChannelState<C::Link>,
    /// Last authentication signal; a channel is wanted while this is set.
    wanted: bool,
    /// Number of channels created so far; also the next id to hand out.
    created: u64,
}

impl<C: Connector> std::fmt::Debug for ChannelManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelManager")
            .field("status", &self.state.status())
            .field("current", &self.state.id())
            .field("wanted", &self.wanted)
            .field("created", &self.created)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> ChannelManager<C> {
    /// Create a manager with no channel. Transport events must be routed
    /// back through [`Self::handle_event`].
    pub fn new(connector: C, events: EventSender) -> Self {
        Self {
            connector,
            events,
            state: ChannelState::None,
            wanted: false,
            created: 0,
        }
    }

    /// Feed the authentication signal.
    ///
    /// `true` creates a channel only when none exists; repeated `true`
    /// signals never produce a second channel. While a close is pending the
    /// new channel is deferred until that close completes. `false` requests
    /// a close of whatever channel exists.
    pub fn set_authenticated(&mut self, authenticated: bool) {
        if authenticated {
            self.wanted = true;
            self.open();
        } else {
            self.close();
        }
    }

    fn open(&mut self) {
        if let ChannelState::Closed { id } = self.state {
            log::debug!("[Channel] {} still closing, opening after its close", id);
            return;
        }
        if let Some(id) = self.state.id() {
            log::debug!(
                "[Channel] {} already exists ({}), not opening another",
                id,
                self.state.status()
            );
            return;
        }

        let id = ChannelId(self.created);
        self.created += 1;
        log::info!("[Channel] Opening {}", id);
        let link = self.connector.connect(id, self.events.clone());
        self.state = ChannelState::Connecting { id, link };
    }

    /// Request a close of the current channel.
    ///
    /// Works for `Connecting` too: the pending handshake is abandoned and an
    /// `Opened` that still arrives is ignored. Also cancels a deferred open.
    /// Returns `false` (and does nothing else) when there is no channel or a
    /// close is already pending.
    pub fn close(&mut self) -> bool {
        self.wanted = false;
        match std::mem::replace(&mut self.state, ChannelState::None) {
            ChannelState::Connecting { id, mut link } | ChannelState::Open { id, mut link } => {
                log::info!("[Channel] Closing {}", id);
                link.close();
                self.state = ChannelState::Closed { id };
                true
            }
            other => {
                self.state = other;
                false
            }
        }
    }

    /// Apply a transport event.
    ///
    /// Returns what the snapshot should reflect, or `None` when the event
    /// was stale, an expected race, or illegal for the current state.
    pub fn handle_event(&mut self, event: ChannelEvent) -> Option<ChannelNotice> {
        let ChannelEvent { id, kind } = event;

        if self.state.id() != Some(id) {
            if id.0 < self.created {
                log::debug!("[Channel] Dropping stale {} event from {}", kind.name(), id);
            } else {
                log::warn!(
                    "[Channel] Dropping {} event from {}, which was never opened",
                    kind.name(),
                    id
                );
            }
            return None;
        }

        let close_pending = matches!(self.state, ChannelState::Closed { .. });
        let current = std::mem::replace(&mut self.state, ChannelState::None);
        let (next, transition) = state::apply(current, kind);
        self.state = next;

        match transition {
            Transition::Notice(notice) => {
                log::debug!("[Channel] {} -> {}", id, self.state.status());
                if close_pending && self.wanted && self.state.id().is_none() {
                    log::info!("[Channel] {} closed while authenticated again, reopening", id);
                    self.open();
                }
                Some(notice)
            }
            Transition::Ignored(why) => {
                log::debug!("[Channel] {}: {}", id, why);
                None
            }
            Transition::Rejected(e) => {
                log::warn!("[Channel] {}: {}", id, e);
                None
            }
        }
    }

    /// Teardown on shutdown.
    ///
    /// An `Open` channel is closed gracefully. A `Connecting` one is simply
    /// abandoned (its link is dropped, no close is attempted), and a
    /// `Closed` one is left to finish on its own. Idempotent.
    pub fn shutdown(&mut self) {
        self.wanted = false;
        match std::mem::replace(&mut self.state, ChannelState::None) {
            ChannelState::Open { id, mut link } => {
                log::info!("[Channel] Shutdown: closing {}", id);
                link.close();
            }
            ChannelState::Connecting { id, link } => {
                log::info!("[Channel] Shutdown: abandoning {} before open", id);
                drop(link);
            }
            ChannelState::Closed { .. } | ChannelState::None => {}
        }
    }

    /// Current lifecycle status.
    pub fn status(&self) -> ChannelStatus {
        self.state.status()
    }

    /// Id of the current channel, if one exists.
    pub fn current_id(&self) -> Option<ChannelId> {
        self.state.id()
    }

    /// How many channels this manager has created.
    pub fn created_count(&self) -> u64 {
        self.created
    }
}

impl<C: Connector> Drop for ChannelManager<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelEventKind, InboundMessage};
    use crate::error::ChannelError;
    use std::sync::{Arc, Mutex};

    /// What the fake transport was asked to do.
    #[derive(Debug, Default)]
    struct Calls {
        connected: Vec<ChannelId>,
        closed: Vec<ChannelId>,
        dropped: Vec<ChannelId>,
    }

    #[derive(Default)]
    struct RecordingConnector {
        calls: Arc<Mutex<Calls>>,
    }

    struct RecordingLink {
        id: ChannelId,
        calls: Arc<Mutex<Calls>>,
    }

    impl ChannelLink for RecordingLink {
        fn close(&mut self) {
            self.calls.lock().unwrap().closed.push(self.id);
        }
    }

    impl Drop for RecordingLink {
        fn drop(&mut self) {
            self.calls.lock().unwrap().dropped.push(self.id);
        }
    }

    impl Connector for RecordingConnector {
        type Link = RecordingLink;

        fn connect(&mut self, id: ChannelId, _events: EventSender) -> RecordingLink {
            self.calls.lock().unwrap().connected.push(id);
            RecordingLink {
                id,
                calls: Arc::clone(&self.calls),
            }
        }
    }

    fn manager() -> (ChannelManager<RecordingConnector>, Arc<Mutex<Calls>>) {
        let connector = RecordingConnector::default();
        let calls = Arc::clone(&connector.calls);
        let (tx, _rx) = crate::events::event_queue();
        (ChannelManager::new(connector, tx), calls)
    }

    fn event(id: u64, kind: ChannelEventKind) -> ChannelEvent {
        ChannelEvent::new(ChannelId(id), kind)
    }

    fn closed(id: u64) -> ChannelEvent {
        event(
            id,
            ChannelEventKind::Closed {
                code: 1000,
                reason: "bye".to_string(),
            },
        )
    }

    #[test]
    fn test_repeated_true_creates_one_channel() {
        let (mut mgr, calls) = manager();
        mgr.set_authenticated(true);
        mgr.set_authenticated(true);
        mgr.set_authenticated(true);

        assert_eq!(mgr.created_count(), 1);
        assert_eq!(calls.lock().unwrap().connected, vec![ChannelId(0)]);
        assert_eq!(mgr.status(), ChannelStatus::Connecting);
    }

    #[test]
    fn test_channel_count_matches_false_to_true_transitions() {
        let (mut mgr, calls) = manager();
        for round in 0..3 {
            mgr.set_authenticated(true);
            mgr.set_authenticated(true);
            assert!(mgr.handle_event(event(round, ChannelEventKind::Opened)).is_some());
            mgr.set_authenticated(false);
            assert_eq!(mgr.status(), ChannelStatus::Closed);
            assert!(mgr.handle_event(closed(round)).is_some());
            assert_eq!(mgr.status(), ChannelStatus::None);
        }

        assert_eq!(mgr.created_count(), 3);
        let calls = calls.lock().unwrap();
        assert_eq!(calls.connected.len(), 3);
        assert_eq!(calls.closed.len(), 3);
    }

    #[test]
    fn test_true_while_close_pending_opens_after_close_completes() {
        let (mut mgr, calls) = manager();
        mgr.set_authenticated(true);
        mgr.handle_event(event(0, ChannelEventKind::Opened));
        mgr.set_authenticated(false);
        mgr.set_authenticated(true);
        mgr.set_authenticated(true);
        assert_eq!(mgr.created_count(), 1);
        assert_eq!(mgr.status(), ChannelStatus::Closed);

        let notice = mgr.handle_event(closed(0));
        assert_eq!(notice, Some(ChannelNotice::Disconnected { unexpected: None }));
        assert_eq!(mgr.created_count(), 2);
        assert_eq!(mgr.status(), ChannelStatus::Connecting);
        assert_eq!(mgr.current_id(), Some(ChannelId(1)));
        assert_eq!(
            calls.lock().unwrap().connected,
            vec![ChannelId(0), ChannelId(1)]
        );
    }

    #[test]
    fn test_deferred_open_is_cancelled_by_false() {
        let (mut mgr, _calls) = manager();
        mgr.set_authenticated(true);
        mgr.set_authenticated(false);
        mgr.set_authenticated(true);
        mgr.set_authenticated(false);

        mgr.handle_event(closed(0));
        assert_eq!(mgr.status(), ChannelStatus::None);
        assert_eq!(mgr.created_count(), 1);
    }

    #[test]
    fn test_deferred_open_is_cancelled_by_shutdown() {
        let (mut mgr, _calls) = manager();
        mgr.set_authenticated(true);
        mgr.set_authenticated(false);
        mgr.set_authenticated(true);
        mgr.shutdown();

        assert_eq!(mgr.handle_event(closed(0)), None);
        assert_eq!(mgr.status(), ChannelStatus::None);
        assert_eq!(mgr.created_count(), 1);
    }

    #[test]
    fn test_event_for_unissued_channel_is_dropped() {
        let (mut mgr, _calls) = manager();
        assert_eq!(mgr.handle_event(event(7, ChannelEventKind::Opened)), None);
        assert_eq!(mgr.status(), ChannelStatus::None);

        mgr.set_authenticated(true);
        assert_eq!(mgr.handle_event(closed(42)), None);
        assert_eq!(mgr.status(), ChannelStatus::Connecting);
        assert_eq!(mgr.current_id(), Some(ChannelId(0)));
    }

    #[test]
    fn test_close_is_idempotent() {
        let (mut mgr, calls) = manager();
        assert!(!mgr.close(), "close with no channel is a no-op");

        mgr.set_authenticated(true);
        assert!(mgr.close());
        assert!(!mgr.close(), "close while already closing is a no-op");
        mgr.set_authenticated(false);

        assert_eq!(calls.lock().unwrap().closed, vec![ChannelId(0)]);

        let notice = mgr.handle_event(closed(0));
        assert_eq!(notice, Some(ChannelNotice::Disconnected { unexpected: None }));
        assert!(!mgr.close());
        assert_eq!(mgr.handle_event(closed(0)), None, "second close event is stale");
    }

    #[test]
    fn test_close_while_connecting_suppresses_open() {
        let (mut mgr, _calls) = manager();
        mgr.set_authenticated(true);
        mgr.set_authenticated(false);

        assert_eq!(mgr.handle_event(event(0, ChannelEventKind::Opened)), None);
        assert_eq!(mgr.status(), ChannelStatus::Closed);

        mgr.handle_event(closed(0));
        assert_eq!(mgr.status(), ChannelStatus::None);
    }

    #[test]
    fn test_close_with_trailing_transport_error_tears_down_once() {
        let (mut mgr, _calls) = manager();
        mgr.set_authenticated(true);
        mgr.handle_event(event(0, ChannelEventKind::Opened));
        mgr.set_authenticated(false);

        let error = event(0, ChannelEventKind::TransportError("reset".into()));
        assert_eq!(mgr.handle_event(error.clone()), None);

        let notices: Vec<_> = [closed(0), error, closed(0)]
            .into_iter()
            .filter_map(|e| mgr.handle_event(e))
            .collect();
        assert_eq!(notices, vec![ChannelNotice::Disconnected { unexpected: None }]);
        assert_eq!(mgr.status(), ChannelStatus::None);
        assert_eq!(mgr.created_count(), 1);
    }

    #[test]
    fn test_server_close_does_not_reconnect() {
        let (mut mgr, calls) = manager();
        mgr.set_authenticated(true);
        mgr.handle_event(event(0, ChannelEventKind::Opened));

        let notice = mgr.handle_event(event(
            0,
            ChannelEventKind::Closed {
                code: 1011,
                reason: "server restart".into(),
            },
        ));
        assert!(matches!(
            notice,
            Some(ChannelNotice::Disconnected {
                unexpected: Some(ChannelError::UnexpectedClose { code: 1011, .. })
            })
        ));
        assert_eq!(mgr.status(), ChannelStatus::None);
        assert_eq!(calls.lock().unwrap().connected.len(), 1);

        // Only a fresh false->true cycle brings it back.
        mgr.set_authenticated(false);
        mgr.set_authenticated(true);
        assert_eq!(mgr.current_id(), Some(ChannelId(1)));
    }

    #[test]
    fn test_messages_from_superseded_channel_are_stale() {
        let (mut mgr, _calls) = manager();
        mgr.set_authenticated(true);
        mgr.set_authenticated(false);
        mgr.handle_event(closed(0));
        mgr.set_authenticated(true);
        mgr.handle_event(event(1, ChannelEventKind::Opened));

        let stale = event(0, ChannelEventKind::Message(r#"{"temp": 1}"#.into()));
        assert_eq!(mgr.handle_event(stale), None);

        let fresh = event(1, ChannelEventKind::Message(r#"{"temp": 2}"#.into()));
        assert_eq!(
            mgr.handle_event(fresh),
            Some(ChannelNotice::Inbound(InboundMessage::Data(
                serde_json::json!({"temp": 2})
            )))
        );
    }

    #[test]
    fn test_shutdown_closes_open_channel_gracefully() {
        let (mut mgr, calls) = manager();
        mgr.set_authenticated(true);
        mgr.handle_event(event(0, ChannelEventKind::Opened));
        mgr.shutdown();
        mgr.shutdown();

        assert_eq!(mgr.status(), ChannelStatus::None);
        assert_eq!(calls.lock().unwrap().closed, vec![ChannelId(0)]);
    }

    #[test]
    fn test_shutdown_abandons_connecting_channel_without_close() {
        let (mut mgr, calls) = manager();
        mgr.set_authenticated(true);
        mgr.shutdown();

        let calls = calls.lock().unwrap();
        assert!(calls.closed.is_empty());
        assert_eq!(calls.dropped, vec![ChannelId(0)]);
    }
}

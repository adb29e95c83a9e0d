//! Top-level session state holder.
//!
//! The controller owns the one [`SessionSnapshot`] and the event queue.
//! Background work (probe, trigger, channel transport) only ever sends
//! [`SessionEvent`]s; the controller applies them one at a time in
//! [`SessionController::handle_event`], so each transition runs to completion
//! and publishes at most one new snapshot.
//!
//! # Flow
//!
//! ```text
//! start() ──► probe task ──► ProbeCompleted ──► authenticated ──► ChannelManager
//! request_data() ──► trigger task ──► TriggerCompleted (accepted / error)
//! channel task ──► Channel(Opened | Message | TransportError | Closed)
//! ```

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::backend::Backend;
use crate::channel::{
    ChannelEvent, ChannelManager, ChannelNotice, ChannelStatus, Connector, InboundMessage,
    WsConnector,
};
use crate::config::Config;
use crate::constants::{
    CHANNEL_ERROR_MESSAGE, LOGIN_PATH, LOGOUT_PATH, STATUS_CONNECTED, STATUS_DATA_RECEIVED,
    STATUS_DISCONNECTED, STATUS_REQUESTING,
};
use crate::error::{ProbeError, TriggerError};
use crate::events::{event_queue, EventReceiver, EventSender, SessionEvent};
use crate::navigator::{BrowserNavigator, Navigator};
use crate::session::{ProbeStatus, SessionProbe, TriggerRequester};
use crate::snapshot::SessionSnapshot;

/// Composes probe, trigger and channel manager behind one snapshot.
pub struct SessionController<C: Connector = WsConnector, N: Navigator = BrowserNavigator> {
    backend: Backend,
    probe: SessionProbe,
    trigger: TriggerRequester,
    channel: ChannelManager<C>,
    navigator: N,
    snapshot: Arc<SessionSnapshot>,
    snapshot_tx: watch::Sender<Arc<SessionSnapshot>>,
    events_tx: EventSender,
    events_rx: EventReceiver,
    probe_started: bool,
    trigger_in_flight: bool,
}

impl<C: Connector, N: Navigator> std::fmt::Debug for SessionController<C, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("snapshot", &self.snapshot)
            .field("channel", &self.channel)
            .field("trigger_in_flight", &self.trigger_in_flight)
            .finish_non_exhaustive()
    }
}

impl SessionController {
    /// Production controller: WebSocket channel, system browser navigation.
    pub fn from_config(config: &Config) -> Result<Self> {
        let backend = Backend::from_config(config)?;
        let connector = WsConnector::new(backend.clone());
        Ok(Self::new(backend, connector, BrowserNavigator))
    }
}

impl<C: Connector, N: Navigator> SessionController<C, N> {
    /// Build a controller. Nothing happens until [`Self::start`].
    pub fn new(backend: Backend, connector: C, navigator: N) -> Self {
        let (events_tx, events_rx) = event_queue();
        let snapshot = Arc::new(SessionSnapshot::default());
        let (snapshot_tx, _) = watch::channel(Arc::clone(&snapshot));

        Self {
            probe: SessionProbe::new(backend.clone()),
            trigger: TriggerRequester::new(backend.clone()),
            channel: ChannelManager::new(connector, events_tx.clone()),
            backend,
            navigator,
            snapshot,
            snapshot_tx,
            events_tx,
            events_rx,
            probe_started: false,
            trigger_in_flight: false,
        }
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Run the authentication probe. Only the first call does anything.
    ///
    /// Must be called from within a tokio runtime; the result arrives as
    /// [`SessionEvent::ProbeCompleted`].
    pub fn start(&mut self) {
        if self.probe_started {
            log::warn!("[Session] start() called twice; the probe runs once");
            return;
        }
        self.probe_started = true;
        self.update(|s| s.with_loading(true));

        let probe = self.probe.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = probe.check_status().await;
            let _ = events.send(SessionEvent::ProbeCompleted(result));
        });
    }

    /// Send the user to the backend's login page.
    pub fn login(&self) -> Result<()> {
        self.navigator.navigate(&self.backend.endpoint(LOGIN_PATH))
    }

    /// Drop local authentication (closing the channel), then send the user
    /// to the backend's logout page.
    pub fn logout(&mut self) -> Result<()> {
        self.set_authenticated(false);
        self.navigator.navigate(&self.backend.endpoint(LOGOUT_PATH))
    }

    /// Feed a new authentication state; the channel follows it.
    pub fn set_authenticated(&mut self, authenticated: bool) {
        self.update(|s| s.with_authenticated(authenticated));
        self.channel.set_authenticated(authenticated);
    }

    /// Ask the backend to push data.
    ///
    /// Clears the displayed data and error first. Requests are serialized:
    /// while one is in flight this returns `false` and does nothing.
    pub fn request_data(&mut self) -> bool {
        if self.trigger_in_flight {
            log::info!("[Session] Data request already in flight");
            return false;
        }
        if !self.is_ready_to_fetch() {
            log::warn!(
                "[Session] Requesting data while channel is {}",
                self.channel.status()
            );
        }

        self.trigger_in_flight = true;
        self.update(|s| s.cleared().with_status(STATUS_REQUESTING));

        let trigger = self.trigger.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = trigger.trigger().await;
            let _ = events.send(SessionEvent::TriggerCompleted(result));
        });
        true
    }

    /// Whether data-fetch affordances should be enabled.
    pub fn is_ready_to_fetch(&self) -> bool {
        self.channel.status() == ChannelStatus::Open
    }

    /// Tear the channel down (page leaving).
    pub fn shutdown(&mut self) {
        self.channel.shutdown();
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// The latest snapshot.
    pub fn snapshot(&self) -> Arc<SessionSnapshot> {
        Arc::clone(&self.snapshot)
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<SessionSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    /// Derived channel status.
    pub fn channel_status(&self) -> ChannelStatus {
        self.channel.status()
    }

    /// The channel manager, for read-only inspection.
    pub fn channel(&self) -> &ChannelManager<C> {
        &self.channel
    }

    /// A sender into this controller's event queue.
    pub fn event_sender(&self) -> EventSender {
        self.events_tx.clone()
    }

    /// Whether a trigger request is awaiting its HTTP response.
    pub fn is_request_in_flight(&self) -> bool {
        self.trigger_in_flight
    }

    // ------------------------------------------------------------------
    // Event loop
    // ------------------------------------------------------------------

    /// Wait for the next queued event and apply it.
    pub async fn process_next_event(&mut self) {
        // The controller holds a sender, so the queue never closes.
        if let Some(event) = self.events_rx.recv().await {
            self.handle_event(event);
        }
    }

    /// Apply every event already queued without waiting. Returns how many.
    pub fn process_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            count += 1;
        }
        count
    }

    /// Process events until `cancel` fires, then shut the channel down.
    pub async fn run(&mut self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                Some(event) = self.events_rx.recv() => self.handle_event(event),
            }
        }
        log::info!("[Session] Event loop stopped");
        self.shutdown();
    }

    /// Apply one event. This is the only place snapshot transitions driven
    /// by background work happen.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::ProbeCompleted(result) => self.on_probe_completed(result),
            SessionEvent::TriggerCompleted(result) => self.on_trigger_completed(result),
            SessionEvent::Channel(event) => self.on_channel_event(event),
        }
    }

    fn on_probe_completed(&mut self, result: Result<ProbeStatus, ProbeError>) {
        let (authenticated, error) = match result {
            Ok(status) => (status.authenticated, None),
            Err(e) => {
                log::warn!("[Session] Probe failed: {}", e);
                (false, Some(e.to_string()))
            }
        };

        self.update(|s| {
            let s = s.with_loading(false).with_authenticated(authenticated);
            match error {
                Some(e) => s.with_error(e),
                None => s,
            }
        });
        self.channel.set_authenticated(authenticated);
    }

    fn on_trigger_completed(&mut self, result: Result<(), TriggerError>) {
        self.trigger_in_flight = false;
        match result {
            Ok(()) => log::debug!("[Session] Data request accepted, waiting for push"),
            Err(e) => {
                log::warn!("[Session] Data request failed: {}", e);
                self.update(|s| s.with_error(e.to_string()).with_status(""));
            }
        }
    }

    fn on_channel_event(&mut self, event: ChannelEvent) {
        let Some(notice) = self.channel.handle_event(event) else {
            return;
        };

        match notice {
            ChannelNotice::Connected => self.update(|s| s.with_status(STATUS_CONNECTED)),
            ChannelNotice::Inbound(message) => {
                let next = |s: SessionSnapshot| match message {
                    InboundMessage::Data(data) => s.with_data(data),
                    InboundMessage::Error { error, details } => {
                        s.with_error_replacing_data(details.unwrap_or(error))
                    }
                };
                self.update(|s| next(s).with_status(STATUS_DATA_RECEIVED));
            }
            ChannelNotice::Fault(e) => {
                log::warn!("[Session] {}", e);
                self.update(|s| s.with_error(CHANNEL_ERROR_MESSAGE));
            }
            ChannelNotice::Disconnected { unexpected } => {
                if let Some(e) = unexpected {
                    log::warn!("[Session] {}", e);
                }
                self.update(|s| s.with_status(STATUS_DISCONNECTED));
            }
        }
    }

    /// Build the next snapshot from the current one and publish it.
    fn update(&mut self, f: impl FnOnce(SessionSnapshot) -> SessionSnapshot) {
        let next = f((*self.snapshot).clone());
        if next == *self.snapshot {
            return;
        }
        self.snapshot = Arc::new(next);
        self.snapshot_tx.send_replace(Arc::clone(&self.snapshot));
    }
}

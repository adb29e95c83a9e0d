//! Unified event channel for the session controller.
//!
//! All background producers (the probe task, trigger tasks, channel
//! transport tasks) send events through a single
//! `mpsc::UnboundedSender<SessionEvent>`. The controller receives on the
//! corresponding receiver and applies each event in
//! `SessionController::handle_event()`, one at a time, to completion.

use tokio::sync::mpsc;

use crate::channel::ChannelEvent;
use crate::error::{ProbeError, TriggerError};
use crate::session::ProbeStatus;

/// Event from a background producer delivered to the controller.
#[derive(Debug)]
pub enum SessionEvent {
    /// The startup authentication probe finished.
    ProbeCompleted(Result<ProbeStatus, ProbeError>),

    /// A trigger request finished. `Ok` only means the backend accepted it.
    TriggerCompleted(Result<(), TriggerError>),

    /// Lifecycle or payload event from a channel transport task.
    Channel(ChannelEvent),
}

/// Sending half of the controller's event queue.
pub type EventSender = mpsc::UnboundedSender<SessionEvent>;

/// Receiving half of the controller's event queue.
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// Create a new event queue.
#[must_use]
pub fn event_queue() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

//! Livefeed - authentication-gated realtime push client.
//!
//! This crate keeps three coupled facts consistent: whether the session is
//! authenticated, whether the realtime push channel to the backend is open,
//! and what the latest pushed payload is.
//!
//! # Architecture
//!
//! The crate follows a single-owner event loop:
//!
//! - **SessionController** - owns the snapshot and the event queue
//! - **ChannelManager** - owns the push channel; live iff authenticated
//! - **SessionProbe** - one-shot authentication check at startup
//! - **TriggerRequester** - asks the backend to start pushing
//!
//! Background tasks only send [`events::SessionEvent`]s; all state changes
//! happen in [`SessionController::handle_event`].
//!
//! # Modules
//!
//! - [`session`] - probe, trigger and controller
//! - [`channel`] - channel state machine and WebSocket transport
//! - [`snapshot`] - the immutable view state
//! - [`config`] - configuration loading/saving

// Library modules
pub mod backend;
pub mod channel;
pub mod events;
pub mod navigator;
pub mod session;
pub mod snapshot;
pub mod ws;

pub mod config;
pub mod constants;
pub mod env;
pub mod error;

// Re-export commonly used types
pub use backend::Backend;
pub use channel::{ChannelManager, ChannelStatus, InboundMessage};
pub use config::Config;
pub use error::{ChannelError, ProbeError, TriggerError};
pub use events::SessionEvent;
pub use navigator::{BrowserNavigator, Navigator};
pub use session::{SessionController, SessionProbe, TriggerRequester};
pub use snapshot::SessionSnapshot;

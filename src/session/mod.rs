//! Session state: the startup probe, the data trigger, and the controller
//! that composes them with the channel manager.
//!
//! - [`SessionProbe`] - one-shot `GET /api/status`
//! - [`TriggerRequester`] - one-shot `GET /api/get-data`
//! - [`SessionController`] - owns the [`SessionSnapshot`](crate::SessionSnapshot)

pub mod controller;
pub mod probe;
pub mod trigger;

pub use controller::SessionController;
pub use probe::{ProbeStatus, SessionProbe};
pub use trigger::TriggerRequester;

//! Shared fakes for integration tests.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use livefeed::channel::{ChannelId, ChannelLink, Connector};
use livefeed::events::EventSender;
use livefeed::navigator::Navigator;
use livefeed::SessionController;

/// What the fake transport was asked to do.
#[derive(Debug, Default)]
pub struct ConnectorCalls {
    pub connected: Vec<ChannelId>,
    pub closed: Vec<ChannelId>,
}

/// Connector that opens nothing; tests push channel events themselves.
#[derive(Debug, Default)]
pub struct FakeConnector {
    calls: Arc<Mutex<ConnectorCalls>>,
}

impl FakeConnector {
    pub fn new() -> (Self, Arc<Mutex<ConnectorCalls>>) {
        let connector = Self::default();
        let calls = Arc::clone(&connector.calls);
        (connector, calls)
    }
}

pub struct FakeLink {
    id: ChannelId,
    calls: Arc<Mutex<ConnectorCalls>>,
}

impl ChannelLink for FakeLink {
    fn close(&mut self) {
        self.calls.lock().unwrap().closed.push(self.id);
    }
}

impl Connector for FakeConnector {
    type Link = FakeLink;

    fn connect(&mut self, id: ChannelId, _events: EventSender) -> FakeLink {
        self.calls.lock().unwrap().connected.push(id);
        FakeLink {
            id,
            calls: Arc::clone(&self.calls),
        }
    }
}

/// Navigator that only remembers where it was sent.
#[derive(Debug, Default, Clone)]
pub struct RecordingNavigator {
    visited: Arc<Mutex<Vec<String>>>,
}

impl RecordingNavigator {
    pub fn visited(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.visited)
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &str) -> anyhow::Result<()> {
        self.visited.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

/// Apply exactly one event, failing the test if none arrives in time.
pub async fn step<C: Connector, N: Navigator>(ctl: &mut SessionController<C, N>) {
    tokio::time::timeout(Duration::from_secs(5), ctl.process_next_event())
        .await
        .expect("timed out waiting for a session event");
}

//! Production channel transport over WebSocket.
//!
//! Each [`WsConnector::connect`] spawns one tokio task that owns the socket
//! for that channel. The task reports everything through the controller's
//! event queue and listens on an `mpsc` channel for the close request sent
//! by [`WsLink::close`].
//!
//! The channel is receive-only: the client never sends data frames, only
//! the close handshake (pongs are answered inside tungstenite).

use tokio::sync::mpsc;

use super::{ChannelEvent, ChannelEventKind, ChannelId, ChannelLink, Connector};
use crate::backend::Backend;
use crate::constants::{CLOSE_ABNORMAL, CLOSE_NORMAL};
use crate::events::{EventSender, SessionEvent};
use crate::ws::{self, WsMessage};

/// Command from the manager to a transport task.
#[derive(Debug)]
enum LinkCommand {
    /// Initiate a graceful close (or abandon the handshake).
    Close,
}

/// Opens WebSocket channels to the backend's `/ws` endpoint, carrying the
/// session cookie from the backend's jar.
#[derive(Debug, Clone)]
pub struct WsConnector {
    backend: Backend,
}

impl WsConnector {
    /// Connector for `backend`.
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

impl Connector for WsConnector {
    type Link = WsLink;

    fn connect(&mut self, id: ChannelId, events: EventSender) -> WsLink {
        let url = self.backend.channel_url();
        let mut headers = Vec::new();
        if let Some(cookie) = self.backend.cookie_header() {
            headers.push(("Cookie".to_string(), cookie));
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let emitter = Emitter { id, events };
        tokio::spawn(run_channel(url, headers, emitter, command_rx));

        WsLink { id, command_tx }
    }
}

/// Handle to a running transport task.
///
/// Dropping it ends the task quietly: no close handshake, no more events.
#[derive(Debug)]
pub struct WsLink {
    id: ChannelId,
    command_tx: mpsc::UnboundedSender<LinkCommand>,
}

impl ChannelLink for WsLink {
    fn close(&mut self) {
        if self.command_tx.send(LinkCommand::Close).is_err() {
            log::debug!("[Channel] {} transport already finished", self.id);
        }
    }
}

/// Tags events with the channel id on their way into the event queue.
struct Emitter {
    id: ChannelId,
    events: EventSender,
}

impl Emitter {
    fn emit(&self, kind: ChannelEventKind) {
        // Receiver gone means the controller was dropped; nobody to tell.
        let _ = self
            .events
            .send(SessionEvent::Channel(ChannelEvent::new(self.id, kind)));
    }

    fn closed(&self, code: u16, reason: &str) {
        self.emit(ChannelEventKind::Closed {
            code,
            reason: reason.to_string(),
        });
    }
}

/// Run one channel: handshake, then relay frames until either side closes.
///
/// Guarantees at most one `Opened` and exactly one `Closed` per channel,
/// except when the link is dropped, which ends the task silently.
async fn run_channel(
    url: String,
    headers: Vec<(String, String)>,
    emitter: Emitter,
    mut commands: mpsc::UnboundedReceiver<LinkCommand>,
) {
    let id = emitter.id;
    let header_refs: Vec<(&str, &str)> = headers
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    log::info!("[Channel] {} connecting to {}", id, url);

    let (mut writer, mut reader) = tokio::select! {
        result = ws::connect(&url, &header_refs) => match result {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("[Channel] {} connect failed: {:#}", id, e);
                emitter.emit(ChannelEventKind::TransportError(format!("{e:#}")));
                emitter.closed(CLOSE_ABNORMAL, "connect failed");
                return;
            }
        },
        command = commands.recv() => {
            match command {
                Some(LinkCommand::Close) => {
                    log::info!("[Channel] {} close requested before open", id);
                    emitter.closed(CLOSE_NORMAL, "closed before open");
                }
                None => log::debug!("[Channel] {} abandoned while connecting", id),
            }
            return;
        }
    };

    log::info!("[Channel] {} open", id);
    emitter.emit(ChannelEventKind::Opened);

    loop {
        tokio::select! {
            frame = reader.recv() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        emitter.emit(ChannelEventKind::Message(text));
                    }
                    Some(Ok(WsMessage::Binary(data))) => {
                        let text = String::from_utf8_lossy(&data).into_owned();
                        emitter.emit(ChannelEventKind::Message(text));
                    }
                    // tungstenite queues the pong itself and flushes it on the next read.
                    Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => {}
                    Some(Ok(WsMessage::Close { code, reason })) => {
                        log::info!("[Channel] {} closed by server ({} {})", id, code, reason);
                        emitter.closed(code, &reason);
                        return;
                    }
                    Some(Err(e)) => {
                        log::warn!("[Channel] {} transport error: {:#}", id, e);
                        emitter.emit(ChannelEventKind::TransportError(format!("{e:#}")));
                        emitter.closed(CLOSE_ABNORMAL, "transport error");
                        return;
                    }
                    None => {
                        emitter.closed(CLOSE_ABNORMAL, "stream ended");
                        return;
                    }
                }
            }
            command = commands.recv() => {
                match command {
                    Some(LinkCommand::Close) => {
                        if let Err(e) = writer.send_close().await {
                            log::debug!("[Channel] {} close frame not sent: {:#}", id, e);
                        }
                        emitter.closed(CLOSE_NORMAL, "client requested close");
                    }
                    None => {
                        let _ = writer.close().await;
                    }
                }
                return;
            }
        }
    }
}

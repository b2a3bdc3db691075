//! Transport-agnostic push channel handle.
//!
//! A [`PushChannel`] sits on top of two queues: inbound [`Frame`]s produced by
//! a transport driver, and outbound [`Outbound`] commands consumed by it. The
//! channel decodes frames, tracks the connection lifecycle and turns
//! everything into [`PushEvent`]s in the fixed order
//! `Connected, Message*, (Closed | Error)`.

use crate::errors::PushError;
use crate::identity::ClientIdentity;
use crate::protocol::{ClientMessage, ServerMessage};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long `close` waits for the transport driver to flush the close frame.
const DRIVER_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Raw frame delivered by a transport driver.
#[derive(Debug, Clone)]
pub enum Frame {
    Text(String),
    Closed(String),
    Error(String),
}

/// Command for the transport driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Close,
}

/// Lifecycle notification surfaced to the owner of a channel.
#[derive(Debug, Clone)]
pub enum PushEvent {
    Connected,
    Message(ServerMessage),
    Closed(String),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    Connecting,
    Open,
    Closed,
}

/// One push connection scoped to a [`ClientIdentity`].
pub struct PushChannel {
    identity: ClientIdentity,
    frames: mpsc::Receiver<Frame>,
    outbound: mpsc::UnboundedSender<Outbound>,
    driver: Option<JoinHandle<()>>,
    state: LinkState,
    pong_seen: bool,
}

impl PushChannel {
    /// Build a channel over an already-established transport.
    pub fn from_transport(
        identity: ClientIdentity,
        frames: mpsc::Receiver<Frame>,
        outbound: mpsc::UnboundedSender<Outbound>,
    ) -> Self {
        Self {
            identity,
            frames,
            outbound,
            driver: None,
            state: LinkState::Connecting,
            pong_seen: false,
        }
    }

    /// Attach the task driving the underlying transport so `close` can join it.
    pub fn with_driver(mut self, driver: JoinHandle<()>) -> Self {
        self.driver = Some(driver);
        self
    }

    /// In-process channel whose far end is driven by the returned [`LoopbackPeer`].
    pub fn loopback(identity: ClientIdentity) -> (Self, LoopbackPeer) {
        let (frames_tx, frames_rx) = mpsc::channel(256);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let channel = Self::from_transport(identity, frames_rx, outbound_tx);
        let peer = LoopbackPeer {
            frames: frames_tx,
            outbound: outbound_rx,
        };
        (channel, peer)
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// Whether the server has echoed a pong on this connection.
    pub fn pong_seen(&self) -> bool {
        self.pong_seen
    }

    pub fn is_open(&self) -> bool {
        self.state == LinkState::Open
    }

    /// Send a message to the server.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::NotConnected`] before `Connected` has been
    /// observed, after the channel closed, or when the driver is gone.
    pub fn send(&mut self, message: &ClientMessage) -> Result<(), PushError> {
        if self.state != LinkState::Open {
            return Err(PushError::NotConnected);
        }
        let text = serde_json::to_string(message).map_err(|e| PushError::Connection {
            detail: format!("failed to encode {message:?}: {e}"),
        })?;
        self.outbound.send(Outbound::Text(text)).map_err(|_| {
            self.state = LinkState::Closed;
            PushError::NotConnected
        })
    }

    /// Ask the server to push the current status of `task_id`.
    pub fn request_status(&mut self, task_id: &str) -> Result<(), PushError> {
        self.send(&ClientMessage::GetStatus {
            task_id: task_id.to_string(),
        })
    }

    /// Wait for the next lifecycle event. Returns `None` once the channel
    /// has reported `Closed` or `Error`.
    ///
    /// Cancel-safe: usable as a `tokio::select!` branch.
    pub async fn next_event(&mut self) -> Option<PushEvent> {
        match self.state {
            LinkState::Closed => return None,
            LinkState::Connecting => {
                self.state = LinkState::Open;
                info!(identity = %self.identity, "Push channel connected");
                if let Err(e) = self.send(&ClientMessage::Ping) {
                    warn!(identity = %self.identity, error = %e, "Liveness probe not sent");
                }
                return Some(PushEvent::Connected);
            }
            LinkState::Open => {}
        }

        loop {
            let Some(frame) = self.frames.recv().await else {
                self.mark_closed();
                return Some(PushEvent::Closed("transport ended".to_string()));
            };

            match frame {
                Frame::Text(raw) => match ServerMessage::decode(&raw) {
                    Ok(ServerMessage::Pong { timestamp }) => {
                        debug!(identity = %self.identity, ?timestamp, "Received pong");
                        self.pong_seen = true;
                        return Some(PushEvent::Message(ServerMessage::Pong { timestamp }));
                    }
                    Ok(message) => return Some(PushEvent::Message(message)),
                    Err(e) => {
                        warn!(identity = %self.identity, error = %e, "Dropping push message");
                    }
                },
                Frame::Closed(reason) => {
                    self.mark_closed();
                    info!(identity = %self.identity, %reason, "Push channel closed");
                    return Some(PushEvent::Closed(reason));
                }
                Frame::Error(detail) => {
                    self.mark_closed();
                    warn!(identity = %self.identity, %detail, "Push channel error");
                    return Some(PushEvent::Error(detail));
                }
            }
        }
    }

    /// Close the connection. Consumes the handle, so a channel is closed at
    /// most once.
    pub async fn close(mut self) {
        // The driver may already be gone after a server-side close.
        let _ = self.outbound.send(Outbound::Close);
        self.mark_closed();
        if let Some(driver) = self.driver.take()
            && tokio::time::timeout(DRIVER_SHUTDOWN_GRACE, driver).await.is_err()
        {
            warn!(identity = %self.identity, "Push transport did not shut down in time");
        }
        debug!(identity = %self.identity, "Push channel released");
    }

    fn mark_closed(&mut self) {
        if self.state == LinkState::Closed {
            return;
        }
        if self.state == LinkState::Open && !self.pong_seen {
            warn!(identity = %self.identity, "No pong received before close");
        }
        self.state = LinkState::Closed;
    }
}

/// Far end of a [`PushChannel::loopback`] channel.
pub struct LoopbackPeer {
    frames: mpsc::Sender<Frame>,
    /// Commands the channel sent towards the server.
    pub outbound: mpsc::UnboundedReceiver<Outbound>,
}

impl LoopbackPeer {
    /// Deliver a raw text frame. Returns false when the channel is gone.
    pub async fn push_text(&self, text: impl Into<String>) -> bool {
        self.frames.send(Frame::Text(text.into())).await.is_ok()
    }

    pub async fn push_json(&self, value: &serde_json::Value) -> bool {
        self.push_text(value.to_string()).await
    }

    pub async fn close(&self, reason: impl Into<String>) -> bool {
        self.frames.send(Frame::Closed(reason.into())).await.is_ok()
    }

    pub async fn fail(&self, detail: impl Into<String>) -> bool {
        self.frames.send(Frame::Error(detail.into())).await.is_ok()
    }

    /// Drain every command sent so far.
    pub fn drain_outbound(&mut self) -> Vec<Outbound> {
        let mut out = Vec::new();
        while let Ok(cmd) = self.outbound.try_recv() {
            out.push(cmd);
        }
        out
    }
}

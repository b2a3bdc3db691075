//! WebSocket transport for the push channel.

use super::channel::{Frame, Outbound, PushChannel};
use super::PushConnector;
use crate::errors::PushError;
use crate::identity::ClientIdentity;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info};

/// Capacity of the inbound frame queue per connection.
const FRAME_QUEUE_CAPACITY: usize = 256;

/// Derive the push endpoint for `identity` from the pull base URL:
/// `http → ws`, `https → wss`, path suffixed with `/ws/{identity}`.
pub fn push_endpoint(base_url: &Url, identity: &ClientIdentity) -> Result<Url, PushError> {
    let scheme = match base_url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(PushError::Connection {
                detail: format!("unsupported base URL scheme '{other}'"),
            });
        }
    };

    let mut url = base_url.clone();
    url.set_scheme(scheme).map_err(|_| PushError::Connection {
        detail: format!("cannot derive push endpoint from {base_url}"),
    })?;
    let path = format!("{}/ws/{}", url.path().trim_end_matches('/'), identity);
    url.set_path(&path);
    url.set_query(None);
    Ok(url)
}

/// Opens push channels over WebSocket.
#[derive(Debug, Clone)]
pub struct WsConnector {
    base_url: Url,
}

impl WsConnector {
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }
}

#[async_trait]
impl PushConnector for WsConnector {
    async fn open(&self, identity: &ClientIdentity) -> Result<PushChannel, PushError> {
        let endpoint = push_endpoint(&self.base_url, identity)?;
        info!(%endpoint, "Connecting push channel");

        let (ws, _response) =
            connect_async(endpoint.as_str())
                .await
                .map_err(|e| PushError::Connection {
                    detail: e.to_string(),
                })?;

        let (frames_tx, frames_rx) = mpsc::channel(FRAME_QUEUE_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let driver = tokio::spawn(drive(ws, frames_tx, outbound_rx));

        Ok(PushChannel::from_transport(identity.clone(), frames_rx, outbound_tx).with_driver(driver))
    }
}

/// Pump frames between the socket and the channel queues until either side ends.
async fn drive(
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    frames: mpsc::Sender<Frame>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        let _ = frames.send(Frame::Error(e.to_string())).await;
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    let _ = sink.close().await;
                    debug!("Push transport closed by client");
                    break;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if frames.send(Frame::Text(text.as_str().to_string())).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Binary(bytes))) => {
                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    if frames.send(Frame::Text(text)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(close))) => {
                    let reason = close
                        .map(|c| format!("{} {}", u16::from(c.code), c.reason.as_str()))
                        .unwrap_or_else(|| "closed by server".to_string());
                    let _ = frames.send(Frame::Closed(reason.trim().to_string())).await;
                    break;
                }
                // Ping/pong control frames are answered by tungstenite.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = frames.send(Frame::Error(e.to_string())).await;
                    break;
                }
                None => {
                    let _ = frames.send(Frame::Closed("stream ended".to_string())).await;
                    break;
                }
            },
        }
    }
}

//! Notification client: wraps the WebSocket connection as a binary-frame
//! datagram pair. All messages are binary; anything else is a protocol
//! error. No heartbeat/auth policy lives here — that belongs to the
//! watcher, which owns the single reader.

use futures_util::{SinkExt, StreamExt};
use rec_protocol::Frame;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub struct NotifyClient {
    ws: WsStream,
}

impl NotifyClient {
    pub fn new(ws: WsStream) -> Self {
        NotifyClient { ws }
    }

    /// Send one already-encoded frame.
    pub async fn send(&mut self, frame: &Frame) -> Result<(), NotifyError> {
        let bytes = frame.encode().map_err(|e| NotifyError::Protocol(e.to_string()))?;
        self.ws
            .send(Message::Binary(bytes.into()))
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))
    }

    /// Receive and decode exactly one frame. A non-binary message is a
    /// protocol error; connection close is a transport error.
    pub async fn recv(&mut self) -> Result<Frame, NotifyError> {
        loop {
            match self.ws.next().await {
                None => return Err(NotifyError::Transport("connection closed".to_owned())),
                Some(Err(e)) => return Err(NotifyError::Transport(e.to_string())),
                Some(Ok(Message::Binary(bytes))) => {
                    return Frame::decode(&bytes).map_err(|e| NotifyError::Protocol(e.to_string()));
                }
                Some(Ok(Message::Close(_))) => {
                    return Err(NotifyError::Transport("connection closed".to_owned()))
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = self.ws.send(Message::Pong(data)).await;
                    continue;
                }
                Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(_non_binary)) => {
                    return Err(NotifyError::Protocol(
                        "non-binary message on notification channel".to_owned(),
                    ))
                }
            }
        }
    }
}

#[derive(Debug)]
pub enum NotifyError {
    Transport(String),
    Protocol(String),
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyError::Transport(s) => write!(f, "transport error: {s}"),
            NotifyError::Protocol(s) => write!(f, "protocol error: {s}"),
        }
    }
}

impl std::error::Error for NotifyError {}

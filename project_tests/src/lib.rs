//! Integration-test support for sentistream.
//!
//! Loopback WebSocket stubs that accept connections from a real
//! `StreamClient`, plus a probe handler that forwards every callback into
//! channels the test body can await.

use anyhow::Result;
use futures_util::StreamExt;
use serde_json::Value;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

use lib_stream::{StreamError, StreamHandler};

pub type StubSocket = WebSocketStream<TcpStream>;

/// Binds a stub endpoint on an ephemeral loopback port.
pub async fn bind_stub() -> Result<(TcpListener, String)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let url = stub_url(listener.local_addr()?);
    Ok((listener, url))
}

pub fn stub_url(addr: SocketAddr) -> String {
    format!("ws://{}", addr)
}

/// Accepts the next client connection and completes the handshake.
pub async fn accept_socket(listener: &TcpListener) -> Result<StubSocket> {
    let (stream, _) = listener.accept().await?;
    Ok(accept_async(stream).await?)
}

/// Reads frames until the next text frame, skipping control frames.
/// `None` once the connection ends.
pub async fn next_text(socket: &mut StubSocket) -> Option<String> {
    while let Some(frame) = socket.next().await {
        match frame {
            Ok(Message::Text(text)) => return Some(text.to_string()),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
    None
}

/// Handler that forwards every callback into channels.
pub struct Probe {
    messages: mpsc::UnboundedSender<Value>,
    opens: mpsc::UnboundedSender<()>,
    closes: mpsc::UnboundedSender<(Option<u16>, Option<String>)>,
    errors: mpsc::UnboundedSender<String>,
}

/// Receiving ends paired with a [`Probe`].
pub struct ProbeRx {
    pub messages: mpsc::UnboundedReceiver<Value>,
    pub opens: mpsc::UnboundedReceiver<()>,
    pub closes: mpsc::UnboundedReceiver<(Option<u16>, Option<String>)>,
    pub errors: mpsc::UnboundedReceiver<String>,
}

pub fn probe() -> (Probe, ProbeRx) {
    let (messages_tx, messages_rx) = mpsc::unbounded_channel();
    let (opens_tx, opens_rx) = mpsc::unbounded_channel();
    let (closes_tx, closes_rx) = mpsc::unbounded_channel();
    let (errors_tx, errors_rx) = mpsc::unbounded_channel();
    (
        Probe {
            messages: messages_tx,
            opens: opens_tx,
            closes: closes_tx,
            errors: errors_tx,
        },
        ProbeRx {
            messages: messages_rx,
            opens: opens_rx,
            closes: closes_rx,
            errors: errors_rx,
        },
    )
}

impl StreamHandler for Probe {
    fn on_message(&mut self, payload: Value) {
        let _ = self.messages.send(payload);
    }

    fn on_open(&mut self) {
        let _ = self.opens.send(());
    }

    fn on_close(&mut self, code: Option<u16>, reason: Option<String>) {
        let _ = self.closes.send((code, reason));
    }

    fn on_error(&mut self, error: &StreamError) {
        let _ = self.errors.send(error.to_string());
    }
}

//! # Reconnecting Stream Client
//!
//! One `StreamClient` owns one WebSocket connection at a time, plus the
//! outbound buffer and the retry schedule. All mutable state lives inside a
//! single owning task: inbound frames, commands from the handle and the
//! retry timer are serialized through one `tokio::select!` loop, so handler
//! callbacks never interleave and no field needs a lock.
//!
//! Connection loss is never fatal. Unless auto-reconnect is disabled, the
//! task keeps retrying with capped exponential backoff until the owner
//! tears the client down (an explicit `close()` or dropping the handle).

pub mod backoff;
pub mod queue;

use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use http::header::HeaderValue;
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::StreamError;

use self::backoff::{BackoffPolicy, ReconnectSchedule};
use self::queue::OutboundQueue;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Connection lifecycle, observable through [`StreamClient::state`].
///
/// `Closed` is terminal: it is only reached through explicit teardown or
/// when auto-reconnect is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Reconnecting,
    Closed,
}

/// Consumer callbacks, invoked only from the client's owning task.
///
/// `on_message` is the one required method; the rest default to no-ops.
pub trait StreamHandler: Send + 'static {
    /// Called with every successfully parsed inbound frame.
    fn on_message(&mut self, payload: Value);

    /// Called after each successful open, before the outbound queue drains.
    fn on_open(&mut self) {}

    /// Called when a connection ends, with the close code/reason when the
    /// remote sent one.
    fn on_close(&mut self, code: Option<u16>, reason: Option<String>) {
        let _ = (code, reason);
    }

    /// Called for transport-level failures. These are informational; the
    /// reconnect loop handles recovery.
    fn on_error(&mut self, error: &StreamError) {
        let _ = error;
    }
}

/// Construction parameters for [`StreamClient::connect`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Target address, e.g. `ws://localhost:8000/ws`.
    pub url: String,
    /// Sub-protocols advertised during the handshake.
    pub subprotocols: Vec<String>,
    /// Reconnect automatically after a connection loss. Defaults to true.
    pub auto_reconnect: bool,
    /// Fixed wait between reconnect attempts, overriding the exponential
    /// backoff curve when set to a positive interval.
    pub reconnect_interval: Option<Duration>,
    /// Log the per-frame chatter (enqueue/dequeue/drop lines) at debug level.
    pub debug: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8000".to_string(),
            subprotocols: Vec::new(),
            auto_reconnect: true,
            reconnect_interval: None,
            debug: false,
        }
    }
}

impl ClientOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

/// Normalized connection events, as consumed by the owning task.
///
/// The raw per-connection callbacks of the transport collapse into this one
/// variant set so a single task can own every state transition.
#[derive(Debug)]
pub enum SocketEvent {
    /// The handshake completed; the connection is usable.
    Opened,
    /// A UTF-8 text frame arrived.
    Message(String),
    /// The connection ended, with the remote's close code/reason if any.
    Closed {
        code: Option<u16>,
        reason: Option<String>,
    },
    /// The transport reported an error; the connection is treated as lost.
    Error(StreamError),
}

/// Maps a raw WebSocket message to the event the client consumes. Control
/// frames and binary payloads are outside the contract and map to `None`.
fn classify(message: Message) -> Option<SocketEvent> {
    match message {
        Message::Text(text) => Some(SocketEvent::Message(text.to_string())),
        Message::Close(frame) => {
            let (code, reason) = match frame {
                Some(frame) => (Some(u16::from(frame.code)), Some(frame.reason.to_string())),
                None => (None, None),
            };
            Some(SocketEvent::Closed { code, reason })
        }
        Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => None,
    }
}

enum Command {
    Send(String),
    Close,
}

/// How a connection (or connection attempt) ended.
enum ConnectionEnd {
    /// Lost to the network or the remote; eligible for reconnect.
    Lost {
        code: Option<u16>,
        reason: Option<String>,
    },
    /// The owner tore the client down.
    Teardown,
}

/// Handle to a running stream client.
///
/// Cheap to construct, single-owner. Dropping the handle tears the client
/// down: the pending retry timer is cancelled, the live connection is
/// closed and the owning task ends.
pub struct StreamClient {
    cmd_tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl StreamClient {
    /// Spawns the owning task and starts the first connection attempt
    /// immediately.
    pub fn connect<H: StreamHandler>(options: ClientOptions, handler: H) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        let task = ClientTask {
            schedule: ReconnectSchedule::new(BackoffPolicy::from_override(
                options.reconnect_interval,
            )),
            queue: OutboundQueue::new(),
            options,
            handler,
            cmd_rx,
            state_tx,
        };
        tokio::spawn(task.run());

        Self { cmd_tx, state_rx }
    }

    /// Serializes `payload` to a JSON text frame and hands it to the owning
    /// task: transmitted right away when the connection is open, buffered
    /// until the next open otherwise. Fire-and-forget; disconnection is
    /// never an error here.
    pub fn send<T: Serialize>(&self, payload: &T) -> Result<(), StreamError> {
        let frame = serde_json::to_string(payload)?;
        self.cmd_tx
            .send(Command::Send(frame))
            .map_err(|_| StreamError::Shutdown)
    }

    /// Tears the client down. Idempotent; safe to call any number of times.
    pub fn close(&self) {
        let _ = self.cmd_tx.send(Command::Close);
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// A watch receiver for observing lifecycle transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(Command::Close);
    }
}

struct ClientTask<H: StreamHandler> {
    options: ClientOptions,
    handler: H,
    schedule: ReconnectSchedule,
    queue: OutboundQueue,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<ConnectionState>,
}

impl<H: StreamHandler> ClientTask<H> {
    /// Outer reconnection loop: one iteration per connection attempt.
    async fn run(mut self) {
        loop {
            self.set_state(ConnectionState::Connecting);

            let end = match self.open_connection().await {
                Ok(ws) => {
                    log::info!("connected to {}", self.options.url);
                    self.run_connection(ws).await
                }
                Err(err) => {
                    log::error!("connection attempt to {} failed: {}", self.options.url, err);
                    self.handler.on_error(&err);
                    ConnectionEnd::Lost {
                        code: None,
                        reason: None,
                    }
                }
            };

            let (code, reason) = match end {
                ConnectionEnd::Teardown => break,
                ConnectionEnd::Lost { code, reason } => (code, reason),
            };
            self.handler.on_close(code, reason);

            if !self.options.auto_reconnect {
                log::info!("auto-reconnect disabled, staying down");
                break;
            }

            self.set_state(ConnectionState::Reconnecting);
            if !self.wait_for_retry().await {
                break;
            }
        }

        self.set_state(ConnectionState::Closed);
    }

    /// Opens one connection, advertising the configured sub-protocols.
    async fn open_connection(&mut self) -> Result<WsStream, StreamError> {
        let mut request = self.options.url.as_str().into_client_request()?;
        if !self.options.subprotocols.is_empty() {
            let protocols = self.options.subprotocols.join(", ");
            request.headers_mut().insert(
                http::header::SEC_WEBSOCKET_PROTOCOL,
                HeaderValue::from_str(&protocols)?,
            );
        }

        let (ws, _response) = connect_async(request).await?;
        Ok(ws)
    }

    /// Inner event loop for one live connection.
    async fn run_connection(&mut self, ws: WsStream) -> ConnectionEnd {
        let (mut write, mut read) = ws.split();

        if let Some(end) = self.on_event(SocketEvent::Opened, &mut write).await {
            return end;
        }

        loop {
            tokio::select! {
                command = self.cmd_rx.recv() => match command {
                    Some(Command::Send(frame)) => {
                        if let Some(end) = self.transmit(frame, &mut write).await {
                            return end;
                        }
                    }
                    Some(Command::Close) | None => {
                        let _ = write.close().await;
                        return ConnectionEnd::Teardown;
                    }
                },
                frame = read.next() => {
                    let event = match frame {
                        Some(Ok(message)) => match classify(message) {
                            Some(event) => event,
                            None => continue,
                        },
                        Some(Err(err)) => SocketEvent::Error(err.into()),
                        None => SocketEvent::Closed { code: None, reason: None },
                    };
                    if let Some(end) = self.on_event(event, &mut write).await {
                        return end;
                    }
                }
            }
        }
    }

    /// Applies one normalized event. Returns how the connection ended, if
    /// it did.
    async fn on_event(&mut self, event: SocketEvent, write: &mut WsSink) -> Option<ConnectionEnd> {
        match event {
            SocketEvent::Opened => {
                // Reset first: any successful open cools the backoff off.
                self.schedule.reset();
                self.set_state(ConnectionState::Open);
                self.handler.on_open();
                self.drain_queue(write).await
            }
            SocketEvent::Message(text) => {
                self.dispatch_frame(&text);
                None
            }
            SocketEvent::Closed { code, reason } => {
                log::warn!(
                    "connection to {} closed (code: {:?})",
                    self.options.url,
                    code
                );
                Some(ConnectionEnd::Lost { code, reason })
            }
            SocketEvent::Error(err) => {
                log::error!("transport error on {}: {}", self.options.url, err);
                self.handler.on_error(&err);
                Some(ConnectionEnd::Lost {
                    code: None,
                    reason: None,
                })
            }
        }
    }

    /// Sends every buffered frame, oldest first. Runs before any command
    /// issued after the open is looked at.
    async fn drain_queue(&mut self, write: &mut WsSink) -> Option<ConnectionEnd> {
        while let Some(frame) = self.queue.pop() {
            self.debug_line(|| format!("dequeuing buffered frame: {frame}"));
            if let Some(end) = self.transmit(frame, write).await {
                return Some(end);
            }
        }
        None
    }

    /// Transmits one frame. On failure the frame goes back to the front of
    /// the queue so buffered order survives the next open.
    async fn transmit(&mut self, frame: String, write: &mut WsSink) -> Option<ConnectionEnd> {
        match write.send(Message::text(frame.clone())).await {
            Ok(()) => None,
            Err(err) => {
                self.queue.requeue(frame);
                self.handler.on_error(&err.into());
                Some(ConnectionEnd::Lost {
                    code: None,
                    reason: None,
                })
            }
        }
    }

    /// Decodes an inbound text frame and hands it to the consumer. A frame
    /// that is not valid JSON is dropped here and never reaches the
    /// consumer.
    fn dispatch_frame(&mut self, text: &str) {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => {
                self.debug_line(|| format!("frame received: {text}"));
                self.handler.on_message(value);
            }
            Err(err) => {
                self.debug_line(|| format!("dropping malformed frame: {err}"));
            }
        }
    }

    /// Sleeps out the backoff interval while still accepting commands:
    /// sends issued while disconnected buffer up without disturbing the
    /// timer, and a teardown cancels it. Returns false on teardown.
    async fn wait_for_retry(&mut self) -> bool {
        let attempt = self.schedule.attempt();
        let delay = self.schedule.next_delay();
        log::info!(
            "retrying {} in {:?} (attempt {})",
            self.options.url,
            delay,
            attempt
        );

        let timer = tokio::time::sleep(delay);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                _ = &mut timer => return true,
                command = self.cmd_rx.recv() => match command {
                    Some(Command::Send(frame)) => {
                        self.debug_line(|| format!("enqueuing frame while disconnected: {frame}"));
                        self.queue.push(frame);
                    }
                    Some(Command::Close) | None => return false,
                }
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    fn debug_line(&self, line: impl FnOnce() -> String) {
        if self.options.debug {
            log::debug!("{}", line());
        }
    }
}

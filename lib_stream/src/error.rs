use thiserror::Error;

/// Errors surfaced by the stream client.
///
/// Transport errors are reported through [`StreamHandler::on_error`] and are
/// never fatal to the client; the reconnect loop keeps running until teardown.
/// Only `Serialize` and `Shutdown` are returned to the `send` caller.
///
/// [`StreamHandler::on_error`]: crate::client::StreamHandler::on_error
#[derive(Debug, Error)]
pub enum StreamError {
    /// The underlying WebSocket transport failed (connect, read or write).
    #[error("websocket transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// The caller handed `send` a payload that JSON serialization rejected.
    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The configured sub-protocol list cannot be encoded as a header value.
    #[error("invalid sub-protocol list: {0}")]
    Subprotocol(#[from] http::header::InvalidHeaderValue),

    /// The client has been torn down; its owning task is gone.
    #[error("stream client has been shut down")]
    Shutdown,
}

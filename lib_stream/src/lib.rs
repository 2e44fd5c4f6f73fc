//! # lib_stream
//!
//! Core library for sentistream: a reconnecting WebSocket stream client
//! (buffered sends, capped exponential backoff) and the live trend
//! aggregation the dashboard reads (polarity tally, bounded top-K term
//! ranking).

// Declare the modules to re-export
pub mod client;
pub mod error;
pub mod model;
pub mod trends;

// Re-export the everyday surface
pub use client::backoff::{BackoffPolicy, ReconnectSchedule};
pub use client::queue::OutboundQueue;
pub use client::{ClientOptions, ConnectionState, SocketEvent, StreamClient, StreamHandler};
pub use error::StreamError;
pub use model::{SentimentEvent, TrackRequest};
pub use trends::{top_k, FrequencyTable, MaxHeap, Polarity, PolarityTally, TrendTracker};

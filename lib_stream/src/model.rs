use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One inbound event from the sentiment feed.
///
/// `polarity` is a continuous score in roughly [-1.0, 1.0]; classification
/// into buckets happens on the consumer side (see [`crate::trends::Polarity`]).
/// `hashtags` carries the tag occurrence counts extracted from the event,
/// keyed by tag text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentEvent {
    pub polarity: f64,
    #[serde(default)]
    pub hashtags: HashMap<String, u64>,
    /// Raw text of the source post, when the feed includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// RFC 3339 timestamp stamped by the feed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

/// Outbound request selecting the query the feed should stream events for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackRequest {
    pub track: String,
}

impl TrackRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            track: query.into(),
        }
    }
}

//! # Live Trend Aggregation
//!
//! Consumer-side summaries built from the event stream: a three-bucket
//! polarity tally and a bounded ranking of the most frequent tags. Both are
//! plain in-memory accumulators the UI polls after each inbound event;
//! nothing here persists or fans out.

pub mod freq;
pub mod maxheap;
pub mod topk;

pub use freq::FrequencyTable;
pub use maxheap::{HeapNode, MaxHeap};
pub use topk::top_k;

use crate::model::SentimentEvent;

/// Score above which an event counts as positive; the mirrored value
/// bounds negative. Scores in between are neutral.
const POLARITY_THRESHOLD: f64 = 0.05;

/// Polarity bucket of a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Positive,
    Negative,
    Neutral,
}

impl Polarity {
    /// Buckets a continuous score.
    pub fn classify(score: f64) -> Self {
        if score > POLARITY_THRESHOLD {
            Polarity::Positive
        } else if score < -POLARITY_THRESHOLD {
            Polarity::Negative
        } else {
            Polarity::Neutral
        }
    }
}

/// Running polarity counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolarityTally {
    pub positive: u64,
    pub negative: u64,
    pub neutral: u64,
}

impl PolarityTally {
    pub fn record(&mut self, polarity: Polarity) {
        match polarity {
            Polarity::Positive => self.positive += 1,
            Polarity::Negative => self.negative += 1,
            Polarity::Neutral => self.neutral += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.positive + self.negative + self.neutral
    }
}

/// Aggregates the event stream into the two live summaries.
///
/// `limit` bounds the leaderboard. While the tag space is still at or
/// below the limit there is nothing to rank and the full table passes
/// through as-is; ranking kicks in only once the table outgrows it.
#[derive(Debug)]
pub struct TrendTracker {
    tally: PolarityTally,
    terms: FrequencyTable,
    limit: usize,
}

impl TrendTracker {
    pub fn new(limit: usize) -> Self {
        Self {
            tally: PolarityTally::default(),
            terms: FrequencyTable::new(),
            limit,
        }
    }

    /// Folds one event into both summaries.
    pub fn apply(&mut self, event: &SentimentEvent) {
        self.tally.record(Polarity::classify(event.polarity));
        for (tag, occurrences) in &event.hashtags {
            self.terms.add(tag, *occurrences);
        }
    }

    pub fn tally(&self) -> &PolarityTally {
        &self.tally
    }

    pub fn terms(&self) -> &FrequencyTable {
        &self.terms
    }

    /// Current ranking snapshot: at most `limit` entries, descending by
    /// count once the table exceeds the limit, the raw table otherwise.
    pub fn leaderboard(&self) -> Vec<(String, u64)> {
        if self.terms.len() > self.limit {
            top_k(&self.terms, self.limit)
        } else {
            self.terms
                .iter()
                .map(|(term, count)| (term.to_string(), count))
                .collect()
        }
    }

    /// Starts both summaries over, e.g. when the tracked query changes.
    pub fn reset(&mut self) {
        self.tally = PolarityTally::default();
        self.terms.reset();
    }
}

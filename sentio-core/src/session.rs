//! Session-scoped per-label statistics.
//!
//! `SessionAccumulator` is the engine's only shared mutable resource: one
//! producer (the pipeline task) records events while any number of readers
//! query summaries. A single `parking_lot::Mutex` around the whole state
//! makes every operation linearizable — no reader ever observes a torn
//! update or a half-cleared reset.
//!
//! Sessions are identified by a generation counter. `begin_session()` clears
//! the map and bumps the generation in one critical section; `record()`
//! carries the generation it was produced under and is rejected when stale.
//! This closes the start/reset race: an event from a previous session that is
//! still mid-flight when a new session begins can never contaminate it.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::events::PredominantSentiment;

/// Mutable per-label aggregate, owned exclusively by the accumulator for the
/// lifetime of one session.
#[derive(Debug, Clone, Copy)]
struct LabelStat {
    total_confidence: f64,
    occurrences: u64,
    last_updated: f64,
}

impl LabelStat {
    fn empty() -> Self {
        Self {
            total_confidence: 0.0,
            occurrences: 0,
            // Any finite timestamp advances past this on the first record.
            last_updated: f64::NEG_INFINITY,
        }
    }
}

#[derive(Debug)]
struct Inner {
    stats: HashMap<String, LabelStat>,
    generation: u64,
}

/// Concurrency-safe running statistics for the current session.
#[derive(Debug)]
pub struct SessionAccumulator {
    inner: Mutex<Inner>,
}

impl SessionAccumulator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                stats: HashMap::new(),
                generation: 0,
            }),
        }
    }

    /// The generation records must currently carry to be accepted.
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// Clear all statistics and open a new session, atomically.
    ///
    /// Returns the new generation. Callers must obtain this before feeding
    /// any event of the new session, which makes the reset an ordering
    /// barrier rather than a fire-and-forget dispatch.
    pub fn begin_session(&self) -> u64 {
        let mut inner = self.inner.lock();
        inner.stats.clear();
        inner.generation += 1;
        inner.generation
    }

    /// Close the current session without clearing: statistics stay readable
    /// but records tagged with the old generation are rejected from now on.
    pub fn close_session(&self) {
        self.inner.lock().generation += 1;
    }

    /// Fold one observation into the label's aggregate.
    ///
    /// Returns `false` without mutating anything when `generation` is stale
    /// or the sample is malformed (empty label, confidence outside [0, 1],
    /// non-finite confidence or timestamp). `last_updated` only ever moves
    /// forward within a session.
    pub fn record(&self, generation: u64, label: &str, confidence: f32, timestamp: f64) -> bool {
        if label.is_empty()
            || !confidence.is_finite()
            || !(0.0..=1.0).contains(&confidence)
            || !timestamp.is_finite()
        {
            return false;
        }

        let mut inner = self.inner.lock();
        if generation != inner.generation {
            return false;
        }
        let stat = inner
            .stats
            .entry(label.to_owned())
            .or_insert_with(LabelStat::empty);
        stat.occurrences += 1;
        stat.total_confidence += f64::from(confidence);
        stat.last_updated = stat.last_updated.max(timestamp);
        true
    }

    /// The label with the greatest cumulative confidence sum, or `None` when
    /// nothing has been recorded.
    ///
    /// Ranking is by sum, not peak or average. Ties on the sum prefer the
    /// more recently updated label; should both the sum and `last_updated`
    /// tie, the lexicographically greater label wins so the result is fully
    /// deterministic regardless of map iteration order.
    pub fn predominant(&self) -> Option<PredominantSentiment> {
        let inner = self.inner.lock();
        inner
            .stats
            .iter()
            .max_by(|(label_a, a), (label_b, b)| {
                a.total_confidence
                    .total_cmp(&b.total_confidence)
                    .then(a.last_updated.total_cmp(&b.last_updated))
                    .then(label_a.as_str().cmp(label_b.as_str()))
            })
            .map(|(label, stat)| derive_summary(label, stat))
    }

    /// Point-in-time scoreboard: every label mapped to its derived summary.
    pub fn snapshot(&self) -> HashMap<String, PredominantSentiment> {
        let inner = self.inner.lock();
        inner
            .stats
            .iter()
            .map(|(label, stat)| (label.clone(), derive_summary(label, stat)))
            .collect()
    }

    /// Number of distinct labels recorded this session.
    pub fn label_count(&self) -> usize {
        self.inner.lock().stats.len()
    }
}

impl Default for SessionAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

fn derive_summary(label: &str, stat: &LabelStat) -> PredominantSentiment {
    // Entries only exist after a successful record, so occurrences ≥ 1.
    PredominantSentiment {
        label: label.to_owned(),
        score: stat.total_confidence,
        average_confidence: stat.total_confidence / stat.occurrences as f64,
        occurrences: stat.occurrences,
        last_updated: stat.last_updated,
    }
}

//! Event types crossing the engine boundary.
//!
//! | Type | Direction |
//! |------|-----------|
//! | `ClassificationEvent` | classifier → engine (via `EventFeed`) |
//! | `StableLabelEvent` | engine → display subscribers |
//! | `EngineStatusEvent` | engine → status subscribers |
//! | `PredominantSentiment` | engine → summary queries |
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` with camelCase
//! field names so integrators can forward them over an IPC bus unchanged.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Classifier input
// ---------------------------------------------------------------------------

/// A single timestamped (label, confidence) observation from the external
/// classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationEvent {
    /// Classifier label (e.g. `"dog"`, `"joy"`). Never empty for a valid event.
    pub label: String,
    /// Classifier confidence in [0.0, 1.0].
    pub confidence: f32,
    /// Position on the classifier's media timeline, in seconds. Opaque to the
    /// engine beyond monotonic comparison.
    pub timestamp: f64,
}

impl ClassificationEvent {
    pub fn new(label: impl Into<String>, confidence: f32, timestamp: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
            timestamp,
        }
    }

    /// Whether this event may enter the engine at all.
    ///
    /// A malformed event (empty label, confidence outside [0, 1], non-finite
    /// confidence or timestamp) is dropped rather than clamped — one lost
    /// sample is cheaper than a poisoned session aggregate.
    pub fn is_valid(&self) -> bool {
        !self.label.is_empty()
            && self.confidence.is_finite()
            && (0.0..=1.0).contains(&self.confidence)
            && self.timestamp.is_finite()
    }
}

// ---------------------------------------------------------------------------
// Stable label events
// ---------------------------------------------------------------------------

/// Emitted to `subscribe_stable_labels()` whenever the smoothed display
/// string changes. Consecutive identical displays are suppressed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StableLabelEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    /// The window's current mode label.
    pub label: String,
    /// Confidence of that label's most recent occurrence in the window.
    pub confidence: f32,
    /// Pre-formatted display string, e.g. `"dog (83%)"`.
    pub display: String,
}

// ---------------------------------------------------------------------------
// Session summaries
// ---------------------------------------------------------------------------

/// Derived, read-only summary of one label's session statistics.
///
/// Computed on demand from the accumulator — never stored as authoritative
/// state. `occurrences` is always ≥ 1 and `average_confidence` always lies
/// in [0, 1] for any value the engine returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredominantSentiment {
    pub label: String,
    /// Cumulative confidence sum for this label (the ranking key).
    pub score: f64,
    /// `score / occurrences`.
    pub average_confidence: f64,
    pub occurrences: u64,
    /// Timestamp of the most recent record for this label.
    pub last_updated: f64,
}

// ---------------------------------------------------------------------------
// Engine status events
// ---------------------------------------------------------------------------

/// Emitted to `subscribe_status()` when the engine state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatusEvent {
    pub status: EngineStatus,
    /// Optional human-readable detail.
    pub detail: Option<String>,
}

/// Current state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// Engine created but `start()` not yet called.
    Idle,
    /// Session open — consuming classifier events.
    Listening,
    /// Session closed; statistics frozen until the next `start()`.
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_event_serializes_with_camel_case_fields() {
        let event = ClassificationEvent::new("dog", 0.83, 1.25);

        let json = serde_json::to_value(&event).expect("serialize classification event");
        assert_eq!(json["label"], "dog");
        let conf = json["confidence"]
            .as_f64()
            .expect("confidence should serialize as number");
        assert!((conf - 0.83).abs() < 1e-5);
        assert_eq!(json["timestamp"], 1.25);

        let round_trip: ClassificationEvent =
            serde_json::from_value(json).expect("deserialize classification event");
        assert_eq!(round_trip, event);
    }

    #[test]
    fn malformed_events_are_invalid() {
        assert!(ClassificationEvent::new("dog", 0.5, 1.0).is_valid());
        assert!(!ClassificationEvent::new("", 0.5, 1.0).is_valid());
        assert!(!ClassificationEvent::new("dog", -0.1, 1.0).is_valid());
        assert!(!ClassificationEvent::new("dog", 1.1, 1.0).is_valid());
        assert!(!ClassificationEvent::new("dog", f32::NAN, 1.0).is_valid());
        assert!(!ClassificationEvent::new("dog", 0.5, f64::NAN).is_valid());
        // Boundary confidences are valid, not clamped away.
        assert!(ClassificationEvent::new("dog", 0.0, 0.0).is_valid());
        assert!(ClassificationEvent::new("dog", 1.0, 0.0).is_valid());
    }

    #[test]
    fn engine_status_event_serializes_with_lowercase_status() {
        let event = EngineStatusEvent {
            status: EngineStatus::Listening,
            detail: Some("session open".into()),
        };

        let json = serde_json::to_value(&event).expect("serialize status event");
        assert_eq!(json["status"], "listening");
        assert_eq!(json["detail"], "session open");

        let round_trip: EngineStatusEvent =
            serde_json::from_value(json).expect("deserialize status event");
        assert_eq!(round_trip.status, EngineStatus::Listening);
        assert_eq!(round_trip.detail.as_deref(), Some("session open"));
    }

    #[test]
    fn predominant_sentiment_serializes_with_camel_case_fields() {
        let summary = PredominantSentiment {
            label: "joy".into(),
            score: 2.4,
            average_confidence: 0.8,
            occurrences: 3,
            last_updated: 9.5,
        };

        let json = serde_json::to_value(&summary).expect("serialize summary");
        assert_eq!(json["label"], "joy");
        assert_eq!(json["score"], 2.4);
        assert_eq!(json["averageConfidence"], 0.8);
        assert_eq!(json["occurrences"], 3);
        assert_eq!(json["lastUpdated"], 9.5);
    }

    #[test]
    fn engine_status_rejects_non_lowercase_values() {
        let invalid = r#""Listening""#;
        let err = serde_json::from_str::<EngineStatus>(invalid);
        assert!(err.is_err(), "expected invalid casing to fail");
    }
}

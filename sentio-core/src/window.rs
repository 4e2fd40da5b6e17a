//! Flicker suppression over a bounded sliding window of classifications.
//!
//! ## Algorithm
//!
//! 1. Append the event; evict the oldest once the window exceeds capacity.
//! 2. Count occurrences of each label in the window and take the maximum.
//! 3. Ties on the maximum count go to the label observed most recently
//!    (so when every label in the window is distinct, the just-pushed label
//!    wins — deterministic, no oscillation).
//! 4. Report the confidence of that label's latest occurrence.
//! 5. Emit only when the formatted display string actually changed.

use std::collections::{HashMap, VecDeque};

use crate::events::ClassificationEvent;

/// Default window capacity: 6 events ≈ 3 s of output at a 2 Hz classifier.
pub const DEFAULT_WINDOW_CAPACITY: usize = 6;

/// The smoothed label currently dominating the window.
#[derive(Debug, Clone, PartialEq)]
pub struct StableLabel {
    pub label: String,
    /// Confidence of this label's most recent occurrence in the window.
    pub confidence: f32,
    /// Pre-formatted display string, e.g. `"dog (83%)"`.
    pub display: String,
}

/// Bounded FIFO window producing a flicker-resistant "stable label".
///
/// Single-owner state — lives inside the pipeline task and needs no lock.
/// Never blocks, never fails.
#[derive(Debug)]
pub struct StabilityWindow {
    capacity: usize,
    events: VecDeque<ClassificationEvent>,
    /// The last display string emitted; identical consecutive displays are
    /// suppressed.
    last_display: Option<String>,
}

impl StabilityWindow {
    /// Create a window holding at most `capacity` events (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity + 1),
            last_display: None,
        }
    }

    /// Append an event and recompute the window mode.
    ///
    /// Returns `Some(StableLabel)` only when the resulting display string
    /// differs from the previous emission; a no-change push returns `None`
    /// and has no observable side effect beyond the window contents.
    pub fn push(&mut self, event: ClassificationEvent) -> Option<StableLabel> {
        self.events.push_back(event);
        if self.events.len() > self.capacity {
            self.events.pop_front();
        }

        let (label, confidence) = self.mode()?;
        let display = format_display(&label, confidence);
        if self.last_display.as_deref() == Some(display.as_str()) {
            return None;
        }
        self.last_display = Some(display.clone());
        Some(StableLabel {
            label,
            confidence,
            display,
        })
    }

    /// Empty the window. The next emission is never suppressed against a
    /// display from before the reset.
    pub fn reset(&mut self) {
        self.events.clear();
        self.last_display = None;
    }

    /// The display string of the last emission, if any.
    pub fn current_display(&self) -> Option<&str> {
        self.last_display.as_deref()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Window mode with the most-recent-occurrence tie-break.
    ///
    /// Returns the winning label and the confidence of its latest occurrence,
    /// or `None` for an empty window.
    fn mode(&self) -> Option<(String, f32)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for event in &self.events {
            *counts.entry(event.label.as_str()).or_default() += 1;
        }
        let max_count = counts.values().copied().max()?;

        // Scanning back-to-front, the first event whose label carries the
        // maximum count is both the tie-break winner and that label's latest
        // occurrence.
        self.events
            .iter()
            .rev()
            .find(|event| counts[event.label.as_str()] == max_count)
            .map(|event| (event.label.clone(), event.confidence))
    }
}

impl Default for StabilityWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}

/// Render a (label, confidence) pair as a display string.
///
/// Confidence is shown as a whole percent, so sub-percent jitter does not
/// defeat the change-suppression check.
pub fn format_display(label: &str, confidence: f32) -> String {
    format!("{label} ({:.0}%)", confidence * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(label: &str, confidence: f32) -> ClassificationEvent {
        ClassificationEvent::new(label, confidence, 0.0)
    }

    #[test]
    fn length_never_exceeds_capacity() {
        let mut window = StabilityWindow::new(6);
        for i in 0..50 {
            window.push(ev(&format!("label-{i}"), 0.5));
            assert!(window.len() <= 6);
        }
        assert_eq!(window.len(), 6);
    }

    #[test]
    fn first_push_emits() {
        let mut window = StabilityWindow::default();
        let stable = window.push(ev("dog", 0.8)).expect("first push should emit");
        assert_eq!(stable.label, "dog");
        assert_eq!(stable.display, "dog (80%)");
    }

    #[test]
    fn repeated_display_is_suppressed() {
        let mut window = StabilityWindow::default();
        assert!(window.push(ev("dog", 0.8)).is_some());
        // Same label, same whole-percent confidence — no emission.
        assert!(window.push(ev("dog", 0.8)).is_none());
        assert!(window.push(ev("dog", 0.801)).is_none());
        // Confidence moved a whole percent — display changes, emission fires.
        let stable = window.push(ev("dog", 0.9)).expect("changed display emits");
        assert_eq!(stable.display, "dog (90%)");
    }

    #[test]
    fn tie_break_prefers_most_recent_occurrence() {
        // dog:3 vs cat:3 — cat was pushed last, so cat wins, reported with
        // the confidence of that final cat event.
        let mut window = StabilityWindow::new(6);
        let pushes = [
            ("dog", 0.9),
            ("dog", 0.8),
            ("cat", 0.4),
            ("dog", 0.7),
            ("cat", 0.5),
            ("cat", 0.6),
        ];
        let mut last = None;
        for (label, confidence) in pushes {
            if let Some(stable) = window.push(ev(label, confidence)) {
                last = Some(stable);
            }
        }
        let stable = last.expect("at least one emission");
        assert_eq!(stable.label, "cat");
        assert!((stable.confidence - 0.6).abs() < 1e-6);
        assert_eq!(stable.display, "cat (60%)");
    }

    #[test]
    fn all_distinct_labels_latest_push_wins() {
        let mut window = StabilityWindow::new(6);
        window.push(ev("a", 0.1));
        window.push(ev("b", 0.2));
        let stable = window.push(ev("c", 0.3)).expect("distinct labels emit");
        assert_eq!(stable.label, "c");
    }

    #[test]
    fn majority_label_survives_one_off_flicker() {
        let mut window = StabilityWindow::new(6);
        for _ in 0..4 {
            window.push(ev("dog", 0.8));
        }
        // A single stray "cat" must not flip the stable label.
        assert!(window.push(ev("cat", 0.99)).is_none());
        assert_eq!(window.current_display(), Some("dog (80%)"));
    }

    #[test]
    fn eviction_lets_new_majority_take_over() {
        let mut window = StabilityWindow::new(3);
        window.push(ev("dog", 0.8));
        window.push(ev("dog", 0.8));
        window.push(ev("cat", 0.7));
        window.push(ev("cat", 0.7)); // evicts a dog → cat:2, dog:1
        assert_eq!(window.current_display(), Some("cat (70%)"));
    }

    #[test]
    fn reset_empties_and_forgets_last_emission() {
        let mut window = StabilityWindow::default();
        window.push(ev("dog", 0.8));
        window.reset();
        assert!(window.is_empty());
        assert_eq!(window.current_display(), None);
        // Same display as before the reset still emits again.
        let stable = window.push(ev("dog", 0.8)).expect("post-reset push emits");
        assert_eq!(stable.display, "dog (80%)");
    }

    #[test]
    fn capacity_is_clamped_to_at_least_one() {
        let mut window = StabilityWindow::new(0);
        assert_eq!(window.capacity(), 1);
        window.push(ev("a", 0.5));
        window.push(ev("b", 0.5));
        assert_eq!(window.len(), 1);
    }
}

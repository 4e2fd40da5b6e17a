//! # sentio-core
//!
//! Real-time classification stabilization & session aggregation engine.
//!
//! ## Architecture
//!
//! ```text
//! Classifier → EventFeed → Pipeline(spawn_blocking)
//!                              │
//!                ┌─────────────┴──────────────┐
//!         StabilityWindow              SessionAccumulator
//!         (flicker-free label)         (per-label statistics)
//!                │                             │
//!   broadcast::Sender<StableLabelEvent>   predominant() / snapshot()
//! ```
//!
//! The engine consumes `(label, confidence, timestamp)` events from an
//! external classifier. A bounded sliding window smooths them into a stable
//! label for live display; a mutex-guarded accumulator folds them into
//! session statistics and reports the predominant label when the session
//! stops. Capture, inference, and rendering are the integrator's problem.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod engine;
pub mod error;
pub mod events;
pub mod session;
pub mod window;

// Convenience re-exports for downstream crates
pub use engine::{EngineConfig, EventFeed, SentioEngine};
pub use error::SentioError;
pub use events::{
    ClassificationEvent, EngineStatus, EngineStatusEvent, PredominantSentiment, StableLabelEvent,
};
pub use session::SessionAccumulator;
pub use window::{StabilityWindow, StableLabel};

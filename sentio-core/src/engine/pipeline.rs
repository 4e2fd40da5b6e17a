//! Blocking event-routing loop.
//!
//! ## Per-event stages
//!
//! ```text
//! 1. Receive ClassificationEvent from the feed channel
//! 2. Validate (label non-empty, confidence in [0,1], finite fields,
//!    configured minimum confidence) — malformed samples are dropped
//! 3. Route to SessionAccumulator::record (session statistics)
//! 4. Route to StabilityWindow::push (live display)
//! 5. If the stable display changed, broadcast a StableLabelEvent
//! ```
//!
//! Stages 3 and 4 are independent — neither orders the other. The whole loop
//! runs in `spawn_blocking`, keeping the Tokio executor free for the
//! integrator's I/O.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    engine::EngineConfig,
    events::{ClassificationEvent, StableLabelEvent},
    session::SessionAccumulator,
    window::StabilityWindow,
};

/// How long to block on the feed before re-checking the running flag.
const FEED_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Routing counters for observability.
pub struct PipelineDiagnostics {
    pub events_in: AtomicUsize,
    pub events_rejected: AtomicUsize,
    pub stable_updates: AtomicUsize,
    pub stable_suppressed: AtomicUsize,
    pub records: AtomicUsize,
    pub records_rejected: AtomicUsize,
}

impl Default for PipelineDiagnostics {
    fn default() -> Self {
        Self {
            events_in: AtomicUsize::new(0),
            events_rejected: AtomicUsize::new(0),
            stable_updates: AtomicUsize::new(0),
            stable_suppressed: AtomicUsize::new(0),
            records: AtomicUsize::new(0),
            records_rejected: AtomicUsize::new(0),
        }
    }
}

impl PipelineDiagnostics {
    pub fn reset(&self) {
        self.events_in.store(0, Ordering::Relaxed);
        self.events_rejected.store(0, Ordering::Relaxed);
        self.stable_updates.store(0, Ordering::Relaxed);
        self.stable_suppressed.store(0, Ordering::Relaxed);
        self.records.store(0, Ordering::Relaxed);
        self.records_rejected.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            events_in: self.events_in.load(Ordering::Relaxed),
            events_rejected: self.events_rejected.load(Ordering::Relaxed),
            stable_updates: self.stable_updates.load(Ordering::Relaxed),
            stable_suppressed: self.stable_suppressed.load(Ordering::Relaxed),
            records: self.records.load(Ordering::Relaxed),
            records_rejected: self.records_rejected.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DiagnosticsSnapshot {
    pub events_in: usize,
    pub events_rejected: usize,
    pub stable_updates: usize,
    pub stable_suppressed: usize,
    pub records: usize,
    pub records_rejected: usize,
}

/// All context the pipeline needs, passed as one struct so the closure stays tidy.
pub struct PipelineContext {
    pub config: EngineConfig,
    pub accumulator: Arc<SessionAccumulator>,
    /// Session generation every record of this run is tagged with.
    pub generation: u64,
    pub feed_rx: Receiver<ClassificationEvent>,
    pub running: Arc<AtomicBool>,
    pub stable_tx: broadcast::Sender<StableLabelEvent>,
    pub seq: Arc<AtomicU64>,
    /// Last emitted display string, shared with the engine for queries.
    pub stable_display: Arc<Mutex<Option<String>>>,
    pub diagnostics: Arc<PipelineDiagnostics>,
}

/// Run the blocking routing loop until `ctx.running` becomes false or the
/// feed disconnects.
pub fn run(ctx: PipelineContext) {
    info!(generation = ctx.generation, "pipeline started");

    let mut window = StabilityWindow::new(ctx.config.window_capacity);

    loop {
        if !ctx.running.load(Ordering::Relaxed) {
            break;
        }

        let event = match ctx.feed_rx.recv_timeout(FEED_POLL_INTERVAL) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                // Every feed clone is gone — release the session so a later
                // start() is not stuck behind a phantom running flag.
                ctx.running.store(false, Ordering::SeqCst);
                info!(generation = ctx.generation, "event feed disconnected");
                break;
            }
        };

        let seen = ctx.diagnostics.events_in.fetch_add(1, Ordering::Relaxed) + 1;

        if !event.is_valid() || event.confidence < ctx.config.min_confidence {
            ctx.diagnostics
                .events_rejected
                .fetch_add(1, Ordering::Relaxed);
            warn!(
                label = %event.label,
                confidence = event.confidence,
                timestamp = event.timestamp,
                "rejected malformed or sub-threshold event"
            );
            continue;
        }

        // ── Session statistics path ───────────────────────────────────────
        // Independent of the display path below; neither orders the other.
        if ctx.accumulator.record(
            ctx.generation,
            &event.label,
            event.confidence,
            event.timestamp,
        ) {
            ctx.diagnostics.records.fetch_add(1, Ordering::Relaxed);
        } else {
            // Stale generation — the session closed under us.
            ctx.diagnostics
                .records_rejected
                .fetch_add(1, Ordering::Relaxed);
        }

        // ── Live display path ─────────────────────────────────────────────
        if let Some(stable) = window.push(event) {
            let seq = ctx.seq.fetch_add(1, Ordering::Relaxed);
            *ctx.stable_display.lock() = Some(stable.display.clone());
            let _ = ctx.stable_tx.send(StableLabelEvent {
                seq,
                label: stable.label,
                confidence: stable.confidence,
                display: stable.display,
            });
            ctx.diagnostics
                .stable_updates
                .fetch_add(1, Ordering::Relaxed);
        } else {
            ctx.diagnostics
                .stable_suppressed
                .fetch_add(1, Ordering::Relaxed);
        }

        if seen % 50 == 0 {
            debug!(
                events_in = seen,
                window_len = window.len(),
                labels = ctx.accumulator.label_count(),
                "routing checkpoint"
            );
        }
    }

    let snap = ctx.diagnostics.snapshot();
    info!(
        generation = ctx.generation,
        events_in = snap.events_in,
        events_rejected = snap.events_rejected,
        stable_updates = snap.stable_updates,
        stable_suppressed = snap.stable_suppressed,
        records = snap.records,
        records_rejected = snap.records_rejected,
        "pipeline stopped — diagnostics"
    );
}

//! `SentioEngine` — top-level session lifecycle controller.
//!
//! ## Lifecycle
//!
//! ```text
//! SentioEngine::new()
//!     └─► start()        → accumulator cleared, pipeline spawned,
//!         │                status = Listening, returns EventFeed
//!         └─► stop()     → session closed, summary computed and frozen,
//!                          status = Stopped
//! ```
//!
//! `start()`/`stop()` are idempotent: calling them in the wrong state returns
//! an error rather than panicking.
//!
//! ## Session boundary
//!
//! `start()` performs `SessionAccumulator::begin_session()` *synchronously*,
//! before the feed channel even exists, so no event of the new session can
//! race the reset. The generation it returns is captured by the pipeline and
//! tags every `record()`; a late event from a previous session is rejected
//! as stale instead of contaminating the new one.

pub mod pipeline;

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::info;

use crate::{
    error::{Result, SentioError},
    events::{
        ClassificationEvent, EngineStatus, EngineStatusEvent, PredominantSentiment,
        StableLabelEvent,
    },
    session::SessionAccumulator,
    window::DEFAULT_WINDOW_CAPACITY,
};

/// Broadcast channel capacity: 256 events buffered for slow consumers.
const BROADCAST_CAP: usize = 256;

/// Configuration for `SentioEngine`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Stability window capacity. Default: 6.
    pub window_capacity: usize,
    /// Display string reported before the first stable label of a session.
    /// Default: `"listening…"`.
    pub placeholder: String,
    /// Events below this confidence are dropped at the door, like malformed
    /// ones. Default: 0.0 (accept everything the classifier emits).
    pub min_confidence: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            placeholder: "listening…".into(),
            min_confidence: 0.0,
        }
    }
}

/// Producer-side handle through which the external classifier submits events.
///
/// Cheap to clone; each clone feeds the same session. Once the session stops,
/// `send` fails with `SessionClosed` so termination is observable by the
/// producer rather than inferred from silence.
#[derive(Clone)]
pub struct EventFeed {
    tx: crossbeam_channel::Sender<ClassificationEvent>,
    running: Arc<AtomicBool>,
}

impl EventFeed {
    /// Submit one classification event to the session this feed belongs to.
    ///
    /// # Errors
    /// `SentioError::SessionClosed` once `stop()` has been called (or the
    /// pipeline has gone away).
    pub fn send(&self, event: ClassificationEvent) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(SentioError::SessionClosed);
        }
        self.tx
            .send(event)
            .map_err(|_| SentioError::SessionClosed)
    }
}

impl std::fmt::Debug for EventFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventFeed")
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// One open session: its stop flag, the generation its records carry, and
/// its display slot. Each session owns a fresh slot so a pipeline draining
/// leftover events from an earlier session can never overwrite the display
/// of a later one.
struct ActiveSession {
    running: Arc<AtomicBool>,
    generation: u64,
    display: Arc<Mutex<Option<String>>>,
}

/// The top-level engine handle.
///
/// `SentioEngine` is `Send + Sync` — all fields use interior mutability.
/// Wrap in `Arc<SentioEngine>` to share between the producer callback and
/// any number of query/subscription consumers.
pub struct SentioEngine {
    config: EngineConfig,
    /// Current session, if one is open. Each session gets its own stop flag
    /// so a feed or pipeline left over from an earlier session can never be
    /// revived by a later `start()`.
    session: Mutex<Option<ActiveSession>>,
    /// Canonical status (read from queries, written on transitions).
    status: Mutex<EngineStatus>,
    /// Broadcast sender for stable-label change events.
    stable_tx: broadcast::Sender<StableLabelEvent>,
    /// Broadcast sender for status events.
    status_tx: broadcast::Sender<EngineStatusEvent>,
    accumulator: Arc<SessionAccumulator>,
    /// Monotonically increasing stable-label sequence counter.
    seq: Arc<AtomicU64>,
    /// Final summary of the most recently stopped session.
    last_summary: Mutex<Option<PredominantSentiment>>,
    /// Shared pipeline routing counters.
    diagnostics: Arc<pipeline::PipelineDiagnostics>,
}

impl SentioEngine {
    /// Create a new engine. Does not open a session — call `start()`.
    pub fn new(config: EngineConfig) -> Self {
        let (stable_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);

        Self {
            config,
            session: Mutex::new(None),
            status: Mutex::new(EngineStatus::Idle),
            stable_tx,
            status_tx,
            accumulator: Arc::new(SessionAccumulator::new()),
            seq: Arc::new(AtomicU64::new(0)),
            last_summary: Mutex::new(None),
            diagnostics: Arc::new(pipeline::PipelineDiagnostics::default()),
        }
    }

    /// Open a session and spawn the routing pipeline.
    ///
    /// The accumulator reset completes before this method returns the feed,
    /// so the first event of the new session can never observe stale state.
    ///
    /// # Errors
    /// - `SentioError::AlreadyRunning` if a session is already open.
    pub fn start(&self) -> Result<EventFeed> {
        let mut session = self.session.lock();
        if session
            .as_ref()
            .map(|s| s.running.load(Ordering::SeqCst))
            .unwrap_or(false)
        {
            return Err(SentioError::AlreadyRunning);
        }

        self.diagnostics.reset();
        // Ordering barrier: the reset takes effect before the feed exists.
        let generation = self.accumulator.begin_session();

        let running = Arc::new(AtomicBool::new(true));
        let display = Arc::new(Mutex::new(None));
        let (feed_tx, feed_rx) = crossbeam_channel::unbounded();
        *session = Some(ActiveSession {
            running: Arc::clone(&running),
            generation,
            display: Arc::clone(&display),
        });
        drop(session);

        self.set_status(EngineStatus::Listening, None);

        let ctx = pipeline::PipelineContext {
            config: self.config.clone(),
            accumulator: Arc::clone(&self.accumulator),
            generation,
            feed_rx,
            running: Arc::clone(&running),
            stable_tx: self.stable_tx.clone(),
            seq: Arc::clone(&self.seq),
            stable_display: display,
            diagnostics: Arc::clone(&self.diagnostics),
        };
        tokio::task::spawn_blocking(move || pipeline::run(ctx));

        info!(generation, "engine started — listening");
        Ok(EventFeed {
            tx: feed_tx,
            running,
        })
    }

    /// Close the session and return its final summary.
    ///
    /// The pipeline and all feed clones become inert; accumulator statistics
    /// freeze (still readable) until the next `start()`.
    ///
    /// # Errors
    /// - `SentioError::NotRunning` if no session is open.
    pub fn stop(&self) -> Result<Option<PredominantSentiment>> {
        let mut session = self.session.lock();
        let active = match session.take() {
            Some(active) if active.running.load(Ordering::SeqCst) => active,
            other => {
                *session = other;
                return Err(SentioError::NotRunning);
            }
        };

        active.running.store(false, Ordering::SeqCst);
        // Any record still mid-flight serializes against this: it lands
        // either before the close (counted) or after (rejected as stale).
        // The session lock is still held, so a racing start() cannot open a
        // new session between the close and the summary capture — its
        // begin_session() always runs after both.
        self.accumulator.close_session();
        let summary = self.accumulator.predominant();
        *self.last_summary.lock() = summary.clone();
        drop(session);

        self.set_status(EngineStatus::Stopped, None);

        match &summary {
            Some(s) => info!(
                generation = active.generation,
                label = %s.label,
                score = s.score,
                occurrences = s.occurrences,
                "engine stopped — session summary"
            ),
            None => info!(
                generation = active.generation,
                "engine stopped — empty session"
            ),
        }
        Ok(summary)
    }

    /// Whether a session is currently open.
    pub fn is_running(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .map(|s| s.running.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Current engine status (snapshot).
    pub fn status(&self) -> EngineStatus {
        *self.status.lock()
    }

    /// The label with the greatest cumulative confidence this session, if any.
    ///
    /// Live while the session is open; frozen at its final value after `stop()`.
    pub fn predominant(&self) -> Option<PredominantSentiment> {
        self.accumulator.predominant()
    }

    /// Full per-label scoreboard at this instant.
    pub fn snapshot(&self) -> std::collections::HashMap<String, PredominantSentiment> {
        self.accumulator.snapshot()
    }

    /// The current stable display string, or the configured placeholder when
    /// no session is open or no stable label has been emitted yet.
    pub fn stable_display(&self) -> String {
        self.session
            .lock()
            .as_ref()
            .and_then(|s| s.display.lock().clone())
            .unwrap_or_else(|| self.config.placeholder.clone())
    }

    /// Final summary of the most recently stopped session, if any.
    pub fn last_summary(&self) -> Option<PredominantSentiment> {
        self.last_summary.lock().clone()
    }

    /// Subscribe to stable-label change events.
    pub fn subscribe_stable_labels(&self) -> broadcast::Receiver<StableLabelEvent> {
        self.stable_tx.subscribe()
    }

    /// Subscribe to engine status change events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<EngineStatusEvent> {
        self.status_tx.subscribe()
    }

    /// Snapshot of pipeline counters for observability.
    pub fn diagnostics_snapshot(&self) -> pipeline::DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn set_status(&self, new_status: EngineStatus, detail: Option<String>) {
        *self.status.lock() = new_status;
        let _ = self.status_tx.send(EngineStatusEvent {
            status: new_status,
            detail,
        });
    }
}

impl Default for SentioEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

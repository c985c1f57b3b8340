//! Periodic cleanup of expired session records.
//!
//! Stores that keep records in local memory or on disk
//! ([`ExpiringStore`]) treat an expired record as absent, but the record
//! still takes up space until something removes it. This crate runs
//! [`ExpiringStore::purge_expired`] on a fixed interval.
//!
//! There are two layers:
//!
//! - [`SweepScheduler`] only decides *when* a sweep is due. It can sit in
//!   any `tokio::select!` loop.
//! - [`spawn_sweeper`] runs a scheduler in its own task against a store
//!   and hands back a [`SweepHandle`] to pause, resume, or stop it.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use satchel_store::MemoryStore;
//! use satchel_sweep::{SweepConfig, spawn_sweeper};
//!
//! # async fn demo() {
//! let store = Arc::new(MemoryStore::with_ttl(std::time::Duration::from_secs(900)));
//! let sweeper = spawn_sweeper(Arc::clone(&store), SweepConfig::default());
//! // ... serve requests ...
//! let metrics = sweeper.stop().await;
//! println!("purged {} records in {} sweeps", metrics.purged, metrics.runs);
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use satchel_store::{ExpiringStore, StoreError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the sweeper.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Time between sweeps. `Duration::ZERO` disables sweeping entirely.
    pub interval: Duration,
    /// Random delay (0..max) added to the *first* sweep so several
    /// processes sharing one directory don't sweep in lockstep.
    pub initial_jitter: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            initial_jitter: Duration::from_secs(5),
        }
    }
}

impl SweepConfig {
    /// Shortest interval accepted. Anything smaller (but non-zero) is
    /// raised to this.
    pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

    /// A config that sweeps every `interval` with the default jitter.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Sets the maximum initial jitter.
    pub fn with_initial_jitter(mut self, jitter: Duration) -> Self {
        self.initial_jitter = jitter;
        self
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`SweepScheduler::new`]. Rules:
    /// - a non-zero `interval` below [`Self::MIN_INTERVAL`] is raised to it
    /// - `initial_jitter` is capped at `interval`
    pub fn validated(mut self) -> Self {
        if !self.interval.is_zero() && self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_millis() as u64,
                "sweep interval below minimum, raising to 1s"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        if self.initial_jitter > self.interval {
            self.initial_jitter = self.interval;
        }
        self
    }

    /// Returns `true` if this config never sweeps.
    pub fn is_disabled(&self) -> bool {
        self.interval.is_zero()
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Running totals for one sweeper.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepMetrics {
    /// Sweeps attempted, successful or not.
    pub runs: u64,
    /// Records removed across all successful sweeps.
    pub purged: u64,
    /// Sweeps that returned an error.
    pub failures: u64,
    /// Records removed by the most recent successful sweep.
    pub last_purged: usize,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Information about a due sweep, returned by [`SweepScheduler::wait_for_sweep`].
#[derive(Debug, Clone)]
pub struct SweepInfo {
    /// Monotonically increasing sweep number (starts at 1).
    pub sweep: u64,
    /// How late the sweep fired relative to its schedule.
    pub late_by: Duration,
}

/// Decides when the next sweep is due.
///
/// Missed sweeps are never replayed: after a sweep fires, the next one is
/// scheduled a full interval from *now*. A purge removes everything
/// expired at once, so running two back to back buys nothing.
#[derive(Debug)]
pub struct SweepScheduler {
    config: SweepConfig,
    next_sweep: Option<Instant>,
    sweep_count: u64,
    paused: bool,
    metrics: SweepMetrics,
}

impl SweepScheduler {
    /// Create a scheduler from config. The first sweep is due one interval
    /// plus a random jitter from now.
    pub fn new(config: SweepConfig) -> Self {
        let config = config.validated();

        let next_sweep = (!config.is_disabled()).then(|| {
            let jitter_ms = config.initial_jitter.as_millis() as u64;
            let jitter = if jitter_ms > 0 {
                Duration::from_millis(rand::rng().random_range(0..jitter_ms))
            } else {
                Duration::ZERO
            };
            Instant::now() + config.interval + jitter
        });

        if config.is_disabled() {
            debug!("sweep scheduler created with sweeping disabled");
        } else {
            debug!(
                interval_s = config.interval.as_secs(),
                "sweep scheduler created"
            );
        }

        Self {
            config,
            next_sweep,
            sweep_count: 0,
            paused: false,
            metrics: SweepMetrics::default(),
        }
    }

    /// Wait until the next sweep is due.
    ///
    /// When sweeping is disabled or the scheduler is paused this future
    /// pends forever, which is what a `tokio::select!` branch wants.
    pub async fn wait_for_sweep(&mut self) -> SweepInfo {
        let next = match self.next_sweep {
            Some(next) if !self.paused => next,
            _ => std::future::pending().await,
        };

        time::sleep_until(next).await;

        let now = Instant::now();
        self.sweep_count += 1;
        self.next_sweep = Some(now + self.config.interval);

        trace!(sweep = self.sweep_count, "sweep due");

        SweepInfo {
            sweep: self.sweep_count,
            late_by: now.saturating_duration_since(next),
        }
    }

    /// Record the outcome of a sweep in the metrics.
    pub fn record_result(&mut self, result: &Result<usize, StoreError>) {
        self.metrics.runs += 1;
        match result {
            Ok(purged) => {
                self.metrics.purged += *purged as u64;
                self.metrics.last_purged = *purged;
            }
            Err(_) => self.metrics.failures += 1,
        }
    }

    /// Stop sweeping until [`resume`](Self::resume). Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(sweep = self.sweep_count, "sweep scheduler paused");
        }
    }

    /// Resume after a pause. The next sweep is one full interval away.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            if !self.config.is_disabled() {
                self.next_sweep = Some(Instant::now() + self.config.interval);
            }
            debug!(sweep = self.sweep_count, "sweep scheduler resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_disabled(&self) -> bool {
        self.config.is_disabled()
    }

    /// Number of sweeps that have come due so far.
    pub fn sweep_count(&self) -> u64 {
        self.sweep_count
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    /// Snapshot of current metrics.
    pub fn metrics(&self) -> &SweepMetrics {
        &self.metrics
    }
}

// ---------------------------------------------------------------------------
// Background task
// ---------------------------------------------------------------------------

enum Command {
    Pause,
    Resume,
    Metrics(oneshot::Sender<SweepMetrics>),
}

/// Controls a sweeper started by [`spawn_sweeper`].
///
/// Dropping the handle stops the sweeper too: the task notices the
/// command channel closed and exits.
#[derive(Debug)]
pub struct SweepHandle {
    commands: mpsc::UnboundedSender<Command>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<SweepMetrics>,
}

impl SweepHandle {
    /// Stop sweeping until [`resume`](Self::resume) is called.
    pub fn pause(&self) {
        let _ = self.commands.send(Command::Pause);
    }

    /// Resume a paused sweeper.
    pub fn resume(&self) {
        let _ = self.commands.send(Command::Resume);
    }

    /// Current metrics, or `None` if the task is gone.
    pub async fn metrics(&self) -> Option<SweepMetrics> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(Command::Metrics(tx)).ok()?;
        rx.await.ok()
    }

    /// Stop the sweeper and wait for it to finish. Returns the final
    /// metrics. A sweep in progress completes first.
    pub async fn stop(self) -> SweepMetrics {
        let _ = self.shutdown.send(());
        match self.task.await {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!(error = %e, "sweeper task ended abnormally");
                SweepMetrics::default()
            }
        }
    }
}

/// Spawn a task that purges expired records from `store` on the
/// configured interval.
///
/// A failed sweep is logged and counted; the loop keeps going.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_sweeper<S: ExpiringStore>(store: Arc<S>, config: SweepConfig) -> SweepHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
    let mut scheduler = SweepScheduler::new(config);

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Pause) => scheduler.pause(),
                    Some(Command::Resume) => scheduler.resume(),
                    Some(Command::Metrics(reply)) => {
                        let _ = reply.send(scheduler.metrics().clone());
                    }
                    None => break,
                },
                info = scheduler.wait_for_sweep() => {
                    let result = store.purge_expired().await;
                    match &result {
                        Ok(purged) => debug!(sweep = info.sweep, purged, "sweep finished"),
                        Err(e) => warn!(sweep = info.sweep, error = %e, "sweep failed"),
                    }
                    scheduler.record_result(&result);
                }
            }
        }
        debug!(runs = scheduler.metrics().runs, "sweeper stopped");
        scheduler.metrics().clone()
    });

    SweepHandle {
        commands: cmd_tx,
        shutdown: shutdown_tx,
        task,
    }
}

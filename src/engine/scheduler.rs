// =============================================================================
// Scheduler — timer loop, overlap guard and force refresh
// =============================================================================
//
// At most one compute cycle is in flight at any time.  A timer tick that finds
// a cycle running is skipped and journalled; a force refresh that finds one
// running waits for it instead of starting another.  A failed cycle leaves the
// previously published snapshot in place.
//
// Shutdown stops the timer and cancels the in-flight cycle; a cycle cancelled
// this way never publishes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::assembler::SnapshotAssembler;
use super::cache::{SnapshotCache, SnapshotSlot};
use crate::app_state::ErrorLog;
use crate::error::EngineError;
use crate::runtime_config::EngineConfig;

pub struct Scheduler {
    assembler: Arc<SnapshotAssembler>,
    cache: Arc<SnapshotCache>,
    errors: Arc<ErrorLog>,
    interval: Duration,
    force_timeout: Duration,
    in_flight: AtomicBool,
    /// Bumped after every cycle, published or not.
    completions: watch::Sender<u64>,
    shutdown: watch::Sender<bool>,
    current: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(
        config: &EngineConfig,
        assembler: Arc<SnapshotAssembler>,
        cache: Arc<SnapshotCache>,
        errors: Arc<ErrorLog>,
    ) -> Self {
        let (completions, _) = watch::channel(0);
        let (shutdown, _) = watch::channel(false);
        Self {
            assembler,
            cache,
            errors,
            interval: config.refresh_interval(),
            force_timeout: config.force_refresh_timeout(),
            in_flight: AtomicBool::new(false),
            completions,
            shutdown,
            current: Mutex::new(None),
        }
    }

    #[cfg(test)]
    pub fn with_force_timeout(mut self, force_timeout: Duration) -> Self {
        self.force_timeout = force_timeout;
        self
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Number of finished cycles so far.
    #[cfg(test)]
    pub fn completions(&self) -> watch::Receiver<u64> {
        self.completions.subscribe()
    }

    // =========================================================================
    // Timer loop
    // =========================================================================

    /// Drive cycles on the refresh interval until [`Scheduler::shutdown`].
    /// The first tick fires immediately so a snapshot is available soon after
    /// startup.  Returns once the in-flight cycle, if any, has wound down.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut shutdown = self.shutdown.subscribe();

        info!(
            symbol = %self.assembler.symbol(),
            interval_secs = self.interval.as_secs_f64(),
            "scheduler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick();
                }
                _ = shutdown.wait_for(|stop| *stop) => break,
            }
        }

        let handle = self.current.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "in-flight cycle ended abnormally");
            }
        }
        info!("scheduler stopped");
    }

    /// One timer tick.  Returns false when it was skipped.
    pub fn tick(self: &Arc<Self>) -> bool {
        if self.try_start("timer") {
            return true;
        }
        warn!(
            symbol = %self.assembler.symbol(),
            "timer tick skipped: previous cycle still running"
        );
        self.errors.record(&EngineError::CycleSkipped);
        false
    }

    /// Start a cycle unless one is already in flight.  The claim and the
    /// stored handle change under one lock, so `run` never sees a claimed
    /// cycle without its handle.
    pub fn try_start(self: &Arc<Self>, trigger: &'static str) -> bool {
        let mut current = self.current.lock();
        if *self.shutdown.borrow() {
            return false;
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        debug!(trigger, "starting compute cycle");
        self.cache.set_computing(true);
        let this = self.clone();
        *current = Some(tokio::spawn(async move { this.run_cycle().await }));
        true
    }

    async fn run_cycle(self: Arc<Self>) {
        let mut shutdown = self.shutdown.subscribe();
        let outcome = tokio::select! {
            _ = shutdown.wait_for(|stop| *stop) => None,
            res = self.assembler.assemble() => Some(res),
        };

        match outcome {
            Some(Ok(snapshot)) if !*self.shutdown.borrow() => {
                self.cache.publish(snapshot);
            }
            Some(Err(e)) if !*self.shutdown.borrow() => {
                error!(
                    symbol = %self.assembler.symbol(),
                    code = e.code(),
                    error = %e,
                    "cycle failed; previous snapshot retained"
                );
                self.errors.record(&e);
            }
            _ => info!("cycle cancelled by shutdown"),
        }

        self.cache.set_computing(false);
        self.in_flight.store(false, Ordering::SeqCst);
        self.completions.send_modify(|n| *n += 1);
    }

    // =========================================================================
    // Force refresh
    // =========================================================================

    /// Trigger a cycle now, or join the one already running, and wait for it
    /// to finish.  On timeout the previous snapshot is returned.
    pub async fn force_refresh(self: &Arc<Self>) -> SnapshotSlot {
        let mut done = self.completions.subscribe();
        done.borrow_and_update();

        if self.try_start("force") {
            info!(symbol = %self.assembler.symbol(), "force refresh started a cycle");
        } else {
            debug!("force refresh joining in-flight cycle");
        }

        if self.is_in_flight() || done.has_changed().unwrap_or(false) {
            match timeout(self.force_timeout, done.changed()).await {
                Ok(_) => {}
                Err(_) => warn!(
                    timeout_secs = self.force_timeout.as_secs_f64(),
                    "force refresh timed out; serving previous snapshot"
                ),
            }
        }
        if let Some(stale) = self.cache.stale_error() {
            warn!(
                symbol = %self.assembler.symbol(),
                error = %stale,
                "force refresh served a stale snapshot"
            );
            self.errors.record(&stale);
        }
        self.cache.current()
    }

    /// Stop the timer and cancel the in-flight cycle.
    pub fn shutdown(&self) {
        info!("scheduler shutdown requested");
        self.shutdown.send_replace(true);
    }
}

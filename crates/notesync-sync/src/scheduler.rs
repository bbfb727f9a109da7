//! Sync scheduler - decides when a sync cycle runs
//!
//! The [`SyncScheduler`] drives the [`SyncEngine`] from three sources:
//!
//! ```text
//! interval tick ───────────────┐
//! ResumeEvent (broadcast) ─────┼──→ SyncScheduler ──→ SyncEngine::sync()
//! SyncTrigger::request_sync() ─┘
//! ```
//!
//! Cycles never overlap: the loop awaits each cycle before selecting again.
//! Manual requests made while a cycle runs collapse into one follow-up cycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::coordinator::{CoordinatorHandle, ResumeEvent};
use crate::engine::SyncEngine;
use crate::SyncError;

/// Requests an immediate sync cycle
#[derive(Clone)]
pub struct SyncTrigger {
    tx: mpsc::Sender<()>,
}

impl SyncTrigger {
    /// Asks the scheduler to run a cycle as soon as it is free
    ///
    /// Returns false if the scheduler has stopped. A request made while
    /// another is still queued is merged into it.
    pub fn request_sync(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(())) => true,
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }
}

/// Runs sync cycles periodically, on resume and on request
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    resume_rx: broadcast::Receiver<ResumeEvent>,
    request_rx: mpsc::Receiver<()>,
    poll_interval: Duration,
    shutdown: CancellationToken,
}

impl SyncScheduler {
    /// Creates a new `SyncScheduler`
    ///
    /// # Arguments
    /// * `engine` - The engine cycles are run on
    /// * `coordinator` - Source of resume events
    /// * `poll_interval` - Time between periodic cycles
    /// * `shutdown` - Stops the loop when cancelled
    ///
    /// # Returns
    /// The scheduler and a [`SyncTrigger`] for manual requests
    pub fn new(
        engine: Arc<SyncEngine>,
        coordinator: &CoordinatorHandle,
        poll_interval: Duration,
        shutdown: CancellationToken,
    ) -> (Self, SyncTrigger) {
        let (tx, request_rx) = mpsc::channel(1);
        info!(
            poll_secs = poll_interval.as_secs(),
            "Creating sync scheduler"
        );

        let scheduler = Self {
            engine,
            resume_rx: coordinator.subscribe_resume(),
            request_rx,
            poll_interval,
            shutdown,
        };
        (scheduler, SyncTrigger { tx })
    }

    /// Main loop; returns the number of cycles attempted
    ///
    /// The first periodic cycle runs immediately. The loop ends when the
    /// shutdown token is cancelled.
    pub async fn run(mut self) -> u64 {
        info!("Sync scheduler starting");

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut resume_open = true;
        let mut requests_open = true;
        let mut cycles = 0u64;

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested, scheduler stopping");
                    break;
                }

                _ = ticker.tick() => {
                    debug!("Periodic sync");
                }

                event = self.resume_rx.recv(), if resume_open => {
                    match event {
                        Ok(event) => {
                            info!(pending = event.pending_count, "Resuming sync after reconnect");
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!(skipped, "Resume events lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            resume_open = false;
                            continue;
                        }
                    }
                }

                request = self.request_rx.recv(), if requests_open => {
                    if request.is_none() {
                        requests_open = false;
                        continue;
                    }
                    info!("Sync requested");
                }
            }

            cycles += 1;
            self.run_cycle().await;
        }

        info!(cycles, "Sync scheduler stopped");
        cycles
    }

    async fn run_cycle(&self) {
        match self.engine.sync().await {
            Ok(report) => {
                debug!(?report, "Scheduled sync finished");
            }
            Err(SyncError::Offline) => {
                debug!("Skipping scheduled sync while offline");
            }
            Err(e) => {
                warn!(error = %e, "Scheduled sync failed");
            }
        }
    }
}

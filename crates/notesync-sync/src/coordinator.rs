//! Sync coordinator - the single owner of sync state
//!
//! The [`SyncCoordinator`] is an actor: every mutation of the sync state and
//! the pending-sync counter arrives as a command on one `mpsc` queue and is
//! applied by one task, in order. Callers on other tasks (the reachability
//! probe, the engine, the change tracker) hold a cloneable
//! [`CoordinatorHandle`] and never touch the state directly.
//!
//! ## Flow
//!
//! ```text
//! probe / engine / tracker ──→ CoordinatorHandle ──→ mpsc ──→ SyncCoordinator
//!                                                               │
//!                                   watch<SyncStatus> ←─────────┤
//!                                   broadcast<ResumeEvent> ←────┘
//! ```
//!
//! Every handle call resolves once its command has been applied, so a
//! `status()` read after an awaited call observes the new state.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use notesync_core::ports::ISyncStatusStore;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::SyncError;

/// Progress shown while syncing never reaches 1.0 before `end_sync`
const MAX_IN_FLIGHT_PROGRESS: f64 = 0.99;

const COMMAND_QUEUE_SIZE: usize = 64;
const RESUME_CHANNEL_SIZE: usize = 16;

// ============================================================================
// SyncState
// ============================================================================

/// User-visible sync state
#[derive(Debug, Clone, PartialEq)]
pub enum SyncState {
    Idle,
    /// A cycle is running; `progress` is in `0.0..=0.99`
    Syncing { progress: f64 },
    Synced { at: DateTime<Utc> },
    Error { message: String },
    Offline,
    /// Connectivity came back with work outstanding; a sync is about to start
    WaitingForNetwork,
}

/// Presentation hint for the sync state; no behavior depends on it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Neutral,
    Active,
    Success,
    Warning,
    Error,
}

impl SyncState {
    /// Short human-readable status line
    pub fn status_text(&self) -> String {
        match self {
            SyncState::Idle => "Not synced yet".to_string(),
            SyncState::Syncing { progress } => {
                format!("Syncing… {}%", (progress * 100.0).round() as u32)
            }
            SyncState::Synced { at } => format!("Synced at {}", at.format("%Y-%m-%d %H:%M")),
            SyncState::Error { message } => format!("Sync error: {message}"),
            SyncState::Offline => "Offline".to_string(),
            SyncState::WaitingForNetwork => "Waiting to resume sync".to_string(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            SyncState::Idle => Severity::Neutral,
            SyncState::Syncing { .. } | SyncState::WaitingForNetwork => Severity::Active,
            SyncState::Synced { .. } => Severity::Success,
            SyncState::Offline => Severity::Warning,
            SyncState::Error { .. } => Severity::Error,
        }
    }

    /// Freedesktop symbolic icon name for the state
    pub fn icon_name(&self) -> &'static str {
        match self {
            SyncState::Idle => "emblem-default-symbolic",
            SyncState::Syncing { .. } => "emblem-synchronizing-symbolic",
            SyncState::Synced { .. } => "emblem-ok-symbolic",
            SyncState::Error { .. } => "dialog-error-symbolic",
            SyncState::Offline => "network-offline-symbolic",
            SyncState::WaitingForNetwork => "network-transmit-receive-symbolic",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Idle => write!(f, "idle"),
            SyncState::Syncing { progress } => write!(f, "syncing({progress:.2})"),
            SyncState::Synced { at } => write!(f, "synced({})", at.to_rfc3339()),
            SyncState::Error { message } => write!(f, "error: {message}"),
            SyncState::Offline => write!(f, "offline"),
            SyncState::WaitingForNetwork => write!(f, "waiting_for_network"),
        }
    }
}

/// Snapshot published after every applied command
#[derive(Debug, Clone, PartialEq)]
pub struct SyncStatus {
    pub state: SyncState,
    pub pending_count: u64,
    pub network_available: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Broadcast when connectivity returns with pending work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeEvent {
    pub pending_count: u64,
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Debug)]
enum Command {
    NetworkChanged(bool),
    EntityDirtied,
    EntitiesCleaned(u64),
    ReconcilePending(u64),
    BeginSync(u64),
    UpdateProgress(u64),
    EndSync,
    SyncFailed(String),
    ResetToIdle,
}

struct Envelope {
    command: Command,
    applied: oneshot::Sender<()>,
}

// ============================================================================
// SyncCoordinator
// ============================================================================

/// Actor owning the sync state machine
pub struct SyncCoordinator {
    commands: mpsc::Receiver<Envelope>,
    status_tx: watch::Sender<SyncStatus>,
    resume_tx: broadcast::Sender<ResumeEvent>,
    status_store: Arc<dyn ISyncStatusStore>,
    state: SyncState,
    pending_count: u64,
    network_available: bool,
    last_synced_at: Option<DateTime<Utc>>,
    total_operations: u64,
}

impl SyncCoordinator {
    /// Creates the actor and its handle without starting it
    ///
    /// The network is assumed reachable until told otherwise.
    ///
    /// # Arguments
    /// * `status_store` - Durable store for the last successful sync
    /// * `last_synced_at` - Previously persisted last successful sync, if any
    pub fn new(
        status_store: Arc<dyn ISyncStatusStore>,
        last_synced_at: Option<DateTime<Utc>>,
    ) -> (Self, CoordinatorHandle) {
        let (command_tx, commands) = mpsc::channel(COMMAND_QUEUE_SIZE);
        let initial = SyncStatus {
            state: SyncState::Idle,
            pending_count: 0,
            network_available: true,
            last_synced_at,
        };
        let (status_tx, status_rx) = watch::channel(initial);
        let (resume_tx, _) = broadcast::channel(RESUME_CHANNEL_SIZE);

        let handle = CoordinatorHandle {
            commands: command_tx,
            status: status_rx,
            resume: resume_tx.clone(),
        };
        let coordinator = Self {
            commands,
            status_tx,
            resume_tx,
            status_store,
            state: SyncState::Idle,
            pending_count: 0,
            network_available: true,
            last_synced_at,
            total_operations: 0,
        };
        (coordinator, handle)
    }

    /// Loads the persisted last sync, then spawns the actor task
    ///
    /// The task ends once every handle has been dropped.
    pub async fn spawn(
        status_store: Arc<dyn ISyncStatusStore>,
    ) -> anyhow::Result<(CoordinatorHandle, JoinHandle<()>)> {
        let last_synced_at = status_store.last_successful_sync().await?;
        let (coordinator, handle) = Self::new(status_store, last_synced_at);
        let task = tokio::spawn(coordinator.run());
        Ok((handle, task))
    }

    /// Processes commands until every handle is dropped
    pub async fn run(mut self) {
        debug!("Sync coordinator started");
        while let Some(Envelope { command, applied }) = self.commands.recv().await {
            self.apply(command).await;
            self.publish();
            // The caller may have given up waiting; the command still applied.
            let _ = applied.send(());
        }
        debug!("Sync coordinator stopped");
    }

    async fn apply(&mut self, command: Command) {
        match command {
            Command::NetworkChanged(available) => self.on_network_changed(available),
            Command::EntityDirtied => {
                self.pending_count += 1;
            }
            Command::EntitiesCleaned(n) => {
                self.pending_count = self.pending_count.saturating_sub(n);
            }
            Command::ReconcilePending(n) => {
                self.pending_count = n;
            }
            Command::BeginSync(total) => {
                self.total_operations = total;
                self.transition(SyncState::Syncing { progress: 0.0 });
            }
            Command::UpdateProgress(completed) => {
                // Offline (or any other state) overrides in-flight progress.
                if matches!(self.state, SyncState::Syncing { .. }) {
                    let progress = if self.total_operations == 0 {
                        0.0
                    } else {
                        (completed as f64 / self.total_operations as f64)
                            .min(MAX_IN_FLIGHT_PROGRESS)
                    };
                    self.state = SyncState::Syncing { progress };
                }
            }
            Command::EndSync => {
                let now = Utc::now();
                self.last_synced_at = Some(now);
                self.pending_count = 0;
                self.transition(SyncState::Synced { at: now });
                if let Err(e) = self.status_store.set_last_successful_sync(now).await {
                    warn!(error = %e, "Failed to persist last successful sync");
                }
            }
            Command::SyncFailed(message) => {
                self.transition(SyncState::Error { message });
            }
            Command::ResetToIdle => {
                let next = if self.network_available {
                    SyncState::Idle
                } else {
                    SyncState::Offline
                };
                self.transition(next);
            }
        }
    }

    fn on_network_changed(&mut self, available: bool) {
        if !available {
            if self.network_available {
                info!("Network connectivity lost");
            }
            self.network_available = false;
            self.transition(SyncState::Offline);
            return;
        }

        if self.network_available {
            return;
        }
        self.network_available = true;
        if self.pending_count > 0 {
            info!(pending = self.pending_count, "Network restored with pending work");
            self.transition(SyncState::WaitingForNetwork);
            // No subscribers is fine; the next periodic cycle picks the work up.
            let _ = self.resume_tx.send(ResumeEvent {
                pending_count: self.pending_count,
            });
        } else {
            info!("Network restored");
            self.transition(SyncState::Idle);
        }
    }

    fn transition(&mut self, next: SyncState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "Sync state transition");
        }
        self.state = next;
    }

    fn publish(&self) {
        self.status_tx.send_replace(SyncStatus {
            state: self.state.clone(),
            pending_count: self.pending_count,
            network_available: self.network_available,
            last_synced_at: self.last_synced_at,
        });
    }
}

// ============================================================================
// CoordinatorHandle
// ============================================================================

/// Cloneable front end to the coordinator actor
#[derive(Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::Sender<Envelope>,
    status: watch::Receiver<SyncStatus>,
    resume: broadcast::Sender<ResumeEvent>,
}

impl CoordinatorHandle {
    async fn dispatch(&self, command: Command) -> Result<(), SyncError> {
        let (applied, done) = oneshot::channel();
        self.commands
            .send(Envelope { command, applied })
            .await
            .map_err(|_| SyncError::CoordinatorStopped)?;
        done.await.map_err(|_| SyncError::CoordinatorStopped)
    }

    /// Reports a reachability edge
    pub async fn network_changed(&self, available: bool) -> Result<(), SyncError> {
        self.dispatch(Command::NetworkChanged(available)).await
    }

    /// An entity's `needs_sync` flag flipped to true
    pub async fn entity_dirtied(&self) -> Result<(), SyncError> {
        self.dispatch(Command::EntityDirtied).await
    }

    /// `n` entities stopped needing sync outside a completed cycle
    pub async fn entities_cleaned(&self, n: u64) -> Result<(), SyncError> {
        self.dispatch(Command::EntitiesCleaned(n)).await
    }

    /// Replaces the pending counter with a count taken from the local store
    pub async fn reconcile_pending(&self, n: u64) -> Result<(), SyncError> {
        self.dispatch(Command::ReconcilePending(n)).await
    }

    pub async fn begin_sync(&self, total_operations: u64) -> Result<(), SyncError> {
        self.dispatch(Command::BeginSync(total_operations)).await
    }

    pub async fn update_progress(&self, completed: u64) -> Result<(), SyncError> {
        self.dispatch(Command::UpdateProgress(completed)).await
    }

    /// Marks the cycle successful, persists the time and clears the counter
    pub async fn end_sync(&self) -> Result<(), SyncError> {
        self.dispatch(Command::EndSync).await
    }

    /// Marks the cycle failed; the pending counter is kept
    pub async fn sync_failed(&self, message: impl Into<String>) -> Result<(), SyncError> {
        self.dispatch(Command::SyncFailed(message.into())).await
    }

    pub async fn reset_to_idle(&self) -> Result<(), SyncError> {
        self.dispatch(Command::ResetToIdle).await
    }

    /// Latest published status
    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    /// Receiver notified on every status change
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.clone()
    }

    /// Receiver for resume-after-reconnect events
    pub fn subscribe_resume(&self) -> broadcast::Receiver<ResumeEvent> {
        self.resume.subscribe()
    }
}

// ============================================================================
// Unit tests
// ============================================================================

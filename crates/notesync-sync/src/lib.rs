//! Notesync Sync - Coordinator and push/pull orchestration
//!
//! Provides:
//! - The process-wide sync state machine, confined to one actor task
//! - Local change tracking feeding the pending-sync counter
//! - Push/pull cycles with non-atomic batches and conflict handling
//! - Periodic, on-resume and manual scheduling of sync cycles
//!
//! ## Modules
//!
//! - [`coordinator`] - `SyncCoordinator` actor and its `CoordinatorHandle`
//! - [`tracker`] - `ChangeTracker`, the local mutation entry point
//! - [`engine`] - `SyncEngine`, one push/pull cycle
//! - [`scheduler`] - `SyncScheduler`, decides when cycles run
//! - [`reachability`] - TCP reachability probe and edge reporting

pub mod coordinator;
pub mod engine;
pub mod reachability;
pub mod scheduler;
pub mod tracker;

pub use coordinator::{
    CoordinatorHandle, ResumeEvent, Severity, SyncCoordinator, SyncState, SyncStatus,
};
pub use engine::{SyncEngine, SyncReport};
pub use reachability::{ReachabilityMonitor, TcpReachabilityProbe};
pub use scheduler::{SyncScheduler, SyncTrigger};
pub use tracker::ChangeTracker;

use notesync_core::ports::RemoteError;
use thiserror::Error;

/// Errors that can occur during synchronization
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote store rejected or could not serve the cycle
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// The local store failed
    #[error("Local store error: {0:#}")]
    Local(#[from] anyhow::Error),

    /// A domain rule was violated
    #[error("Domain error: {0}")]
    Domain(#[from] notesync_core::domain::DomainError),

    /// The network is known to be down; no cycle was attempted
    #[error("Network is offline")]
    Offline,

    /// The coordinator task has stopped
    #[error("Sync coordinator is not running")]
    CoordinatorStopped,
}

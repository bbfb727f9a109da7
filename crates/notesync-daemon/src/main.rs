//! Notesync Daemon - Background synchronization service
//!
//! This binary keeps the local note store in sync with the remote record
//! store:
//! - Periodic, reconnect-driven and requested sync cycles
//! - Network reachability probing
//! - Status transition logging
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! `main` is the composition root: every service is built here and passed
//! down explicitly. The long-running tasks share one `CancellationToken`
//! that is cancelled on receipt of SIGTERM or SIGINT.

use std::mem;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use notesync_cache::{DatabasePool, SqliteLocalStore};
use notesync_codec::{DeflateAssetCompressor, RecordCodec};
use notesync_core::config::Config;
use notesync_core::ports::ILocalStore;
use notesync_remote::{HttpRemoteStore, RecordStoreClient};
use notesync_sync::{
    CoordinatorHandle, ReachabilityMonitor, SyncCoordinator, SyncEngine, SyncScheduler,
    TcpReachabilityProbe,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "notesyncd", version, about = "Notesync background sync daemon")]
struct Cli {
    /// Use alternate config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run a single sync cycle and exit
    #[arg(long)]
    once: bool,
}

// ============================================================================
// Configuration and logging
// ============================================================================

/// Loads the configuration and rejects invalid values
///
/// An explicit path must exist; the default path falls back to defaults.
fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_or_default(&Config::default_path()),
    };

    let errors = config.validate();
    if !errors.is_empty() {
        let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
        anyhow::bail!("Invalid configuration: {}", details.join("; "));
    }
    Ok(config)
}

/// `RUST_LOG` wins over the configured level
fn env_filter(configured_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_tracing(config: &Config) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(&config.logging.level))
        .with_target(true);

    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

// ============================================================================
// DaemonService
// ============================================================================

/// Wired services of a running daemon
struct DaemonService {
    config: Config,
    local: Arc<SqliteLocalStore>,
    coordinator: CoordinatorHandle,
    engine: Arc<SyncEngine>,
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Opens the store and builds every service
    ///
    /// Seeds the coordinator's pending count from the store so the status
    /// is right before the first cycle.
    async fn new(config: Config, shutdown: CancellationToken) -> Result<Self> {
        let db_path = &config.storage.database_path;
        let db_pool = DatabasePool::new(db_path)
            .await
            .context("Failed to open database")?;
        info!(db_path = %db_path.display(), "Opened local store");
        let local = Arc::new(SqliteLocalStore::new(db_pool.pool().clone()));

        let client = RecordStoreClient::new(&config.remote)?;
        info!(base_url = %client.base_url(), "Using remote record store");
        let remote = Arc::new(HttpRemoteStore::new(client));

        let codec = RecordCodec::new(Arc::new(DeflateAssetCompressor::from_config(
            &config.assets,
        )));

        let (coordinator, _coordinator_task) = SyncCoordinator::spawn(local.clone())
            .await
            .context("Failed to start sync coordinator")?;
        let pending = local
            .count_dirty()
            .await
            .context("Failed to count pending changes")?;
        coordinator.reconcile_pending(pending).await?;
        info!(pending, "Sync coordinator started");

        let engine = Arc::new(
            SyncEngine::new(remote, local.clone(), codec, coordinator.clone(), &config)
                .with_cancellation(shutdown.child_token()),
        );

        Ok(Self {
            config,
            local,
            coordinator,
            engine,
            shutdown,
        })
    }

    /// Runs one cycle and returns
    async fn run_once(&self) -> Result<()> {
        let report = self.engine.sync().await.context("Sync cycle failed")?;
        info!(
            pushed = report.pushed,
            pulled = report.pulled,
            deleted = report.deleted,
            failed = report.failed,
            conflicts = report.conflicts,
            duration_ms = report.duration_ms,
            "Sync cycle completed"
        );
        let open = self.local.unresolved_conflicts().await?.len();
        if open > 0 {
            warn!(open, "Conflicts waiting for resolution");
        }
        Ok(())
    }

    /// Runs the scheduler until shutdown
    ///
    /// 1. Starts the reachability monitor
    /// 2. Starts the status logger
    /// 3. Runs the scheduler on this task
    async fn run(&self) -> Result<()> {
        let probe = Arc::new(TcpReachabilityProbe::from_config(&self.config.network));
        let monitor = ReachabilityMonitor::new(
            probe,
            self.coordinator.clone(),
            Duration::from_secs(self.config.network.probe_interval_secs),
        )
        .spawn(self.shutdown.clone());

        let logger = spawn_status_logger(self.coordinator.clone(), self.shutdown.clone());

        let (scheduler, _trigger) = SyncScheduler::new(
            Arc::clone(&self.engine),
            &self.coordinator,
            Duration::from_secs(self.config.sync.poll_interval),
            self.shutdown.clone(),
        );
        let cycles = scheduler.run().await;
        info!(cycles, "Sync loop terminated");

        for (name, task) in [("reachability monitor", monitor), ("status logger", logger)] {
            if let Err(e) = task.await {
                warn!(task = name, error = %e, "Background task ended abnormally");
            }
        }
        Ok(())
    }
}

// ============================================================================
// Status logging
// ============================================================================

/// Logs every state change published by the coordinator
///
/// Progress updates within `Syncing` are logged at debug level only.
fn spawn_status_logger(
    coordinator: CoordinatorHandle,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let mut rx = coordinator.subscribe();
    tokio::spawn(async move {
        let mut last = rx.borrow_and_update().state.clone();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let status = rx.borrow_and_update().clone();
                    if mem::discriminant(&status.state) == mem::discriminant(&last) {
                        debug!(state = %status.state, pending = status.pending_count, "Sync status");
                    } else {
                        info!(
                            state = %status.state,
                            pending = status.pending_count,
                            network = status.network_available,
                            icon = status.state.icon_name(),
                            "{}",
                            status.state.status_text()
                        );
                    }
                    last = status.state;
                }
            }
        }
    })
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    init_tracing(&config);

    info!(once = cli.once, "Notesync daemon starting (notesyncd)");

    let shutdown_token = CancellationToken::new();
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token).await?;
    let result = if cli.once {
        service.run_once().await
    } else {
        service.run().await
    };

    match &result {
        Ok(()) => info!("Notesync daemon shut down gracefully"),
        Err(e) => error!(error = %e, "Notesync daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================

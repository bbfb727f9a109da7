//! Network reachability
//!
//! [`TcpReachabilityProbe`] answers "is the network usable" by opening a TCP
//! connection to a configured host. [`ReachabilityMonitor`] polls a probe on
//! its own task and hands every change to the coordinator; it never touches
//! sync state itself.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use notesync_core::config::NetworkConfig;
use notesync_core::ports::INetworkReachability;

use crate::coordinator::CoordinatorHandle;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// TcpReachabilityProbe
// ============================================================================

/// Reachability by TCP connect to `host:port`
#[derive(Debug, Clone)]
pub struct TcpReachabilityProbe {
    host: String,
    port: u16,
    connect_timeout: Duration,
}

impl TcpReachabilityProbe {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    pub fn from_config(config: &NetworkConfig) -> Self {
        Self::new(config.probe_host.clone(), config.probe_port)
    }

    pub fn with_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

#[async_trait::async_trait]
impl INetworkReachability for TcpReachabilityProbe {
    async fn is_reachable(&self) -> bool {
        let target = (self.host.as_str(), self.port);
        match timeout(self.connect_timeout, TcpStream::connect(target)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                trace!(host = %self.host, port = self.port, error = %e, "Probe failed");
                false
            }
            Err(_) => {
                trace!(host = %self.host, port = self.port, "Probe timed out");
                false
            }
        }
    }
}

// ============================================================================
// ReachabilityMonitor
// ============================================================================

/// Polls a reachability source and reports edges to the coordinator
///
/// A probe result is reported only when it differs from what the
/// coordinator currently believes, which also covers the engine marking the
/// network offline after a failed call.
pub struct ReachabilityMonitor {
    probe: Arc<dyn INetworkReachability>,
    coordinator: CoordinatorHandle,
    interval: Duration,
}

impl ReachabilityMonitor {
    pub fn new(
        probe: Arc<dyn INetworkReachability>,
        coordinator: CoordinatorHandle,
        interval: Duration,
    ) -> Self {
        Self {
            probe,
            coordinator,
            interval,
        }
    }

    /// Runs the monitor on its own task until `shutdown` is cancelled
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, shutdown: CancellationToken) {
        debug!(interval_secs = self.interval.as_secs(), "Reachability monitor started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if !self.check().await {
                        break;
                    }
                }
            }
        }
        debug!("Reachability monitor stopped");
    }

    /// Probes once; returns false if the coordinator is gone
    async fn check(&self) -> bool {
        let reachable = self.probe.is_reachable().await;
        if reachable == self.coordinator.status().network_available {
            return true;
        }

        if reachable {
            info!("Network became reachable");
        } else {
            info!("Network became unreachable");
        }
        match self.coordinator.network_changed(reachable).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Cannot report reachability change");
                false
            }
        }
    }
}

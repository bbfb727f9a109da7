//! Network reachability port (driven/secondary port)
//!
//! A satisfied/unsatisfied connectivity signal. Implementations only answer
//! "is the network reachable right now"; edge detection and the hand-off into
//! the coordinator live in the sync crate.

/// Port trait for network reachability checks
#[async_trait::async_trait]
pub trait INetworkReachability: Send + Sync {
    /// Returns true if the remote store's network is reachable
    async fn is_reachable(&self) -> bool;
}

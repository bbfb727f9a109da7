//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the sync engine depends on; their
//! implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteStore`] - Account-scoped remote record database
//! - [`ILocalStore`] - On-device entity store
//! - [`ISyncStatusStore`] - Durable "last successful sync" state
//! - [`IAssetCompressor`] - Compression of binary payloads before upload
//! - [`INetworkReachability`] - Connectivity signal

pub mod asset_compressor;
pub mod local_store;
pub mod network;
pub mod remote_store;

pub use asset_compressor::{CompressedAsset, CompressionError, IAssetCompressor};
pub use local_store::{ILocalStore, ISyncStatusStore};
pub use network::INetworkReachability;
pub use remote_store::{
    AccountStatus, BatchDeleteOutcome, BatchSaveOutcome, IRemoteStore, ItemFailure, RecordPager,
    RemoteError, RemoteErrorKind,
};

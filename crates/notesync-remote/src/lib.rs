//! Notesync Remote - record store HTTP adapter
//!
//! Provides the [`IRemoteStore`](notesync_core::ports::IRemoteStore)
//! implementation used by the sync engine:
//! - Account availability checks, cached and deduplicated
//! - Record save/fetch/delete and paged queries
//! - Non-atomic batch modify with per-item outcomes
//! - Asset upload and download alongside their records
//!
//! ## Modules
//!
//! - [`client`] - Typed HTTP client (auth header, endpoints, error mapping)
//! - [`errors`] - HTTP and server error code translation
//! - [`store`] - [`HttpRemoteStore`], the port implementation

pub mod client;
pub mod errors;
pub mod store;

pub use client::RecordStoreClient;
pub use store::HttpRemoteStore;

//! Notesync Codec - Entity <-> wire record conversion
//!
//! [`RecordCodec`] converts a synchronizable entity into a remote
//! [`WireRecord`](notesync_core::record::WireRecord) and back. Image payloads
//! go through an [`IAssetCompressor`](notesync_core::ports::IAssetCompressor);
//! [`DeflateAssetCompressor`] is the flate2-backed implementation.

pub mod codec;
pub mod compressor;

pub use codec::{fields, RecordCodec};
pub use compressor::DeflateAssetCompressor;

use notesync_core::domain::RecordId;
use notesync_core::ports::CompressionError;
use thiserror::Error;

/// Errors raised while encoding an entity
#[derive(Debug, Error)]
pub enum CodecError {
    /// An image payload could not be compressed; no record is produced
    #[error("Failed to compress {field} of {record_id}: {source}")]
    Compression {
        record_id: RecordId,
        field: &'static str,
        #[source]
        source: CompressionError,
    },
}

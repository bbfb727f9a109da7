//! Asset compression port
//!
//! Binary payloads are compressed before upload. The policy is keyed on the
//! image origin: generated imagery gets a more aggressive setting than user
//! photos.

use thiserror::Error;

use crate::domain::ImageKind;

/// A compressed payload ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedAsset {
    pub bytes: Vec<u8>,
    pub content_type: String,
    /// Encoding to pass back to [`IAssetCompressor::decompress`]
    pub content_encoding: String,
}

#[derive(Debug, Error)]
pub enum CompressionError {
    /// Output exceeds the configured per-asset limit
    #[error("Compressed asset is {size_kb} KiB, limit is {limit_kb} KiB")]
    TooLarge { size_kb: u64, limit_kb: u64 },

    #[error("Unsupported content encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Compression I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Port trait for the compression step used by the codec
pub trait IAssetCompressor: Send + Sync {
    fn compress(&self, bytes: &[u8], kind: ImageKind) -> Result<CompressedAsset, CompressionError>;

    fn decompress(&self, bytes: &[u8], content_encoding: &str) -> Result<Vec<u8>, CompressionError>;
}

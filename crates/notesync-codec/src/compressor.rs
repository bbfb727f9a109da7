//! Deflate-based asset compressor
//!
//! Generated images are compressed at a higher level than user photos to
//! bound quota usage. Output larger than the configured limit is rejected.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use notesync_core::config::AssetsConfig;
use notesync_core::domain::ImageKind;
use notesync_core::ports::{CompressedAsset, CompressionError, IAssetCompressor};

/// `Content-Encoding` value of zlib-wrapped deflate data
pub const ENCODING_DEFLATE: &str = "deflate";
/// `Content-Encoding` value of uncompressed data
pub const ENCODING_IDENTITY: &str = "identity";

/// [`IAssetCompressor`] backed by flate2
#[derive(Debug, Clone)]
pub struct DeflateAssetCompressor {
    photo_level: u32,
    generated_level: u32,
    max_bytes: u64,
}

impl DeflateAssetCompressor {
    /// # Arguments
    /// * `photo_level` - Deflate level (1-9) for photos
    /// * `generated_level` - Deflate level (1-9) for generated images
    /// * `max_asset_kb` - Upper bound of a compressed asset
    pub fn new(photo_level: u32, generated_level: u32, max_asset_kb: u64) -> Self {
        Self {
            photo_level: photo_level.clamp(1, 9),
            generated_level: generated_level.clamp(1, 9),
            max_bytes: max_asset_kb.saturating_mul(1024),
        }
    }

    pub fn from_config(config: &AssetsConfig) -> Self {
        Self::new(
            config.photo_quality,
            config.generated_quality,
            config.max_asset_kb,
        )
    }

    /// Compression level used for `kind`
    pub fn level_for(&self, kind: ImageKind) -> u32 {
        match kind {
            ImageKind::Photo => self.photo_level,
            ImageKind::Generated => self.generated_level,
        }
    }
}

impl Default for DeflateAssetCompressor {
    fn default() -> Self {
        Self::from_config(&AssetsConfig::default())
    }
}

impl IAssetCompressor for DeflateAssetCompressor {
    fn compress(&self, bytes: &[u8], kind: ImageKind) -> Result<CompressedAsset, CompressionError> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(self.level_for(kind)));
        encoder.write_all(bytes)?;
        let compressed = encoder.finish()?;

        let size = compressed.len() as u64;
        if size > self.max_bytes {
            return Err(CompressionError::TooLarge {
                size_kb: size.div_ceil(1024),
                limit_kb: self.max_bytes / 1024,
            });
        }

        Ok(CompressedAsset {
            bytes: compressed,
            content_type: sniff_content_type(bytes).to_string(),
            content_encoding: ENCODING_DEFLATE.to_string(),
        })
    }

    fn decompress(&self, bytes: &[u8], content_encoding: &str) -> Result<Vec<u8>, CompressionError> {
        match content_encoding {
            ENCODING_DEFLATE => {
                let mut out = Vec::with_capacity(bytes.len() * 2);
                ZlibDecoder::new(bytes).read_to_end(&mut out)?;
                Ok(out)
            }
            ENCODING_IDENTITY => Ok(bytes.to_vec()),
            other => Err(CompressionError::UnsupportedEncoding(other.to_string())),
        }
    }
}

/// Guesses the image MIME type from magic bytes
fn sniff_content_type(bytes: &[u8]) -> &'static str {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        _ => "application/octet-stream",
    }
}

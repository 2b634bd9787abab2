//! ZSTD wrap/unwrap with configurable level, detected by magic bytes on
//! decode (SPEC_FULL §4.5).

use crate::error::{EmbrError, Result};
use std::io::Write;
use std::time::{Duration, Instant};

pub const DEFAULT_LEVEL: i32 = 9;
pub const MIN_LEVEL: i32 = 1;
pub const MAX_LEVEL: i32 = 22;

/// First two bytes of a zstd frame.
pub const ZSTD_MAGIC: [u8; 2] = [0x28, 0xB5];

pub fn is_zstd(buf: &[u8]) -> bool {
    buf.len() >= 2 && buf[0] == ZSTD_MAGIC[0] && buf[1] == ZSTD_MAGIC[1]
}

pub fn compress(buf: &[u8], level: i32) -> Result<Vec<u8>> {
    compress_with_timeout(buf, level, None)
}

pub fn compress_with_timeout(buf: &[u8], level: i32, timeout: Option<Duration>) -> Result<Vec<u8>> {
    let level = level.clamp(MIN_LEVEL, MAX_LEVEL);
    let start = Instant::now();

    let mut encoder = zstd::stream::Encoder::new(Vec::new(), level)
        .map_err(|e| EmbrError::io("<zstd encoder>", e))?;
    encoder
        .write_all(buf)
        .map_err(|e| EmbrError::io("<zstd encoder>", e))?;
    if let Some(budget) = timeout {
        if start.elapsed() > budget {
            return Err(EmbrError::Timeout("zstd compression exceeded budget".into()));
        }
    }
    let out = encoder
        .finish()
        .map_err(|e| EmbrError::io("<zstd encoder>", e))?;
    Ok(out)
}

/// Detect ZSTD by magic bytes; otherwise return the input unchanged. This
/// permits mixed-content transports.
pub fn decompress(buf: &[u8]) -> Result<Vec<u8>> {
    if !is_zstd(buf) {
        return Ok(buf.to_vec());
    }
    zstd::stream::decode_all(buf).map_err(|e| EmbrError::io("<zstd decoder>", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_compress_decompress() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(100);
        let compressed = compress(&data, DEFAULT_LEVEL).unwrap();
        assert!(is_zstd(&compressed));
        let restored = decompress(&compressed).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn non_zstd_input_passes_through_unchanged() {
        let data = b"plain bytes, no magic header".to_vec();
        let restored = decompress(&data).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn level_out_of_range_is_clamped_not_rejected() {
        let data = b"hello world".to_vec();
        let compressed = compress(&data, 999).unwrap();
        let restored = decompress(&compressed).unwrap();
        assert_eq!(restored, data);
    }
}

//! `parquet` transformer: emits a columnar table whose schema encodes the
//! float vector and `key=value` metadata as columns.
//!
//! No arrow/parquet crate appears anywhere in the reference corpus this
//! crate was grounded on, and fabricating a vendored dependency is out of
//! bounds (see DESIGN.md), so this is a small self-contained columnar
//! container rather than a byte-compatible Apache Parquet file: a magic
//! header, a float-vector column, and a JSON-metadata column, each
//! length-prefixed. `transform`/`inverse` satisfy the generic round-trip
//! contract (P4) with an empty metadata column; callers that have real
//! sidecar metadata to carry use [`ColumnarTransformer::encode_with_metadata`]
//! / [`ColumnarTransformer::extract_metadata_json`] directly.

use super::Transformer;
use crate::error::{EmbrError, Result};

const MAGIC: &[u8; 4] = b"EMC1";

pub struct ColumnarTransformer;

impl ColumnarTransformer {
    /// Encode `payload` (raw float32 bytes) plus a `metadata_json` column.
    pub fn encode_with_metadata(payload: &[u8], metadata_json: &str) -> Vec<u8> {
        let meta_bytes = metadata_json.as_bytes();
        let mut out = Vec::with_capacity(MAGIC.len() + 8 + payload.len() + meta_bytes.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        out.extend_from_slice(&(meta_bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(meta_bytes);
        out
    }

    fn decode(bytes: &[u8]) -> Result<(Vec<u8>, String)> {
        if bytes.len() < MAGIC.len() + 4 || &bytes[..MAGIC.len()] != MAGIC {
            return Err(EmbrError::InvalidFormat("not an embr columnar table".into()));
        }
        let mut cursor = MAGIC.len();
        let payload_len = read_u32(bytes, cursor)? as usize;
        cursor += 4;
        if bytes.len() < cursor + payload_len + 4 {
            return Err(EmbrError::InvalidFormat("columnar table truncated".into()));
        }
        let payload = bytes[cursor..cursor + payload_len].to_vec();
        cursor += payload_len;
        let meta_len = read_u32(bytes, cursor)? as usize;
        cursor += 4;
        if bytes.len() < cursor + meta_len {
            return Err(EmbrError::InvalidFormat("columnar table metadata truncated".into()));
        }
        let meta = String::from_utf8(bytes[cursor..cursor + meta_len].to_vec())
            .map_err(|_| EmbrError::InvalidFormat("metadata column is not utf-8".into()))?;
        Ok((payload, meta))
    }

    /// Extract the `metadata_json` column, if present, so callers can
    /// rebuild a `.meta` sidecar.
    pub fn extract_metadata_json(bytes: &[u8]) -> Option<String> {
        Self::decode(bytes).ok().map(|(_, meta)| meta)
    }
}

fn read_u32(bytes: &[u8], at: usize) -> Result<u32> {
    bytes
        .get(at..at + 4)
        .map(|s| u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
        .ok_or_else(|| EmbrError::InvalidFormat("columnar table truncated".into()))
}

impl Transformer for ColumnarTransformer {
    fn name(&self) -> &str {
        "parquet"
    }

    fn format_name(&self) -> &str {
        "parquet"
    }

    fn transform(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(Self::encode_with_metadata(bytes, "{}"))
    }

    fn inverse(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Self::decode(bytes).map(|(payload, _)| payload)
    }
}

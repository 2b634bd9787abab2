//! `json` transformer: wraps binary as a JSON object with a base64-encoded
//! `data` field for non-JSON input; JSON input passes through unchanged.

use super::Transformer;
use crate::error::{EmbrError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;

pub struct JsonTransformer;

impl Transformer for JsonTransformer {
    fn name(&self) -> &str {
        "json"
    }

    fn format_name(&self) -> &str {
        "json"
    }

    fn transform(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        if serde_json::from_slice::<Value>(bytes).is_ok() {
            return Ok(bytes.to_vec());
        }
        let wrapped = serde_json::json!({ "data": BASE64.encode(bytes) });
        serde_json::to_vec(&wrapped)
            .map_err(|e| EmbrError::Protocol(format!("failed to encode json wrapper: {e}")))
    }

    fn inverse(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let value: Value = match serde_json::from_slice(bytes) {
            Ok(v) => v,
            Err(_) => return Ok(bytes.to_vec()),
        };
        match value.get("data").and_then(|d| d.as_str()) {
            Some(encoded) => BASE64
                .decode(encoded)
                .map_err(|e| EmbrError::Protocol(format!("invalid base64 in data field: {e}"))),
            None => Ok(bytes.to_vec()),
        }
    }
}

//! Minimal 1-D float32 `.npy` reader/writer.
//!
//! Only the slice of the format this crate actually needs is implemented: a
//! strict small grammar over the header dict, rejecting anything that is not
//! `dtype='<f4'`/`ndim=1`. No general npy parser is pulled in (design note:
//! "npy handling").

use crate::error::{EmbrError, Result};

const MAGIC: &[u8] = b"\x93NUMPY";

/// Parse a `.npy` file's bytes and return the 1-D float32 payload (the raw
/// float bytes, header stripped — this is what gets hashed and stored).
pub fn strip_npy_header(bytes: &[u8]) -> Result<Vec<u8>> {
    if bytes.len() < MAGIC.len() + 2 {
        return Err(EmbrError::InvalidFormat("truncated npy magic".into()));
    }
    if &bytes[..MAGIC.len()] != MAGIC {
        return Err(EmbrError::InvalidFormat("bad npy magic".into()));
    }
    let major = bytes[MAGIC.len()];
    let header_len_bytes_width: usize = if major >= 2 { 4 } else { 2 };
    let header_len_offset = MAGIC.len() + 2;
    if bytes.len() < header_len_offset + header_len_bytes_width {
        return Err(EmbrError::InvalidFormat("truncated npy header length".into()));
    }
    let header_len: usize = if header_len_bytes_width == 2 {
        u16::from_le_bytes([bytes[header_len_offset], bytes[header_len_offset + 1]]) as usize
    } else {
        u32::from_le_bytes([
            bytes[header_len_offset],
            bytes[header_len_offset + 1],
            bytes[header_len_offset + 2],
            bytes[header_len_offset + 3],
        ]) as usize
    };
    let header_start = header_len_offset + header_len_bytes_width;
    let header_end = header_start
        .checked_add(header_len)
        .ok_or_else(|| EmbrError::InvalidFormat("npy header length overflow".into()))?;
    if bytes.len() < header_end {
        return Err(EmbrError::InvalidFormat("npy header extends past file".into()));
    }
    let header_text = std::str::from_utf8(&bytes[header_start..header_end])
        .map_err(|_| EmbrError::InvalidFormat("npy header is not valid utf-8".into()))?;

    let descr = extract_str_field(header_text, "descr")
        .ok_or_else(|| EmbrError::InvalidFormat("npy header missing descr".into()))?;
    if descr != "<f4" {
        return Err(EmbrError::InvalidFormat(format!(
            "unsupported npy dtype {descr}, only <f4 (float32) is supported"
        )));
    }

    let shape = extract_shape_field(header_text)
        .ok_or_else(|| EmbrError::InvalidFormat("npy header missing shape".into()))?;
    if shape.len() != 1 {
        return Err(EmbrError::InvalidFormat(format!(
            "unsupported npy ndim {}, only 1-D arrays are supported",
            shape.len()
        )));
    }

    let payload = &bytes[header_end..];
    let expected_bytes = shape[0] * 4;
    if payload.len() != expected_bytes {
        return Err(EmbrError::InvalidFormat(format!(
            "npy payload length {} does not match shape[0]={} (expected {} bytes)",
            payload.len(),
            shape[0],
            expected_bytes
        )));
    }

    Ok(payload.to_vec())
}

/// Regenerate a deterministic `.npy` header for `n_elements` float32 values
/// and prepend it to `float_bytes`, producing a full `.npy` file.
pub fn wrap_npy_header(float_bytes: &[u8], n_elements: usize) -> Vec<u8> {
    let dict = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({n_elements},), }}"
    );
    // Header must be padded so that magic(6) + version(2) + len(2) + dict
    // is a multiple of 64, terminated by a single newline.
    let prefix_len = MAGIC.len() + 2 + 2;
    let mut dict = dict;
    dict.push('\n');
    let total_before_pad = prefix_len + dict.len();
    let pad = (64 - (total_before_pad % 64)) % 64;
    // Insert padding spaces before the trailing newline.
    dict.pop();
    for _ in 0..pad {
        dict.push(' ');
    }
    dict.push('\n');

    let mut out = Vec::with_capacity(prefix_len + dict.len() + float_bytes.len());
    out.extend_from_slice(MAGIC);
    out.push(1); // major version
    out.push(0); // minor version
    out.extend_from_slice(&(dict.len() as u16).to_le_bytes());
    out.extend_from_slice(dict.as_bytes());
    out.extend_from_slice(float_bytes);
    out
}

fn extract_str_field<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("'{key}':");
    let idx = header.find(&needle)? + needle.len();
    let rest = header[idx..].trim_start();
    let rest = rest.strip_prefix('\'')?;
    let end = rest.find('\'')?;
    Some(&rest[..end])
}

fn extract_shape_field(header: &str) -> Option<Vec<usize>> {
    let needle = "'shape':";
    let idx = header.find(needle)? + needle.len();
    let rest = header[idx..].trim_start();
    let rest = rest.strip_prefix('(')?;
    let end = rest.find(')')?;
    let inner = &rest[..end];
    let mut dims = Vec::new();
    for part in inner.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        dims.push(part.parse::<usize>().ok()?);
    }
    Some(dims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_wrap_and_strip() {
        let floats: [f32; 4] = [1.0, 2.0, 3.0, 4.0];
        let mut raw = Vec::new();
        for f in floats {
            raw.extend_from_slice(&f.to_le_bytes());
        }
        let npy = wrap_npy_header(&raw, 4);
        let stripped = strip_npy_header(&npy).unwrap();
        assert_eq!(stripped, raw);
    }

    #[test]
    fn rejects_non_float32_dtype() {
        let header = "{'descr': '<i4', 'fortran_order': False, 'shape': (4,), }\n";
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.push(1);
        bytes.push(0);
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(&[0u8; 16]);
        assert!(strip_npy_header(&bytes).is_err());
    }

    #[test]
    fn rejects_non_1d_shape() {
        let header = "{'descr': '<f4', 'fortran_order': False, 'shape': (2, 2), }\n";
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.push(1);
        bytes.push(0);
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(&[0u8; 16]);
        assert!(strip_npy_header(&bytes).is_err());
    }
}

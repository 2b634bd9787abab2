//! Content-addressed storage of raw vector payloads plus `key=value` metadata
//! sidecars under `<root>/.embr/objects/<hash>.{raw,meta}` (SPEC_FULL §4.1).

use crate::error::{EmbrError, Result};
use crate::hash::{hash_hex, is_valid_full_hash, MIN_PREFIX_LEN};
use crate::layout::Layout;
use crate::meta::{now_iso8601, FileType, ObjectMeta};
use std::path::Path;

pub const MAX_SOURCE_BYTES: u64 = 10 * 1024 * 1024;

pub struct PutOutcome {
    pub hash: String,
    pub meta: ObjectMeta,
}

/// Load a caller-supplied embedding file (`.npy` or `.bin`) into its raw
/// float32 payload, validating format per SPEC_FULL §4.1.
pub fn load_embedding_payload(
    embedding_path: &Path,
    dims_hint: Option<usize>,
) -> Result<(Vec<u8>, FileType)> {
    let bytes = std::fs::read(embedding_path).map_err(|e| EmbrError::io(embedding_path, e))?;

    let is_npy = embedding_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("npy"))
        .unwrap_or(false);

    if is_npy {
        let payload = crate::npy::strip_npy_header(&bytes)?;
        if let Some(dims) = dims_hint {
            if payload.len() != dims * 4 {
                return Err(EmbrError::DimensionMismatch(format!(
                    "npy payload has {} elements, caller requested {dims}",
                    payload.len() / 4
                )));
            }
        }
        Ok((payload, FileType::Npy))
    } else {
        if bytes.len() % 4 != 0 {
            return Err(EmbrError::InvalidFormat(format!(
                ".bin payload size {} is not a multiple of 4",
                bytes.len()
            )));
        }
        if let Some(dims) = dims_hint {
            if bytes.len() != dims * 4 {
                return Err(EmbrError::DimensionMismatch(format!(
                    ".bin payload has {} elements, caller requested {dims}",
                    bytes.len() / 4
                )));
            }
        }
        Ok((bytes, FileType::Bin))
    }
}

/// Validate the source file referenced by a `store` call: must exist, be a
/// regular non-empty file, and be no larger than `MAX_SOURCE_BYTES`.
pub fn validate_source(source: &Path) -> Result<()> {
    let metadata = std::fs::metadata(source).map_err(|e| EmbrError::io(source, e))?;
    if !metadata.is_file() {
        return Err(EmbrError::InvalidInput(format!(
            "source {} is not a regular file",
            source.display()
        )));
    }
    if metadata.len() == 0 {
        return Err(EmbrError::InvalidInput(format!(
            "source {} is empty",
            source.display()
        )));
    }
    if metadata.len() > MAX_SOURCE_BYTES {
        return Err(EmbrError::InvalidInput(format!(
            "source {} is {} bytes, exceeds the {} byte limit",
            source.display(),
            metadata.len(),
            MAX_SOURCE_BYTES
        )));
    }
    Ok(())
}

/// Write `payload`'s object files (`.raw`/`.meta`) under `layout`, returning
/// the content hash and the meta record just written. Idempotent: writing
/// the same bytes twice leaves `.raw` untouched and only refreshes the
/// timestamp in `.meta`.
pub fn put_object(layout: &Layout, payload: &[u8], source_rel: &str, model: &str) -> Result<PutOutcome> {
    layout.ensure_skeleton().map_err(EmbrError::from)?;
    let hash = hash_hex(payload);
    let raw_path = layout.object_raw(&hash);
    if !raw_path.exists() {
        crate::layout::atomic_write(&raw_path, payload).map_err(|e| EmbrError::io(&raw_path, e))?;
    }

    let meta = ObjectMeta {
        source: source_rel.to_string(),
        file_type: FileType::Bin,
        model: model.to_string(),
        timestamp: now_iso8601(),
    };
    ObjectMeta::write(&layout.object_meta(&hash), &meta)?;

    tracing::debug!(hash = %hash, source = %source_rel, model = %model, "stored object");
    Ok(PutOutcome { hash, meta })
}

/// Store with an explicit file_type (used when the source was an `.npy`).
pub fn put_object_typed(
    layout: &Layout,
    payload: &[u8],
    source_rel: &str,
    model: &str,
    file_type: FileType,
) -> Result<PutOutcome> {
    layout.ensure_skeleton().map_err(EmbrError::from)?;
    let hash = hash_hex(payload);
    let raw_path = layout.object_raw(&hash);
    if !raw_path.exists() {
        crate::layout::atomic_write(&raw_path, payload).map_err(|e| EmbrError::io(&raw_path, e))?;
    }

    let meta = ObjectMeta {
        source: source_rel.to_string(),
        file_type,
        model: model.to_string(),
        timestamp: now_iso8601(),
    };
    ObjectMeta::write(&layout.object_meta(&hash), &meta)?;

    tracing::debug!(hash = %hash, source = %source_rel, model = %model, "stored object");
    Ok(PutOutcome { hash, meta })
}

pub fn get_object(layout: &Layout, hash: &str) -> Result<(Vec<u8>, ObjectMeta)> {
    let raw_path = layout.object_raw(hash);
    let meta_path = layout.object_meta(hash);
    if !raw_path.exists() || !meta_path.exists() {
        return Err(EmbrError::NotFound(format!("object {hash}")));
    }
    let payload = std::fs::read(&raw_path).map_err(|e| EmbrError::io(&raw_path, e))?;
    let meta = ObjectMeta::read(&meta_path)?;
    Ok((payload, meta))
}

pub fn object_exists(layout: &Layout, hash: &str) -> bool {
    layout.object_raw(hash).exists()
}

/// Resolve a (possibly partial) hex prefix to the unique full hash present
/// in the object store.
pub fn resolve_prefix(layout: &Layout, prefix: &str) -> Result<String> {
    if prefix.len() < MIN_PREFIX_LEN {
        return Err(EmbrError::InvalidInput(format!(
            "hash prefix must be at least {MIN_PREFIX_LEN} characters"
        )));
    }
    if is_valid_full_hash(prefix) && object_exists(layout, prefix) {
        return Ok(prefix.to_string());
    }

    let dir = layout.objects_dir();
    let entries = match std::fs::read_dir(&dir) {
        Ok(e) => e,
        Err(_) => return Err(EmbrError::NotFound(format!("no object matches prefix {prefix}"))),
    };

    let mut matches = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("raw") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if stem.starts_with(prefix) {
            matches.push(stem.to_string());
        }
    }

    match matches.len() {
        0 => Err(EmbrError::NotFound(format!("no object matches prefix {prefix}"))),
        1 => Ok(matches.remove(0)),
        n => Err(EmbrError::Ambiguous {
            prefix: prefix.to_string(),
            count: n,
        }),
    }
}

/// Delete an object's `.raw`/`.meta` pair. `ENOENT` on unlink is swallowed
/// per the error-handling policy (SPEC_FULL §7); any other I/O error is
/// fatal.
pub fn delete_object(layout: &Layout, hash: &str) -> Result<u64> {
    let raw_path = layout.object_raw(hash);
    let meta_path = layout.object_meta(hash);
    let mut freed = 0u64;
    for path in [&raw_path, &meta_path] {
        match std::fs::metadata(path) {
            Ok(m) => freed += m.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(EmbrError::io(path, e)),
        }
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(EmbrError::io(path, e));
            }
        }
    }
    Ok(freed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn floats_le(vals: &[f32]) -> Vec<u8> {
        let mut out = Vec::new();
        for v in vals {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());
        let payload = floats_le(&[1.0, 2.0, 3.0, 4.0]);
        let outcome = put_object(&layout, &payload, "a.txt", "m1").unwrap();
        let (got, meta) = get_object(&layout, &outcome.hash).unwrap();
        assert_eq!(got, payload);
        assert_eq!(meta.source, "a.txt");
        assert_eq!(meta.model, "m1");
    }

    #[test]
    fn duplicate_put_is_idempotent_but_refreshes_meta() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());
        let payload = floats_le(&[1.0, 2.0, 3.0, 4.0]);
        let first = put_object(&layout, &payload, "a.txt", "m1").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = put_object(&layout, &payload, "a.txt", "m1").unwrap();
        assert_eq!(first.hash, second.hash);
        let (raw, _) = get_object(&layout, &first.hash).unwrap();
        assert_eq!(raw, payload);
    }

    #[test]
    fn resolve_prefix_finds_unique_match() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());
        let payload = floats_le(&[1.0, 2.0, 3.0, 4.0]);
        let outcome = put_object(&layout, &payload, "a.txt", "m1").unwrap();
        let resolved = resolve_prefix(&layout, &outcome.hash[..8]).unwrap();
        assert_eq!(resolved, outcome.hash);
    }

    #[test]
    fn resolve_prefix_rejects_too_short() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());
        let err = resolve_prefix(&layout, "abc").unwrap_err();
        assert!(matches!(err, EmbrError::InvalidInput(_)));
    }

    #[test]
    fn bin_size_not_multiple_of_4_is_invalid_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("v.bin");
        std::fs::write(&path, [0u8; 5]).unwrap();
        let err = load_embedding_payload(&path, None).unwrap_err();
        assert!(matches!(err, EmbrError::InvalidFormat(_)));
    }

    #[test]
    fn empty_source_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, []).unwrap();
        let err = validate_source(&path).unwrap_err();
        assert!(matches!(err, EmbrError::InvalidInput(_)));
    }
}

//! Per-set working-tree index, append-only log, and per-model ref files
//! (SPEC_FULL §4.2).

use crate::error::{EmbrError, Result};
use crate::layout::{atomic_write, Layout};
use crate::meta::ObjectMeta;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: u64,
    pub hash: String,
    pub path: String,
    /// `"unknown"` for legacy 3-field lines (read-compatible, never written).
    pub model: String,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn parse_log_line(line: &str) -> Option<LogEntry> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        [ts, hash, path] => Some(LogEntry {
            timestamp: ts.parse().ok()?,
            hash: hash.to_string(),
            path: path.to_string(),
            model: "unknown".to_string(),
        }),
        [ts, hash, path, model] => Some(LogEntry {
            timestamp: ts.parse().ok()?,
            hash: hash.to_string(),
            path: path.to_string(),
            model: model.to_string(),
        }),
        _ => None,
    }
}

pub fn read_log(layout: &Layout, set: &str) -> Result<Vec<LogEntry>> {
    let path = layout.set_log(set);
    let text = match std::fs::read_to_string(&path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(EmbrError::io(&path, e)),
    };
    Ok(text.lines().filter_map(parse_log_line).collect())
}

/// Append a log line. Never reorders or rewrites existing lines (P3).
pub fn append_log(layout: &Layout, set: &str, hash: &str, path: &str, model: &str) -> Result<()> {
    layout.ensure_set_dirs(set).map_err(EmbrError::from)?;
    let log_path = layout.set_log(set);
    let line = format!("{} {} {} {}\n", unix_now(), hash, path, model);
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| EmbrError::io(&log_path, e))?;
    file.write_all(line.as_bytes())
        .map_err(|e| EmbrError::io(&log_path, e))?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub hash: String,
    pub path: String,
}

fn parse_index_line(line: &str) -> Option<IndexEntry> {
    let (hash, path) = line.split_once(' ')?;
    Some(IndexEntry {
        hash: hash.to_string(),
        path: path.to_string(),
    })
}

pub fn read_index(layout: &Layout, set: &str) -> Result<Vec<IndexEntry>> {
    let path = layout.set_index(set);
    let text = match std::fs::read_to_string(&path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(EmbrError::io(&path, e)),
    };
    Ok(text.lines().filter_map(parse_index_line).collect())
}

fn model_of_hash(layout: &Layout, hash: &str) -> Result<String> {
    let meta_path = layout.object_meta(hash);
    ObjectMeta::read(&meta_path).map(|m| m.model)
}

/// Rewrite the set index, keeping every line whose path differs, or whose
/// path matches but whose stored model differs from `model`; then append the
/// new `(hash, path)` line.
pub fn set_index(layout: &Layout, set: &str, hash: &str, path: &str, model: &str) -> Result<()> {
    layout.ensure_set_dirs(set).map_err(EmbrError::from)?;
    let existing = read_index(layout, set)?;

    let mut kept: Vec<IndexEntry> = Vec::with_capacity(existing.len());
    for entry in existing {
        if entry.path != path {
            kept.push(entry);
            continue;
        }
        let stored_model = model_of_hash(layout, &entry.hash).unwrap_or_else(|_| "unknown".to_string());
        if stored_model != model {
            kept.push(entry);
        }
        // else: same (path, model) pair — dropped, replaced below.
    }
    kept.push(IndexEntry {
        hash: hash.to_string(),
        path: path.to_string(),
    });

    write_index(layout, set, &kept)
}

fn write_index(layout: &Layout, set: &str, entries: &[IndexEntry]) -> Result<()> {
    let mut text = String::new();
    for e in entries {
        text.push_str(&format!("{} {}\n", e.hash, e.path));
    }
    let index_path = layout.set_index(set);
    atomic_write(&index_path, text.as_bytes()).map_err(|e| EmbrError::io(&index_path, e))
}

/// Remove every index line for `path` (used by `rm --all`-style callers).
pub fn remove_index_entries_for_path(layout: &Layout, set: &str, path: &str) -> Result<usize> {
    let existing = read_index(layout, set)?;
    let before = existing.len();
    let kept: Vec<IndexEntry> = existing.into_iter().filter(|e| e.path != path).collect();
    let removed = before - kept.len();
    write_index(layout, set, &kept)?;
    Ok(removed)
}

/// Remove index lines whose hash matches `filter`.
pub fn remove_index_entries_by_hash(layout: &Layout, set: &str, hash: &str) -> Result<usize> {
    let existing = read_index(layout, set)?;
    let before = existing.len();
    let kept: Vec<IndexEntry> = existing.into_iter().filter(|e| e.hash != hash).collect();
    let removed = before - kept.len();
    write_index(layout, set, &kept)?;
    Ok(removed)
}

#[derive(Debug, Clone)]
pub struct ModelRefEntry {
    pub hash: String,
    pub path: String,
}

pub fn read_model_ref(layout: &Layout, set: &str, model: &str) -> Result<Vec<ModelRefEntry>> {
    let path = layout.model_ref(set, model);
    let text = match std::fs::read_to_string(&path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(EmbrError::io(&path, e)),
    };
    Ok(text
        .lines()
        .filter_map(|l| l.split_once(' '))
        .map(|(hash, path)| ModelRefEntry {
            hash: hash.to_string(),
            path: path.to_string(),
        })
        .collect())
}

/// Drop any line whose path matches, append the new `(hash, path)` line,
/// rename-replace (I6: at most one line per source path).
pub fn update_model_ref(layout: &Layout, set: &str, model: &str, hash: &str, path: &str) -> Result<()> {
    layout.ensure_set_dirs(set).map_err(EmbrError::from)?;
    let mut entries = read_model_ref(layout, set, model)?;
    entries.retain(|e| e.path != path);
    entries.push(ModelRefEntry {
        hash: hash.to_string(),
        path: path.to_string(),
    });

    let mut text = String::new();
    for e in &entries {
        text.push_str(&format!("{} {}\n", e.hash, e.path));
    }
    let ref_path = layout.model_ref(set, model);
    atomic_write(&ref_path, text.as_bytes()).map_err(|e| EmbrError::io(&ref_path, e))
}

/// `[(hash, model, timestamp)]` for every log entry touching `path`, oldest
/// first (log order).
pub fn list_for_source(layout: &Layout, set: &str, path: &str) -> Result<Vec<(String, String, u64)>> {
    let entries = read_log(layout, set)?;
    Ok(entries
        .into_iter()
        .filter(|e| e.path == path)
        .map(|e| (e.hash, e.model, e.timestamp))
        .collect())
}

/// Distinct models that have logged an embedding for `path`, in first-seen
/// order.
pub fn models_for_source(layout: &Layout, set: &str, path: &str) -> Result<Vec<String>> {
    let entries = list_for_source(layout, set, path)?;
    let mut seen = Vec::new();
    for (_, model, _) in entries {
        if !seen.contains(&model) {
            seen.push(model);
        }
    }
    Ok(seen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::put_object;
    use tempfile::tempdir;

    fn floats_le(vals: &[f32]) -> Vec<u8> {
        let mut out = Vec::new();
        for v in vals {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    #[test]
    fn two_models_coexist_in_index_and_log() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());

        let p1 = put_object(&layout, &floats_le(&[1.0, 2.0, 3.0, 4.0]), "a.txt", "M1").unwrap();
        append_log(&layout, "main", &p1.hash, "a.txt", "M1").unwrap();
        set_index(&layout, "main", &p1.hash, "a.txt", "M1").unwrap();

        let p2 = put_object(&layout, &floats_le(&[5.0, 6.0, 7.0, 8.0]), "a.txt", "M2").unwrap();
        append_log(&layout, "main", &p2.hash, "a.txt", "M2").unwrap();
        set_index(&layout, "main", &p2.hash, "a.txt", "M2").unwrap();

        let index = read_index(&layout, "main").unwrap();
        assert_eq!(index.len(), 2);
        let log = read_log(&layout, "main").unwrap();
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn legacy_three_field_log_lines_read_as_unknown_model() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());
        layout.ensure_set_dirs("main").unwrap();
        std::fs::write(layout.set_log("main"), "1700000000 deadbeef a.txt\n").unwrap();
        let log = read_log(&layout, "main").unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].model, "unknown");
    }

    #[test]
    fn set_index_replaces_prior_line_for_same_source_and_model() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());
        let p1 = put_object(&layout, &floats_le(&[1.0, 2.0, 3.0, 4.0]), "a.txt", "M1").unwrap();
        set_index(&layout, "main", &p1.hash, "a.txt", "M1").unwrap();
        let p2 = put_object(&layout, &floats_le(&[9.0, 9.0, 9.0, 9.0]), "a.txt", "M1").unwrap();
        set_index(&layout, "main", &p2.hash, "a.txt", "M1").unwrap();

        let index = read_index(&layout, "main").unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].hash, p2.hash);
    }
}

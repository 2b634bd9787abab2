//! Garbage collector: reclaims objects unreachable from every set's index
//! and every `HEAD` line (SPEC_FULL §4.8, P7).

use crate::error::{EmbrError, Result};
use crate::layout::{atomic_write, Layout};
use crate::{head, set};
use std::collections::HashSet;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Default)]
pub struct GcOutcome {
    pub files_deleted: u64,
    pub bytes_freed: u64,
    pub dry_run: bool,
}

/// Parses `"never"`, `"now"`, or `"<N>.<unit>.ago"` with
/// `unit ∈ {minutes,hours,days,weeks}` into an expiry instant (unix
/// seconds), or `None` for `"never"` (nothing is ever a candidate).
pub fn parse_expire(expire: &str, now: u64) -> Result<Option<u64>> {
    match expire {
        "never" => Ok(None),
        "now" => Ok(Some(now)),
        other => {
            let mut parts = other.splitn(3, '.');
            let (n, unit, ago) = (
                parts.next().unwrap_or_default(),
                parts.next().unwrap_or_default(),
                parts.next().unwrap_or_default(),
            );
            if ago != "ago" {
                return Err(EmbrError::InvalidInput(format!(
                    "unrecognized prune_expire literal {expire:?}"
                )));
            }
            let n: u64 = n
                .parse()
                .map_err(|_| EmbrError::InvalidInput(format!("unrecognized prune_expire literal {expire:?}")))?;
            let unit_secs = match unit {
                "minutes" => 60,
                "hours" => 3600,
                "days" => 86_400,
                "weeks" => 604_800,
                _ => {
                    return Err(EmbrError::InvalidInput(format!(
                        "unrecognized prune_expire unit {unit:?}"
                    )))
                }
            };
            Ok(Some(now.saturating_sub(n * unit_secs)))
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn mtime_secs(path: &std::path::Path) -> Result<u64> {
    let meta = std::fs::metadata(path).map_err(|e| EmbrError::io(path, e))?;
    let modified = meta.modified().map_err(|e| EmbrError::io(path, e))?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs())
}

fn list_sets(layout: &Layout) -> Result<Vec<String>> {
    let dir = layout.sets_dir();
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(&dir).map_err(|e| EmbrError::io(&dir, e))? {
        let entry = entry.map_err(EmbrError::from)?;
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    Ok(names)
}

fn live_hashes(layout: &Layout) -> Result<HashSet<String>> {
    let mut live = HashSet::new();
    for set_name in list_sets(layout)? {
        for entry in set::read_index(layout, &set_name)? {
            live.insert(entry.hash);
        }
    }
    for hash in head::read_head(layout)?.values() {
        live.insert(hash.clone());
    }
    Ok(live)
}

/// Fails if the remote transaction lock is held by a live process, or if
/// another GC run's lock is present.
fn check_exclusion(layout: &Layout) -> Result<()> {
    if let Ok(contents) = std::fs::read_to_string(layout.remote_lock()) {
        if let Ok(pid) = contents.trim().parse::<u32>() {
            if pid_alive(pid) {
                return Err(EmbrError::LockFailed(
                    "remote transaction lock is held".to_string(),
                ));
            }
        }
    }
    if layout.gc_lock().exists() {
        return Err(EmbrError::LockFailed("gc is already running".to_string()));
    }
    Ok(())
}

#[cfg(unix)]
fn pid_alive(pid: u32) -> bool {
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
fn pid_alive(_pid: u32) -> bool {
    false
}

fn object_size(layout: &Layout, hash: &str) -> u64 {
    let raw_len = std::fs::metadata(layout.object_raw(hash)).map(|m| m.len()).unwrap_or(0);
    let meta_len = std::fs::metadata(layout.object_meta(hash)).map(|m| m.len()).unwrap_or(0);
    raw_len + meta_len
}

fn rewrite_logs_aggressively(layout: &Layout, live: &HashSet<String>) -> Result<()> {
    for set_name in list_sets(layout)? {
        let entries = set::read_log(layout, &set_name)?;
        let mut text = String::new();
        for e in &entries {
            if live.contains(&e.hash) {
                text.push_str(&format!("{} {} {} {}\n", e.timestamp, e.hash, e.path, e.model));
            }
        }
        let log_path = layout.set_log(&set_name);
        atomic_write(&log_path, text.as_bytes()).map_err(|e| EmbrError::io(&log_path, e))?;
    }
    Ok(())
}

/// Run garbage collection. `aggressive` additionally rewrites each set's
/// log, dropping lines whose hash is no longer live; it never drops a line
/// whose hash is still referenced by an index (those hashes are in `live`
/// by construction, so they always survive the filter).
pub fn gc(layout: &Layout, expire: &str, aggressive: bool, dry_run: bool) -> Result<GcOutcome> {
    check_exclusion(layout)?;

    let gc_lock_path = layout.gc_lock();
    atomic_write(&gc_lock_path, std::process::id().to_string().as_bytes())
        .map_err(|e| EmbrError::io(&gc_lock_path, e))?;
    let result = gc_inner(layout, expire, aggressive, dry_run);
    let _ = std::fs::remove_file(&gc_lock_path);
    result
}

fn gc_inner(layout: &Layout, expire: &str, aggressive: bool, dry_run: bool) -> Result<GcOutcome> {
    let now = unix_now();
    let expire_time = parse_expire(expire, now)?;
    let live = live_hashes(layout)?;

    let objects_dir = layout.objects_dir();
    if !objects_dir.exists() {
        return Ok(GcOutcome { dry_run, ..Default::default() });
    }

    let mut outcome = GcOutcome { dry_run, ..Default::default() };
    let Some(expire_time) = expire_time else {
        return Ok(outcome); // "never": nothing is ever a candidate.
    };

    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(&objects_dir).map_err(|e| EmbrError::io(&objects_dir, e))? {
        let entry = entry.map_err(EmbrError::from)?;
        let path = entry.path();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if path.extension().and_then(|e| e.to_str()) != Some("raw") {
            continue;
        }
        if live.contains(stem) {
            continue;
        }
        if mtime_secs(&path)? <= expire_time {
            candidates.push(stem.to_string());
        }
    }

    for hash in &candidates {
        outcome.bytes_freed += object_size(layout, hash);
        outcome.files_deleted += 1;
        if !dry_run {
            crate::object_store::delete_object(layout, hash)?;
        }
    }

    if aggressive && !dry_run {
        rewrite_logs_aggressively(layout, &live)?;
    }

    tracing::info!(files = outcome.files_deleted, bytes = outcome.bytes_freed, dry_run, "gc complete");
    Ok(outcome)
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
    fn parse_expire_literals() {
        let now = 1_000_000;
        assert_eq!(parse_expire("never", now).unwrap(), None);
        assert_eq!(parse_expire("now", now).unwrap(), Some(now));
        assert_eq!(parse_expire("1.hours.ago", now).unwrap(), Some(now - 3600));
        assert!(parse_expire("bogus", now).is_err());
    }

    #[test]
    fn gc_never_deletes_nothing() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());
        put_object(&layout, &floats_le(&[1.0, 2.0, 3.0, 4.0]), "a.txt", "M1").unwrap();

        let outcome = gc(&layout, "never", false, false).unwrap();
        assert_eq!(outcome.files_deleted, 0);
    }

    #[test]
    fn gc_now_deletes_unreferenced_objects_but_keeps_live_ones() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());

        let live = put_object(&layout, &floats_le(&[1.0, 2.0, 3.0, 4.0]), "a.txt", "M1").unwrap();
        set::set_index(&layout, "main", &live.hash, "a.txt", "M1").unwrap();
        let dead = put_object(&layout, &floats_le(&[9.0, 9.0, 9.0, 9.0]), "b.txt", "M1").unwrap();

        let outcome = gc(&layout, "now", false, false).unwrap();
        assert_eq!(outcome.files_deleted, 1);
        assert!(!layout.object_raw(&dead.hash).exists());
        assert!(layout.object_raw(&live.hash).exists());
    }

    #[test]
    fn gc_refuses_to_run_under_a_live_remote_lock() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());
        layout.ensure_skeleton().unwrap();
        std::fs::write(layout.remote_lock(), std::process::id().to_string()).unwrap();

        let err = gc(&layout, "now", false, false).unwrap_err();
        assert!(matches!(err, EmbrError::LockFailed(_)));
    }

    #[test]
    fn dry_run_reports_without_deleting() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());
        let dead = put_object(&layout, &floats_le(&[9.0, 9.0, 9.0, 9.0]), "b.txt", "M1").unwrap();

        let outcome = gc(&layout, "now", false, true).unwrap();
        assert_eq!(outcome.files_deleted, 1);
        assert!(layout.object_raw(&dead.hash).exists());
    }
}

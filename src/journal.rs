//! Atomic remote lock and the append-only transaction journal
//! (`BEGIN`/`COMMIT`/`ABORT`/`RECOVER`, SPEC_FULL §4.7, §7).

use crate::error::{EmbrError, Result};
use crate::layout::{atomic_write, Layout};
use std::fs::OpenOptions;
use std::io::Write;

/// Holds `<root>/.embr/REMOTE_LOCK` for the lifetime of the guard. Dropping
/// it releases the lock. A stale lock (PID no longer alive) is stolen
/// rather than treated as held.
pub struct RemoteLock<'a> {
    layout: &'a Layout,
    released: bool,
}

impl<'a> RemoteLock<'a> {
    pub fn acquire(layout: &'a Layout) -> Result<Self> {
        let path = layout.remote_lock();
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let held_pid: Option<u32> = contents.trim().parse().ok();
                if held_pid.map(pid_is_alive).unwrap_or(false) {
                    return Err(EmbrError::LockFailed(format!(
                        "remote lock held by live pid {}",
                        held_pid.unwrap()
                    )));
                }
                tracing::warn!(pid = ?held_pid, "stealing stale remote lock");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(EmbrError::io(&path, e)),
        }
        atomic_write(&path, std::process::id().to_string().as_bytes())
            .map_err(|e| EmbrError::io(&path, e))?;
        Ok(Self {
            layout,
            released: false,
        })
    }

    pub fn release(mut self) -> Result<()> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        match std::fs::remove_file(self.layout.remote_lock()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EmbrError::from(e)),
        }
    }
}

impl Drop for RemoteLock<'_> {
    fn drop(&mut self) {
        let _ = self.release_inner();
    }
}

#[cfg(unix)]
fn pid_is_alive(pid: u32) -> bool {
    // Signal 0 performs no-op permission/existence checks (kill(2)).
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
fn pid_is_alive(_pid: u32) -> bool {
    false
}

pub fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn append_journal_line(layout: &Layout, line: &str) -> Result<()> {
    let path = layout.remote_journal();
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| EmbrError::io(&path, e))?;
    writeln!(file, "{line}").map_err(|e| EmbrError::io(&path, e))
}

pub fn begin(layout: &Layout, op: &str, remote: &str, path: &str) -> Result<()> {
    append_journal_line(
        layout,
        &format!("BEGIN {} {op} {remote} {path}", unix_timestamp()),
    )
}

pub fn commit(layout: &Layout) -> Result<()> {
    append_journal_line(layout, &format!("COMMIT {}", unix_timestamp()))
}

pub fn abort(layout: &Layout) -> Result<()> {
    append_journal_line(layout, &format!("ABORT {}", unix_timestamp()))
}

fn recover_marker(layout: &Layout) -> Result<()> {
    append_journal_line(layout, &format!("RECOVER {}", unix_timestamp()))
}

/// Abort an in-flight remote transaction: delete `REMOTE_TEMP`, append
/// `ABORT`, and propagate the original error (SPEC_FULL §7).
pub fn abort_transaction(layout: &Layout, original: EmbrError) -> EmbrError {
    let temp = layout.remote_temp();
    if temp.exists() {
        let _ = std::fs::remove_file(&temp);
    }
    if let Err(e) = abort(layout) {
        tracing::warn!(error = %e, "failed to append ABORT to remote journal");
    }
    original
}

/// Run at `Repo::open` before any other operation (SPEC_FULL §7, P6): if
/// the last journal line is an unterminated `BEGIN` and `REMOTE_TEMP`
/// exists, complete the transaction by renaming it to `REMOTE_HEAD`;
/// otherwise clear any leftover `REMOTE_TEMP`. Either way, append
/// `RECOVER`. Returns `true` if recovery action was needed.
pub fn recover(layout: &Layout) -> Result<bool> {
    let journal_path = layout.remote_journal();
    let text = match std::fs::read_to_string(&journal_path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(EmbrError::io(&journal_path, e)),
    };

    let mut depth: i64 = 0;
    for line in text.lines() {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("BEGIN") => depth += 1,
            Some("COMMIT") | Some("ABORT") => depth -= 1,
            _ => {}
        }
    }
    if depth <= 0 {
        return Ok(false);
    }

    let temp = layout.remote_temp();
    let head = layout.remote_head();
    if temp.exists() {
        std::fs::rename(&temp, &head).map_err(|e| EmbrError::io(&head, e))?;
        tracing::info!("recovered in-flight remote transaction by completing it");
    } else if head.exists() {
        tracing::info!("no pending REMOTE_TEMP to recover; leaving REMOTE_HEAD as-is");
    } else {
        tracing::info!("recovering from unterminated transaction with no pending temp ref");
    }
    recover_marker(layout)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lock_round_trips_and_can_be_reacquired_after_release() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());
        layout.ensure_skeleton().unwrap();
        let lock = RemoteLock::acquire(&layout).unwrap();
        assert!(layout.remote_lock().exists());
        lock.release().unwrap();
        assert!(!layout.remote_lock().exists());

        let _lock2 = RemoteLock::acquire(&layout).unwrap();
        assert!(layout.remote_lock().exists());
    }

    #[test]
    fn stale_lock_with_dead_pid_is_stolen() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());
        layout.ensure_skeleton().unwrap();
        // PID 2^31-2 is vanishingly unlikely to be alive in any test sandbox.
        std::fs::write(layout.remote_lock(), "2147483646").unwrap();
        let lock = RemoteLock::acquire(&layout).unwrap();
        drop(lock);
    }

    #[test]
    fn recover_completes_dangling_begin_when_temp_exists() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());
        layout.ensure_skeleton().unwrap();
        begin(&layout, "PUSH", "origin", "a.txt").unwrap();
        std::fs::write(layout.remote_temp(), b"OPERATION push\n").unwrap();

        let recovered = recover(&layout).unwrap();
        assert!(recovered);
        assert!(!layout.remote_temp().exists());
        assert!(layout.remote_head().exists());
        let journal = std::fs::read_to_string(layout.remote_journal()).unwrap();
        assert!(journal.lines().last().unwrap().starts_with("RECOVER"));
    }

    #[test]
    fn recover_is_a_noop_when_last_transaction_committed() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());
        layout.ensure_skeleton().unwrap();
        begin(&layout, "PUSH", "origin", "a.txt").unwrap();
        commit(&layout).unwrap();

        assert!(!recover(&layout).unwrap());
    }
}

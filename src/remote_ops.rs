//! Remote push/pull/prune orchestration: transaction journal, batched
//! chunked transfer with retry, and resumable push (SPEC_FULL §4.7).

use crate::config::RemoteConfig;
use crate::error::{EmbrError, Result};
use crate::journal::{self, RemoteLock};
use crate::layout::Layout;
use crate::operation::{OperationKind, OperationTracker};
use crate::transform::TransformerRegistry;
use crate::transport::{self, Transport, TransportOptions};
use std::thread::sleep;
use std::time::Duration;

pub const BATCH_SIZE: u64 = 8 * 1024 * 1024;
pub const MAX_RETRIES: u32 = 3;
pub const RETRY_DELAY_MS: u64 = 1000;

/// djb2-like 64-bit weak checksum, hex-encoded (SPEC_FULL §4.7 step 5).
pub fn djb2_hex(bytes: &[u8]) -> String {
    let mut hash: u64 = 5381;
    for &b in bytes {
        hash = hash.wrapping_mul(33).wrapping_add(b as u64);
    }
    format!("{hash:016x}")
}

fn transport_options(remote: &RemoteConfig) -> TransportOptions {
    TransportOptions {
        timeout: Duration::from_secs(remote.timeout_secs),
        token: remote.token.clone(),
        verify_ssl: remote.verify_ssl,
    }
}

fn send_with_retry(transport: &mut dyn Transport, buf: &[u8], hash: Option<&str>) -> Result<()> {
    let mut attempt = 0;
    loop {
        match transport.send(buf, hash) {
            Ok(()) => return Ok(()),
            Err(e) => {
                attempt += 1;
                if attempt >= MAX_RETRIES {
                    return Err(e);
                }
                tracing::warn!(attempt, error = %e, "transport send failed, retrying");
                sleep(Duration::from_millis(RETRY_DELAY_MS));
            }
        }
    }
}

fn batch_tag(remote: &str, path: &str, index: u64) -> String {
    format!("{remote}-{}-batch{index}", path.replace(['/', '\\'], "_"))
}

fn write_temp_ref(layout: &Layout, remote: &str, path: &str, size: u64, checksum: &str) -> Result<()> {
    let contents = format!(
        "OPERATION push\nREMOTE {remote}\nPATH {path}\nSIZE {size}\nTIMESTAMP {}\nCHECKSUM {checksum}\n",
        journal::unix_timestamp(),
    );
    let temp = layout.remote_temp();
    crate::layout::atomic_write(&temp, contents.as_bytes()).map_err(|e| EmbrError::io(&temp, e))
}

/// Push `payload` (already transformed or raw, caller's choice via
/// `remote.transformer`/`target_format`) for `path` to `remote`. Resumes
/// automatically if a matching incomplete operation is on record.
pub fn push(
    layout: &Layout,
    remote: &RemoteConfig,
    registry: &TransformerRegistry,
    tracker: &mut OperationTracker,
    path: &str,
    payload: &[u8],
    object_hash: Option<&str>,
) -> Result<()> {
    let lock = RemoteLock::acquire(layout)?;
    match push_locked(layout, remote, registry, tracker, path, payload, object_hash) {
        Ok(()) => {
            lock.release()?;
            Ok(())
        }
        Err(e) => {
            let e = journal::abort_transaction(layout, e);
            let _ = lock.release();
            Err(e)
        }
    }
}

fn push_locked(
    layout: &Layout,
    remote: &RemoteConfig,
    registry: &TransformerRegistry,
    tracker: &mut OperationTracker,
    path: &str,
    payload: &[u8],
    object_hash: Option<&str>,
) -> Result<()> {
    journal::begin(layout, "PUSH", &remote.name, path)?;

    let mut transport = transport::dispatch(&remote.url, transport_options(remote))?;
    transport.connect(path)?;

    let transformer = registry.by_format(&remote.target_format).ok_or_else(|| {
        EmbrError::InvalidInput(format!("unknown target format {:?}", remote.target_format))
    })?;
    let wire = transformer.transform(payload)?;
    let size = wire.len() as u64;
    let checksum = djb2_hex(&wire);
    let now = journal::unix_timestamp();

    let resume_from = tracker
        .find(&remote.name, path, OperationKind::Push)
        .filter(|op| !op.completed && op.total_size == size && op.checksum == checksum)
        .map(|op| op.transferred);

    if let Some(transferred) = resume_from {
        resume_batched_send(transport.as_mut(), remote, tracker, path, &wire, transferred, &checksum, now)?;
        tracker.save(layout)?;
    } else if size <= BATCH_SIZE {
        tracker.start_operation(&remote.name, path, OperationKind::Push, size, &checksum, now);
        send_with_retry(transport.as_mut(), &wire, object_hash)?;
        tracker.update_operation(&remote.name, path, OperationKind::Push, size, journal::unix_timestamp());
        tracker.complete_operation(&remote.name, path, OperationKind::Push);
        tracker.save(layout)?;
    } else {
        tracker.start_operation(&remote.name, path, OperationKind::Push, size, &checksum, now);
        send_batches(transport.as_mut(), remote.name.as_str(), path, &wire, 0, tracker)?;
        tracker.save(layout)?;
    }

    write_temp_ref(layout, &remote.name, path, size, &checksum)?;
    let temp = layout.remote_temp();
    let head = layout.remote_head();
    std::fs::rename(&temp, &head).map_err(|e| EmbrError::io(&head, e))?;
    journal::commit(layout)?;
    Ok(())
}

/// Split `wire` into `ceil(len/BATCH_SIZE)` batches starting at batch index
/// `start_batch` (0-based, bytes already covered by earlier batches equal
/// `start_batch * BATCH_SIZE`), sending each as
/// `[u32_be header_len][ascii header][zstd payload]` and finalizing with a
/// literal `END` marker. Each batch reconnects the transport to its own
/// tag so a streaming remote can address chunks independently of the
/// object's final resting path.
fn send_batches(
    transport: &mut dyn Transport,
    remote: &str,
    path: &str,
    wire: &[u8],
    start_batch: u64,
    tracker: &mut OperationTracker,
) -> Result<()> {
    let total = wire.len() as u64;
    let n_batches = total.div_ceil(BATCH_SIZE).max(1);

    for i in start_batch..n_batches {
        let offset = (i * BATCH_SIZE) as usize;
        let end = ((i + 1) * BATCH_SIZE).min(total) as usize;
        let chunk = &wire[offset..end];
        let compressed = crate::compress::compress(chunk, crate::compress::DEFAULT_LEVEL)?;
        let header = format!("BATCH {}/{} SIZE {} COMPRESSED {}", i + 1, n_batches, chunk.len(), compressed.len());
        let mut frame = Vec::with_capacity(4 + header.len() + compressed.len());
        frame.extend_from_slice(&(header.len() as u32).to_be_bytes());
        frame.extend_from_slice(header.as_bytes());
        frame.extend_from_slice(&compressed);

        transport.connect(&batch_tag(remote, path, i + 1))?;
        send_with_retry(transport, &frame, None)?;

        tracker.update_operation(remote, path, OperationKind::Push, end as u64, journal::unix_timestamp());
    }
    transport.connect(&batch_tag(remote, path, n_batches + 1))?;
    send_with_retry(transport, b"END", None)?;
    transport.connect(path)?;
    tracker.complete_operation(remote, path, OperationKind::Push);
    Ok(())
}

fn resume_batched_send(
    transport: &mut dyn Transport,
    remote: &RemoteConfig,
    tracker: &mut OperationTracker,
    path: &str,
    wire: &[u8],
    transferred: u64,
    checksum: &str,
    now: u64,
) -> Result<()> {
    let total = wire.len() as u64;
    let n_batches = total.div_ceil(BATCH_SIZE).max(1);
    let next_batch = transferred / BATCH_SIZE; // 0-based index of next unsent batch
    let preamble = format!(
        "RESUME {}/{} FROM {} TOTAL {}",
        next_batch + 1,
        n_batches,
        transferred,
        total,
    );
    tracing::info!(preamble = %preamble, "resuming interrupted push");
    transport.connect(&batch_tag(&remote.name, path, 0))?;
    send_with_retry(transport, preamble.as_bytes(), None)?;

    tracker.start_operation(&remote.name, path, OperationKind::Push, total, checksum, now);
    tracker.update_operation(&remote.name, path, OperationKind::Push, transferred, now);
    send_batches(transport, &remote.name, path, wire, next_batch, tracker)
}

/// Pull `path` from `remote`: dynamic single-buffer strategy starting at 4
/// MiB, doubling on a full read until a short read, then decompressing if
/// the result looks like a zstd frame.
pub fn pull(remote: &RemoteConfig, path: &str) -> Result<Vec<u8>> {
    let mut transport = transport::dispatch(&remote.url, transport_options(remote))?;
    transport.connect(path)?;

    let mut collected = Vec::new();
    let mut cap: usize = 4 * 1024 * 1024;
    loop {
        let mut chunk = Vec::new();
        let n = transport.receive(&mut chunk, cap)?;
        collected.extend_from_slice(&chunk);
        if n < cap {
            break;
        }
        cap *= 2;
    }
    crate::compress::decompress(&collected)
}

/// Sends a `PRUNE <older_than_secs> <dry_run>` control message and parses
/// the `PRUNED n FILES b BYTES` response.
pub fn prune(remote: &RemoteConfig, older_than_secs: u64, dry_run: bool) -> Result<(u64, u64)> {
    let mut transport = transport::dispatch(&remote.url, transport_options(remote))?;
    transport.connect("_control")?;
    let request = format!("PRUNE {} {}", older_than_secs, if dry_run { 1 } else { 0 });
    transport.send(request.as_bytes(), None)?;

    let mut response = Vec::new();
    transport.receive(&mut response, 4096)?;
    let text = String::from_utf8_lossy(&response);
    parse_pruned_response(&text)
}

fn parse_pruned_response(text: &str) -> Result<(u64, u64)> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    if parts.len() == 5 && parts[0] == "PRUNED" && parts[2] == "FILES" && parts[4] == "BYTES" {
        let files: u64 = parts[1]
            .parse()
            .map_err(|_| EmbrError::Protocol(format!("malformed PRUNED response: {text:?}")))?;
        let bytes: u64 = parts[3]
            .parse()
            .map_err(|_| EmbrError::Protocol(format!("malformed PRUNED response: {text:?}")))?;
        Ok((files, bytes))
    } else {
        Err(EmbrError::Protocol(format!("malformed PRUNED response: {text:?}")))
    }
}

//! Operation tracker: records in-flight and completed transfers so a
//! push can resume after interruption (SPEC_FULL §4.7, P5).

use crate::error::{EmbrError, Result};
use crate::layout::{atomic_write, Layout};

pub const MAX_OPERATIONS: usize = 32;
const STATE_HEADER: &str = "OPERATION_STATE_V1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Push,
    Pull,
}

impl OperationKind {
    fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Push => "push",
            OperationKind::Pull => "pull",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "push" => Some(OperationKind::Push),
            "pull" => Some(OperationKind::Pull),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OperationState {
    pub remote: String,
    pub path: String,
    pub kind: OperationKind,
    pub total_size: u64,
    pub transferred: u64,
    pub start: u64,
    pub last_update: u64,
    pub checksum: String,
    pub completed: bool,
}

impl OperationState {
    fn to_record(&self) -> String {
        format!(
            "{} {} {} {} {} {} {} {} {}",
            self.remote,
            self.path,
            self.kind.as_str(),
            self.total_size,
            self.transferred,
            self.start,
            self.last_update,
            self.checksum,
            if self.completed { 1 } else { 0 },
        )
    }

    fn from_record(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        Some(OperationState {
            remote: parts.next()?.to_string(),
            path: parts.next()?.to_string(),
            kind: OperationKind::parse(parts.next()?)?,
            total_size: parts.next()?.parse().ok()?,
            transferred: parts.next()?.parse().ok()?,
            start: parts.next()?.parse().ok()?,
            last_update: parts.next()?.parse().ok()?,
            checksum: parts.next()?.to_string(),
            completed: parts.next()? == "1",
        })
    }
}

/// Tracks operations in insertion order; evicts the oldest *completed*
/// entry when a new one would exceed [`MAX_OPERATIONS`].
#[derive(Debug, Default)]
pub struct OperationTracker {
    operations: Vec<OperationState>,
}

impl OperationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(layout: &Layout) -> Result<Self> {
        let path = layout.operations_state();
        let text = match std::fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(EmbrError::io(&path, e)),
        };
        let mut lines = text.lines();
        let header = lines.next().unwrap_or_default();
        if header != STATE_HEADER {
            tracing::warn!(path = %path.display(), "operations.state has unrecognized header, starting fresh");
            return Ok(Self::new());
        }
        let count: usize = lines.next().and_then(|l| l.trim().parse().ok()).unwrap_or(0);
        let operations = lines.filter_map(OperationState::from_record).take(count).collect();
        Ok(Self { operations })
    }

    pub fn save(&self, layout: &Layout) -> Result<()> {
        let mut text = String::new();
        text.push_str(STATE_HEADER);
        text.push('\n');
        text.push_str(&self.operations.len().to_string());
        text.push('\n');
        for op in &self.operations {
            text.push_str(&op.to_record());
            text.push('\n');
        }
        let path = layout.operations_state();
        atomic_write(&path, text.as_bytes()).map_err(|e| EmbrError::io(&path, e))
    }

    pub fn find(&self, remote: &str, path: &str, kind: OperationKind) -> Option<&OperationState> {
        self.operations
            .iter()
            .find(|op| op.remote == remote && op.path == path && op.kind == kind)
    }

    /// Insert a fresh operation record, evicting the oldest completed
    /// record first if at capacity.
    pub fn start_operation(
        &mut self,
        remote: &str,
        path: &str,
        kind: OperationKind,
        total_size: u64,
        checksum: &str,
        now: u64,
    ) {
        self.operations
            .retain(|op| !(op.remote == remote && op.path == path && op.kind == kind));
        if self.operations.len() >= MAX_OPERATIONS {
            if let Some(idx) = self.operations.iter().position(|op| op.completed) {
                self.operations.remove(idx);
            } else {
                self.operations.remove(0);
            }
        }
        self.operations.push(OperationState {
            remote: remote.to_string(),
            path: path.to_string(),
            kind,
            total_size,
            transferred: 0,
            start: now,
            last_update: now,
            checksum: checksum.to_string(),
            completed: false,
        });
    }

    pub fn update_operation(&mut self, remote: &str, path: &str, kind: OperationKind, transferred: u64, now: u64) {
        if let Some(op) = self
            .operations
            .iter_mut()
            .find(|op| op.remote == remote && op.path == path && op.kind == kind)
        {
            op.transferred = transferred;
            op.last_update = now;
        }
    }

    pub fn complete_operation(&mut self, remote: &str, path: &str, kind: OperationKind) {
        if let Some(op) = self
            .operations
            .iter_mut()
            .find(|op| op.remote == remote && op.path == path && op.kind == kind)
        {
            op.completed = true;
        }
    }
}

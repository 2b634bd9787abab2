//! The error taxonomy surfaced directly by every component. Internal layers
//! never invent status codes outside this enum (see design note in
//! SPEC_FULL §7) — a new failure mode must be mapped onto one of these
//! variants, not bolted on as a new one.

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum EmbrError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("ambiguous reference {prefix:?}: {count} candidates matched")]
    Ambiguous { prefix: String, count: usize },

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },

    #[error("out of memory")]
    Memory,

    #[error("lock failed: {0}")]
    LockFailed(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("computation failed: {0}")]
    ComputationFailed(String),

    #[error("repository not initialized at {0:?}")]
    NotInitialized(PathBuf),

    /// Rollback without a `model` filter when more than one model has an
    /// entry for the source path. Carries the list so the caller (the CLI,
    /// out of this crate's scope) can present a disambiguation prompt.
    #[error("model required: {path} is tracked under multiple models {available:?}")]
    ModelRequired {
        path: String,
        available: Vec<String>,
    },
}

pub type Result<T> = std::result::Result<T, EmbrError>;

impl EmbrError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EmbrError::Io {
            path: Some(path.into()),
            source,
        }
    }
}

impl From<std::io::Error> for EmbrError {
    fn from(source: std::io::Error) -> Self {
        EmbrError::Io { path: None, source }
    }
}

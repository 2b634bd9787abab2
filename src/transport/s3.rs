//! S3 transport (SPEC_FULL §4.6). No AWS SDK or S3-compatible client crate
//! appears anywhere in the reference corpus this crate is grounded on, so
//! (per DESIGN.md) this stays a stub rather than fabricate a dependency.
//! Wired the same way as [`super::ssh::SshTransport`] against a pluggable
//! channel for a future real backend.

use super::{Transport, TransportOptions};
use crate::error::{EmbrError, Result};

trait RawChannel: Send {
    fn put(&mut self, key: &str, buf: &[u8]) -> Result<()>;
    fn get(&mut self, key: &str) -> Result<Vec<u8>>;
}

pub struct S3Transport {
    _channel: Box<dyn RawChannel>,
    last_error: Option<EmbrError>,
}

impl S3Transport {
    /// Always returns `NotImplemented`: see module docs.
    pub fn dial(target: &str, _opts: TransportOptions) -> Result<Self> {
        Err(EmbrError::NotImplemented(format!(
            "s3 transport has no client backend in this build (target {target:?})"
        )))
    }
}

impl Transport for S3Transport {
    fn connect(&mut self, _target_path: &str) -> Result<()> {
        Err(EmbrError::NotImplemented("s3 transport".to_string()))
    }

    fn disconnect(&mut self) -> Result<()> {
        Err(EmbrError::NotImplemented("s3 transport".to_string()))
    }

    fn send(&mut self, _buf: &[u8], _hash: Option<&str>) -> Result<()> {
        Err(EmbrError::NotImplemented("s3 transport".to_string()))
    }

    fn receive(&mut self, _buf: &mut Vec<u8>, _cap: usize) -> Result<usize> {
        Err(EmbrError::NotImplemented("s3 transport".to_string()))
    }

    fn list_refs(&mut self) -> Result<Vec<String>> {
        Err(EmbrError::NotImplemented("s3 transport".to_string()))
    }

    fn delete_refs(&mut self, _names: &[String]) -> Result<()> {
        Err(EmbrError::NotImplemented("s3 transport".to_string()))
    }

    fn last_error(&self) -> Option<&EmbrError> {
        self.last_error.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dial_reports_not_implemented() {
        let err = S3Transport::dial("bucket/key", TransportOptions::default()).unwrap_err();
        assert!(matches!(err, EmbrError::NotImplemented(_)));
    }
}

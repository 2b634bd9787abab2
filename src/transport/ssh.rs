//! SSH transport (SPEC_FULL §4.6). No `ssh2`/`russh`-style client crate
//! appears anywhere in the reference corpus this crate is grounded on, and
//! fabricating one would violate the no-invented-dependencies rule (see
//! DESIGN.md). The shape is wired up against a pluggable channel so a real
//! client can be dropped in later without touching callers, but the only
//! constructor available today reports `NotImplemented`.

use super::{Transport, TransportOptions};
use crate::error::{EmbrError, Result};

/// Abstraction a concrete SSH client library would implement.
trait RawChannel: Send {
    fn write_all(&mut self, buf: &[u8]) -> Result<()>;
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
}

pub struct SshTransport {
    _channel: Box<dyn RawChannel>,
    last_error: Option<EmbrError>,
}

impl SshTransport {
    /// Always returns `NotImplemented`: see module docs.
    pub fn dial(target: &str, _opts: TransportOptions) -> Result<Self> {
        Err(EmbrError::NotImplemented(format!(
            "ssh transport has no client backend in this build (target {target:?})"
        )))
    }
}

impl Transport for SshTransport {
    fn connect(&mut self, _target_path: &str) -> Result<()> {
        Err(EmbrError::NotImplemented("ssh transport".to_string()))
    }

    fn disconnect(&mut self) -> Result<()> {
        Err(EmbrError::NotImplemented("ssh transport".to_string()))
    }

    fn send(&mut self, _buf: &[u8], _hash: Option<&str>) -> Result<()> {
        Err(EmbrError::NotImplemented("ssh transport".to_string()))
    }

    fn receive(&mut self, _buf: &mut Vec<u8>, _cap: usize) -> Result<usize> {
        Err(EmbrError::NotImplemented("ssh transport".to_string()))
    }

    fn list_refs(&mut self) -> Result<Vec<String>> {
        Err(EmbrError::NotImplemented("ssh transport".to_string()))
    }

    fn delete_refs(&mut self, _names: &[String]) -> Result<()> {
        Err(EmbrError::NotImplemented("ssh transport".to_string()))
    }

    fn last_error(&self) -> Option<&EmbrError> {
        self.last_error.as_ref()
    }
}

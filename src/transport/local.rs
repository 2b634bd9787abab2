//! Mandatory reference transport: copies bytes from/to files under the
//! URL path on the local filesystem (SPEC_FULL §4.6).

use super::Transport;
use crate::error::{EmbrError, Result};
use crate::layout::atomic_write;
use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

pub struct LocalTransport {
    root: PathBuf,
    target_path: Option<PathBuf>,
    read_offset: u64,
    last_error: Option<EmbrError>,
}

impl LocalTransport {
    pub fn new(url_path: &str) -> Self {
        Self {
            root: PathBuf::from(url_path),
            target_path: None,
            read_offset: 0,
            last_error: None,
        }
    }

    fn target(&mut self) -> Result<PathBuf> {
        self.target_path.clone().ok_or_else(|| {
            EmbrError::Protocol("local transport used before connect".to_string())
        })
    }

    fn fail(&mut self, err: EmbrError) -> EmbrError {
        self.last_error = Some(EmbrError::Protocol(err.to_string()));
        err
    }
}

impl Transport for LocalTransport {
    fn connect(&mut self, target_path: &str) -> Result<()> {
        let full = self.root.join(target_path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| EmbrError::io(parent, e))?;
        }
        self.target_path = Some(full);
        self.read_offset = 0;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        self.target_path = None;
        self.read_offset = 0;
        Ok(())
    }

    /// `hash`, when given, is recorded as a companion `<target>.hash` file
    /// alongside the payload — useful for a caller to verify content
    /// addressing without this reference transport needing to understand
    /// the wire format it is carrying.
    fn send(&mut self, buf: &[u8], hash: Option<&str>) -> Result<()> {
        let path = self.target()?;
        atomic_write(&path, buf).map_err(|e| self.fail(EmbrError::io(&path, e)))?;
        if let Some(h) = hash {
            let hash_path = path.with_extension("hash");
            atomic_write(&hash_path, h.as_bytes()).map_err(|e| self.fail(EmbrError::io(hash_path, e)))?;
        }
        Ok(())
    }

    /// Continues from the read offset left by the previous `receive` on
    /// this connection, so repeated doubling-buffer calls reassemble a
    /// payload larger than the first `cap` rather than re-reading the file
    /// from the start each time.
    fn receive(&mut self, buf: &mut Vec<u8>, cap: usize) -> Result<usize> {
        let path = self.target()?;
        let offset = self.read_offset;
        let mut file = fs::File::open(&path).map_err(|e| self.fail(EmbrError::io(&path, e)))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| self.fail(EmbrError::io(&path, e)))?;
        let mut chunk = vec![0u8; cap];
        let n = file
            .read(&mut chunk)
            .map_err(|e| self.fail(EmbrError::from(e)))?;
        buf.extend_from_slice(&chunk[..n]);
        self.read_offset += n as u64;
        Ok(n)
    }

    fn list_refs(&mut self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(|e| self.fail(EmbrError::io(&self.root, e)))? {
            let entry = entry.map_err(|e| self.fail(EmbrError::from(e)))?;
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete_refs(&mut self, names: &[String]) -> Result<()> {
        for name in names {
            let path = self.root.join(name);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(self.fail(EmbrError::io(path, e))),
            }
        }
        Ok(())
    }

    fn last_error(&self) -> Option<&EmbrError> {
        self.last_error.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn send_then_receive_round_trips() {
        let dir = tempdir().unwrap();
        let mut t = LocalTransport::new(dir.path().to_str().unwrap());
        t.connect("blob").unwrap();
        t.send(b"hello remote", None).unwrap();

        let mut out = Vec::new();
        let n = t.receive(&mut out, 4 * 1024 * 1024).unwrap();
        assert_eq!(n, out.len());
        assert_eq!(out, b"hello remote");
    }

    #[test]
    fn list_and_delete_refs() {
        let dir = tempdir().unwrap();
        let mut t = LocalTransport::new(dir.path().to_str().unwrap());
        t.connect("a").unwrap();
        t.send(b"1", None).unwrap();
        t.connect("b").unwrap();
        t.send(b"2", None).unwrap();

        let mut refs = t.list_refs().unwrap();
        refs.sort();
        assert_eq!(refs, vec!["a".to_string(), "b".to_string()]);

        t.delete_refs(&["a".to_string()]).unwrap();
        assert_eq!(t.list_refs().unwrap(), vec!["b".to_string()]);
    }

    #[test]
    fn receive_before_connect_is_a_protocol_error() {
        let mut t = LocalTransport::new("/tmp/does-not-matter");
        let mut out = Vec::new();
        let err = t.receive(&mut out, 1024).unwrap_err();
        assert!(matches!(err, EmbrError::Protocol(_)));
    }
}

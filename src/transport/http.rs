//! HTTP(S) transport built on `ureq` (SPEC_FULL §4.6) — already part of the
//! teacher's dependency graph and "100% synchronous", matching this core's
//! single-threaded-per-call transport model. Objects are addressed as
//! `<base_url>/<target_path>`; refs are listed/deleted through a small
//! `_refs` control endpoint the remote server is expected to expose.

use super::{Transport, TransportOptions};
use crate::error::{EmbrError, Result};
use std::io::Read;

pub struct HttpTransport {
    base_url: String,
    agent: ureq::Agent,
    token: Option<String>,
    target_url: Option<String>,
    last_error: Option<EmbrError>,
}

impl HttpTransport {
    pub fn new(base_url: &str, opts: TransportOptions) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(opts.timeout)
            .timeout_read(opts.timeout)
            .build();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
            token: opts.token,
            target_url: None,
            last_error: None,
        }
    }

    fn authed(&self, request: ureq::Request) -> ureq::Request {
        match &self.token {
            Some(t) => request.set("Authorization", &format!("Bearer {t}")),
            None => request,
        }
    }

    fn fail(&mut self, msg: impl Into<String>) -> EmbrError {
        let err = EmbrError::ConnectionFailed(msg.into());
        self.last_error = Some(EmbrError::Protocol(err.to_string()));
        err
    }
}

impl Transport for HttpTransport {
    fn connect(&mut self, target_path: &str) -> Result<()> {
        self.target_url = Some(format!(
            "{}/{}",
            self.base_url,
            target_path.trim_start_matches('/')
        ));
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        self.target_url = None;
        Ok(())
    }

    fn send(&mut self, buf: &[u8], hash: Option<&str>) -> Result<()> {
        let url = self
            .target_url
            .clone()
            .ok_or_else(|| EmbrError::Protocol("http transport used before connect".to_string()))?;
        let mut req = self.authed(self.agent.put(&url));
        if let Some(h) = hash {
            req = req.set("X-Embr-Hash", h);
        }
        req.send_bytes(buf)
            .map(|_| ())
            .map_err(|e| self.fail(e.to_string()))
    }

    fn receive(&mut self, buf: &mut Vec<u8>, cap: usize) -> Result<usize> {
        let url = self
            .target_url
            .clone()
            .ok_or_else(|| EmbrError::Protocol("http transport used before connect".to_string()))?;
        let response = self
            .authed(self.agent.get(&url))
            .call()
            .map_err(|e| self.fail(e.to_string()))?;
        let mut chunk = vec![0u8; cap];
        let mut reader = response.into_reader();
        let n = reader
            .read(&mut chunk)
            .map_err(|e| self.fail(e.to_string()))?;
        buf.extend_from_slice(&chunk[..n]);
        Ok(n)
    }

    fn list_refs(&mut self) -> Result<Vec<String>> {
        let url = format!("{}/_refs", self.base_url);
        let body = self
            .authed(self.agent.get(&url))
            .call()
            .map_err(|e| self.fail(e.to_string()))?
            .into_string()
            .map_err(|e| self.fail(e.to_string()))?;
        Ok(body.lines().map(|l| l.to_string()).filter(|l| !l.is_empty()).collect())
    }

    fn delete_refs(&mut self, names: &[String]) -> Result<()> {
        for name in names {
            let url = format!("{}/{}", self.base_url, name);
            self.authed(self.agent.delete(&url))
                .call()
                .map_err(|e| self.fail(e.to_string()))?;
        }
        Ok(())
    }

    fn last_error(&self) -> Option<&EmbrError> {
        self.last_error.as_ref()
    }
}

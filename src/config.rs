//! Hand-parsed INI-like config for `.embr/config` and `.embr/config.local`
//! (SPEC_FULL §4.7, design note "String-based config parsing"). The format
//! is simple enough to hand-parse; rewriting the remote section must not
//! disturb unrelated sections or comments.

use crate::error::{EmbrError, Result};
use std::path::Path;

#[derive(Debug, Clone, Default)]
struct IniSection {
    header: String,
    lines: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct IniDocument {
    leading: Vec<String>,
    sections: Vec<IniSection>,
}

fn section_name<'a>(header: &'a str, kind: &str) -> Option<&'a str> {
    let header = header.trim();
    let prefix = format!("[{kind} \"");
    if !header.starts_with(&prefix) || !header.ends_with("\"]") {
        return None;
    }
    Some(&header[prefix.len()..header.len() - 2])
}

impl IniDocument {
    pub fn parse(text: &str) -> Self {
        let mut doc = IniDocument::default();
        let mut current: Option<IniSection> = None;

        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                if let Some(section) = current.take() {
                    doc.sections.push(section);
                }
                current = Some(IniSection {
                    header: line.to_string(),
                    lines: Vec::new(),
                });
            } else if let Some(section) = current.as_mut() {
                section.lines.push(line.to_string());
            } else {
                doc.leading.push(line.to_string());
            }
        }
        if let Some(section) = current.take() {
            doc.sections.push(section);
        }
        doc
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for l in &self.leading {
            out.push_str(l);
            out.push('\n');
        }
        for s in &self.sections {
            out.push_str(&s.header);
            out.push('\n');
            for l in &s.lines {
                out.push_str(l);
                out.push('\n');
            }
        }
        out
    }

    fn find_kv(lines: &[String], key: &str) -> Option<String> {
        let prefix = format!("{key} = ");
        let alt_prefix = format!("{key}=");
        for line in lines {
            let trimmed = line.trim();
            if let Some(v) = trimmed.strip_prefix(&prefix) {
                return Some(v.trim().to_string());
            }
            if let Some(v) = trimmed.strip_prefix(&alt_prefix) {
                return Some(v.trim().to_string());
            }
        }
        None
    }

    pub fn get(&self, kind: &str, name: &str, key: &str) -> Option<String> {
        self.sections
            .iter()
            .find(|s| section_name(&s.header, kind) == Some(name))
            .and_then(|s| Self::find_kv(&s.lines, key))
    }

    pub fn names(&self, kind: &str) -> Vec<String> {
        self.sections
            .iter()
            .filter_map(|s| section_name(&s.header, kind))
            .map(|n| n.to_string())
            .collect()
    }

    /// Replace (or append) a `[<kind> "<name>"]` section with exactly the
    /// given key=value pairs, leaving every other section untouched.
    pub fn set_section(&mut self, kind: &str, name: &str, kvs: &[(&str, String)]) {
        let header = format!("[{kind} \"{name}\"]");
        let lines: Vec<String> = kvs.iter().map(|(k, v)| format!("\t{k} = {v}")).collect();

        if let Some(section) = self
            .sections
            .iter_mut()
            .find(|s| section_name(&s.header, kind) == Some(name))
        {
            section.lines = lines;
        } else {
            self.sections.push(IniSection { header, lines });
        }
    }

    pub fn remove_section(&mut self, kind: &str, name: &str) {
        self.sections
            .retain(|s| section_name(&s.header, kind) != Some(name));
    }
}

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub name: String,
    pub url: String,
    pub token: Option<String>,
    pub timeout_secs: u64,
    pub verify_ssl: bool,
    pub transformer: String,
    pub target_format: String,
}

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn read_doc(path: &Path) -> Result<IniDocument> {
    match std::fs::read_to_string(path) {
        Ok(t) => Ok(IniDocument::parse(&t)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(IniDocument::default()),
        Err(e) => {
            // Parsing/reading errors in config are a warning, not fatal
            // (SPEC_FULL §7): continue with defaults.
            tracing::warn!(path = %path.display(), error = %e, "failed to read config, using defaults");
            Ok(IniDocument::default())
        }
    }
}

pub fn load_remote(layout: &crate::layout::Layout, name: &str) -> Result<Option<RemoteConfig>> {
    let doc = read_doc(&layout.config())?;
    let Some(url) = doc.get("remote", name, "url") else {
        return Ok(None);
    };
    let local = read_doc(&layout.config_local())?;
    let token = local.get("remote", name, "token");

    let timeout_secs = doc
        .get("remote", name, "timeout")
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let verify_ssl = doc
        .get("remote", name, "verify_ssl")
        .map(|s| s != "false" && s != "0")
        .unwrap_or(true);
    let transformer = doc
        .get("remote", name, "transformer")
        .unwrap_or_else(|| "json".to_string());
    let target_format = doc
        .get("remote", name, "format")
        .unwrap_or_else(|| "json".to_string());

    Ok(Some(RemoteConfig {
        name: name.to_string(),
        url,
        token,
        timeout_secs,
        verify_ssl,
        transformer,
        target_format,
    }))
}

pub fn list_remotes(layout: &crate::layout::Layout) -> Result<Vec<String>> {
    let doc = read_doc(&layout.config())?;
    Ok(doc.names("remote"))
}

pub fn save_remote(layout: &crate::layout::Layout, remote: &RemoteConfig) -> Result<()> {
    layout.ensure_skeleton().map_err(EmbrError::from)?;

    let config_path = layout.config();
    let mut doc = read_doc(&config_path)?;
    doc.set_section(
        "remote",
        &remote.name,
        &[
            ("url", remote.url.clone()),
            ("timeout", remote.timeout_secs.to_string()),
            ("verify_ssl", remote.verify_ssl.to_string()),
            ("transformer", remote.transformer.clone()),
            ("format", remote.target_format.clone()),
        ],
    );
    crate::layout::atomic_write(&config_path, doc.to_text().as_bytes())
        .map_err(|e| EmbrError::io(&config_path, e))?;

    let local_path = layout.config_local();
    let mut local_doc = read_doc(&local_path)?;
    if let Some(token) = &remote.token {
        local_doc.set_section("remote", &remote.name, &[("token", token.clone())]);
    } else {
        local_doc.remove_section("remote", &remote.name);
    }
    crate::layout::atomic_write(&local_path, local_doc.to_text().as_bytes())
        .map_err(|e| EmbrError::io(&local_path, e))?;
    set_mode_0600(&local_path)?;

    Ok(())
}

pub fn remove_remote(layout: &crate::layout::Layout, name: &str) -> Result<()> {
    let config_path = layout.config();
    let mut doc = read_doc(&config_path)?;
    doc.remove_section("remote", name);
    crate::layout::atomic_write(&config_path, doc.to_text().as_bytes())
        .map_err(|e| EmbrError::io(&config_path, e))?;

    let local_path = layout.config_local();
    let mut local_doc = read_doc(&local_path)?;
    local_doc.remove_section("remote", name);
    crate::layout::atomic_write(&local_path, local_doc.to_text().as_bytes())
        .map_err(|e| EmbrError::io(&local_path, e))?;
    Ok(())
}

#[cfg(unix)]
fn set_mode_0600(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let perms = std::fs::Permissions::from_mode(0o600);
    std::fs::set_permissions(path, perms).map_err(|e| EmbrError::io(path, e))
}

#[cfg(not(unix))]
fn set_mode_0600(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Layout;
    use tempfile::tempdir;

    #[test]
    fn save_and_load_remote_round_trips() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());
        let remote = RemoteConfig {
            name: "origin".to_string(),
            url: "file:///tmp/remote".to_string(),
            token: Some("secret-token".to_string()),
            timeout_secs: 45,
            verify_ssl: false,
            transformer: "json".to_string(),
            target_format: "json".to_string(),
        };
        save_remote(&layout, &remote).unwrap();

        let loaded = load_remote(&layout, "origin").unwrap().unwrap();
        assert_eq!(loaded.url, remote.url);
        assert_eq!(loaded.token.as_deref(), Some("secret-token"));
        assert_eq!(loaded.timeout_secs, 45);
        assert!(!loaded.verify_ssl);

        // Token lives only in config.local, never in the world-readable config.
        let main_text = std::fs::read_to_string(layout.config()).unwrap();
        assert!(!main_text.contains("secret-token"));
    }

    #[test]
    fn rewriting_one_remote_preserves_unrelated_sections_and_comments() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());
        layout.ensure_skeleton().unwrap();
        std::fs::write(
            layout.config(),
            "# a top comment\n[core]\n\tbare = true\n[remote \"other\"]\n\turl = http://example.com\n",
        )
        .unwrap();

        let remote = RemoteConfig {
            name: "origin".to_string(),
            url: "file:///tmp/remote".to_string(),
            token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            verify_ssl: true,
            transformer: "json".to_string(),
            target_format: "json".to_string(),
        };
        save_remote(&layout, &remote).unwrap();

        let text = std::fs::read_to_string(layout.config()).unwrap();
        assert!(text.contains("# a top comment"));
        assert!(text.contains("[core]"));
        assert!(text.contains("bare = true"));
        assert!(text.contains("[remote \"other\"]"));
        assert!(text.contains("[remote \"origin\"]"));
    }

    #[test]
    fn missing_remote_returns_none() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());
        assert!(load_remote(&layout, "nope").unwrap().is_none());
    }
}

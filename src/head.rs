//! `HEAD` pointer file and the rollback engine (SPEC_FULL §4.3).
//!
//! `HEAD` holds one `ref: <model> <hash>` line per model that has any
//! current embedding. Rollback rewrites only the line for the affected
//! model.

use crate::error::{EmbrError, Result};
use crate::layout::{atomic_write, Layout};
use crate::set;
use std::collections::BTreeMap;

pub fn read_head(layout: &Layout) -> Result<BTreeMap<String, String>> {
    let path = layout.head();
    let text = match std::fs::read_to_string(&path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(EmbrError::io(&path, e)),
    };

    let mut out = BTreeMap::new();
    for line in text.lines() {
        let Some(rest) = line.strip_prefix("ref: ") else {
            continue;
        };
        if let Some((model, hash)) = rest.split_once(' ') {
            out.insert(model.to_string(), hash.to_string());
        }
    }
    Ok(out)
}

fn write_head(layout: &Layout, refs: &BTreeMap<String, String>) -> Result<()> {
    let mut text = String::new();
    for (model, hash) in refs {
        text.push_str(&format!("ref: {model} {hash}\n"));
    }
    let path = layout.head();
    atomic_write(&path, text.as_bytes()).map_err(|e| EmbrError::io(&path, e))
}

/// Add or overwrite the `ref:` line for `model`.
pub fn update_head(layout: &Layout, model: &str, hash: &str) -> Result<()> {
    let mut refs = read_head(layout)?;
    refs.insert(model.to_string(), hash.to_string());
    write_head(layout, &refs)
}

/// Scan the log for lines whose path equals `path`, optionally filtered by
/// `model`, whose hash starts with `prefix`.
pub fn resolve_partial(
    layout: &Layout,
    set_name: &str,
    path: &str,
    prefix: &str,
    model: Option<&str>,
) -> Result<String> {
    if prefix.len() < crate::hash::MIN_PREFIX_LEN {
        return Err(EmbrError::InvalidInput(format!(
            "hash prefix must be at least {} characters",
            crate::hash::MIN_PREFIX_LEN
        )));
    }

    let entries = set::read_log(layout, set_name)?;
    let mut matches: Vec<String> = entries
        .into_iter()
        .filter(|e| e.path == path)
        .filter(|e| model.map(|m| e.model == m).unwrap_or(true))
        .filter(|e| e.hash.starts_with(prefix))
        .map(|e| e.hash)
        .collect();
    matches.dedup();

    match matches.len() {
        0 => Err(EmbrError::NotFound(format!(
            "no log entry for {path} matching prefix {prefix}"
        ))),
        1 => Ok(matches.remove(0)),
        n => Err(EmbrError::Ambiguous {
            prefix: prefix.to_string(),
            count: n,
        }),
    }
}

pub struct RollbackOutcome {
    pub hash: String,
    pub model: String,
}

/// Roll `path` back to the object whose hash matches `prefix`. If more than
/// one model has logged `path` and the caller did not supply `model`, fail
/// with `ModelRequired` carrying the available models.
pub fn rollback(
    layout: &Layout,
    set_name: &str,
    path: &str,
    prefix: &str,
    model: Option<&str>,
) -> Result<RollbackOutcome> {
    let model = match model {
        Some(m) => m.to_string(),
        None => {
            let models = set::models_for_source(layout, set_name, path)?;
            match models.len() {
                0 => {
                    return Err(EmbrError::NotFound(format!(
                        "no embeddings logged for {path}"
                    )))
                }
                1 => models.into_iter().next().unwrap(),
                _ => {
                    return Err(EmbrError::ModelRequired {
                        path: path.to_string(),
                        available: models,
                    })
                }
            }
        }
    };

    let hash = resolve_partial(layout, set_name, path, prefix, Some(&model))?;

    set::set_index(layout, set_name, &hash, path, &model)?;
    set::update_model_ref(layout, set_name, &model, &hash, path)?;
    update_head(layout, &model, &hash)?;

    tracing::info!(%path, %model, %hash, "rolled back");
    Ok(RollbackOutcome { hash, model })
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

    fn store(layout: &Layout, set_name: &str, payload: &[f32], path: &str, model: &str) -> String {
        let bytes = floats_le(payload);
        let outcome = put_object(layout, &bytes, path, model).unwrap();
        set::append_log(layout, set_name, &outcome.hash, path, model).unwrap();
        set::set_index(layout, set_name, &outcome.hash, path, model).unwrap();
        set::update_model_ref(layout, set_name, model, &outcome.hash, path).unwrap();
        update_head(layout, model, &outcome.hash).unwrap();
        outcome.hash
    }

    #[test]
    fn rollback_restores_index_and_head_without_touching_log() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());
        let h1 = store(&layout, "main", &[1.0, 0.0, 0.0, 0.0], "a.txt", "M1");
        store(&layout, "main", &[2.0, 0.0, 0.0, 0.0], "a.txt", "M1");
        store(&layout, "main", &[3.0, 0.0, 0.0, 0.0], "a.txt", "M1");

        let outcome = rollback(&layout, "main", "a.txt", &h1[..7], Some("M1")).unwrap();
        assert_eq!(outcome.hash, h1);

        let index = set::read_index(&layout, "main").unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].hash, h1);

        let head = read_head(&layout).unwrap();
        assert_eq!(head.get("M1"), Some(&h1));

        let log = set::read_log(&layout, "main").unwrap();
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn rollback_without_model_on_multi_model_source_requires_model() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());
        let h1 = store(&layout, "main", &[1.0, 0.0, 0.0, 0.0], "a.txt", "M1");
        store(&layout, "main", &[2.0, 0.0, 0.0, 0.0], "a.txt", "M2");

        let err = rollback(&layout, "main", "a.txt", &h1[..7], None).unwrap_err();
        match err {
            EmbrError::ModelRequired { available, .. } => {
                assert_eq!(available.len(), 2);
            }
            other => panic!("expected ModelRequired, got {other:?}"),
        }
    }

    #[test]
    fn ambiguous_prefix_is_reported() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());
        // Craft two log entries whose hashes share a prefix by appending
        // synthetic lines directly (object contents are irrelevant here).
        layout.ensure_set_dirs("main").unwrap();
        let log_path = layout.set_log("main");
        std::fs::write(
            &log_path,
            "1 abcdefabcdefabcdefabcdefabcdefabcdefabcdefabcdefabcdefabcdefabcd a.txt M1\n2 abcdeffedcbafedcbafedcbafedcbafedcbafedcbafedcbafedcbafedcbafedc a.txt M1\n",
        )
        .unwrap();

        let err = resolve_partial(&layout, "main", "a.txt", "abcd", Some("M1")).unwrap_err();
        assert!(matches!(err, EmbrError::Ambiguous { .. }));
    }
}

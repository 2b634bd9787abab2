//! `Repo`: the crate's single stateful entry point, gluing the object
//! store, set index/log, HEAD, remote registry, and operation tracker
//! together (SPEC_FULL §6, "Crate-level API surface").

use crate::config::{self, RemoteConfig};
use crate::error::{EmbrError, Result};
use crate::gc::{self, GcOutcome};
use crate::head::{self, RollbackOutcome};
use crate::layout::Layout;
use crate::meta::{now_iso8601, FileType, ObjectMeta};
use crate::object_store::{self, PutOutcome};
use crate::operation::OperationTracker;
use crate::remote_ops;
use crate::set;
use crate::transform::TransformerRegistry;
use std::path::Path;

/// Opened repository root plus the process-local state (transformer
/// registry, operation tracker) that lives alongside it.
pub struct Repo {
    layout: Layout,
    registry: TransformerRegistry,
    tracker: OperationTracker,
}

impl Repo {
    /// Open (or lazily initialize the skeleton of) a repository rooted at
    /// `root`, running crash recovery before any other operation (SPEC_FULL
    /// §7, P6).
    pub fn open(root: &Path) -> Result<Self> {
        let layout = Layout::new(root);
        layout.ensure_skeleton().map_err(EmbrError::from)?;
        if journal_recover(&layout)? {
            tracing::info!("recovered an in-flight remote transaction on open");
        }
        let tracker = OperationTracker::load(&layout)?;
        Ok(Self {
            layout,
            registry: TransformerRegistry::with_builtins(),
            tracker,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn operation_tracker(&self) -> &OperationTracker {
        &self.tracker
    }

    pub fn transformer_registry(&self) -> &TransformerRegistry {
        &self.registry
    }

    /// Store `embedding_path` (`.npy` or `.bin`) as the current embedding
    /// for `source` under `model` in `set`, updating the log, index, and
    /// model-ref, and advancing `HEAD` (SPEC_FULL §4.1).
    pub fn put(
        &self,
        set_name: &str,
        embedding_path: &Path,
        source: &Path,
        model: &str,
        dims_hint: Option<usize>,
    ) -> Result<PutOutcome> {
        object_store::validate_source(source)?;
        let (payload, file_type) = object_store::load_embedding_payload(embedding_path, dims_hint)?;
        let source_rel = source.to_string_lossy().to_string();

        let outcome = object_store::put_object_typed(&self.layout, &payload, &source_rel, model, file_type)?;

        set::append_log(&self.layout, set_name, &outcome.hash, &source_rel, model)?;
        set::set_index(&self.layout, set_name, &outcome.hash, &source_rel, model)?;
        set::update_model_ref(&self.layout, set_name, model, &outcome.hash, &source_rel)?;
        head::update_head(&self.layout, model, &outcome.hash)?;

        tracing::info!(hash = %outcome.hash, source = %source_rel, model, set = set_name, "put");
        Ok(outcome)
    }

    /// Fetch an object's payload and metadata by full or partial hash.
    pub fn get(&self, hash_or_prefix: &str) -> Result<(Vec<u8>, ObjectMeta)> {
        let hash = object_store::resolve_prefix(&self.layout, hash_or_prefix)?;
        object_store::get_object(&self.layout, &hash)
    }

    pub fn resolve(
        &self,
        set_name: &str,
        source: &str,
        prefix: &str,
        model: Option<&str>,
    ) -> Result<String> {
        head::resolve_partial(&self.layout, set_name, source, prefix, model)
    }

    pub fn rollback(
        &self,
        set_name: &str,
        source: &str,
        prefix: &str,
        model: Option<&str>,
    ) -> Result<RollbackOutcome> {
        head::rollback(&self.layout, set_name, source, prefix, model)
    }

    /// Drop `source`'s index line(s) for `set`, optionally scoped to one
    /// `model`. The log is append-only and is never touched (P3); `HEAD`
    /// keeps the model's last-known hash even after its last path is
    /// removed (spec §4.3 state machine).
    pub fn rm(&self, set_name: &str, source: &str, model: Option<&str>) -> Result<usize> {
        match model {
            None => set::remove_index_entries_for_path(&self.layout, set_name, source),
            Some(m) => {
                let entries = set::read_index(&self.layout, set_name)?;
                let mut removed = 0;
                for e in entries {
                    if e.path != source {
                        continue;
                    }
                    let entry_model = ObjectMeta::read(&self.layout.object_meta(&e.hash))
                        .map(|meta| meta.model)
                        .unwrap_or_else(|_| "unknown".to_string());
                    if entry_model == m {
                        removed += set::remove_index_entries_by_hash(&self.layout, set_name, &e.hash)?;
                    }
                }
                Ok(removed)
            }
        }
    }

    pub fn gc(&self, expire: &str, aggressive: bool, dry_run: bool) -> Result<GcOutcome> {
        gc::gc(&self.layout, expire, aggressive, dry_run)
    }

    pub fn remotes(&self) -> Result<Vec<String>> {
        config::list_remotes(&self.layout)
    }

    pub fn add_remote(&self, remote: &RemoteConfig) -> Result<()> {
        config::save_remote(&self.layout, remote)
    }

    pub fn remove_remote(&self, name: &str) -> Result<()> {
        config::remove_remote(&self.layout, name)
    }

    fn load_remote(&self, name: &str) -> Result<RemoteConfig> {
        config::load_remote(&self.layout, name)?
            .ok_or_else(|| EmbrError::NotFound(format!("remote {name:?}")))
    }

    /// Push `source`'s current object (by hash) to `remote_name` at
    /// `remote_path`.
    pub fn push(&mut self, remote_name: &str, remote_path: &str, object_hash: &str) -> Result<()> {
        let remote = self.load_remote(remote_name)?;
        let (payload, _meta) = object_store::get_object(&self.layout, object_hash)?;
        remote_ops::push(
            &self.layout,
            &remote,
            &self.registry,
            &mut self.tracker,
            remote_path,
            &payload,
            Some(object_hash),
        )?;
        self.tracker.save(&self.layout)
    }

    pub fn pull(&self, remote_name: &str, remote_path: &str) -> Result<Vec<u8>> {
        let remote = self.load_remote(remote_name)?;
        remote_ops::pull(&remote, remote_path)
    }

    pub fn prune(&self, remote_name: &str, older_than_secs: u64, dry_run: bool) -> Result<(u64, u64)> {
        let remote = self.load_remote(remote_name)?;
        remote_ops::prune(&remote, older_than_secs, dry_run)
    }
}

fn journal_recover(layout: &Layout) -> Result<bool> {
    crate::journal::recover(layout)
}

/// Timestamp helper re-exported for callers building their own `.meta`
/// sidecars outside of `Repo::put` (e.g. transformer round-trips).
pub fn current_timestamp() -> String {
    now_iso8601()
}

//! Path layout for the `.embr/` repository directory (see SPEC_FULL §6).

use std::path::{Path, PathBuf};

pub const EMBR_DIR: &str = ".embr";

#[derive(Debug, Clone)]
pub struct Layout {
    pub root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn embr_dir(&self) -> PathBuf {
        self.root.join(EMBR_DIR)
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.embr_dir().join("objects")
    }

    pub fn object_raw(&self, hash: &str) -> PathBuf {
        self.objects_dir().join(format!("{hash}.raw"))
    }

    pub fn object_meta(&self, hash: &str) -> PathBuf {
        self.objects_dir().join(format!("{hash}.meta"))
    }

    pub fn sets_dir(&self) -> PathBuf {
        self.embr_dir().join("sets")
    }

    pub fn set_dir(&self, set: &str) -> PathBuf {
        self.sets_dir().join(set)
    }

    pub fn set_index(&self, set: &str) -> PathBuf {
        self.set_dir(set).join("index")
    }

    pub fn set_log(&self, set: &str) -> PathBuf {
        self.set_dir(set).join("log")
    }

    pub fn model_refs_dir(&self, set: &str) -> PathBuf {
        self.set_dir(set).join("refs").join("models")
    }

    pub fn model_ref(&self, set: &str, model: &str) -> PathBuf {
        self.model_refs_dir(set).join(model)
    }

    pub fn head(&self) -> PathBuf {
        self.embr_dir().join("HEAD")
    }

    pub fn config(&self) -> PathBuf {
        self.embr_dir().join("config")
    }

    pub fn config_local(&self) -> PathBuf {
        self.embr_dir().join("config.local")
    }

    pub fn remote_lock(&self) -> PathBuf {
        self.embr_dir().join("REMOTE_LOCK")
    }

    pub fn gc_lock(&self) -> PathBuf {
        self.embr_dir().join("GC_LOCK")
    }

    pub fn remote_journal(&self) -> PathBuf {
        self.embr_dir().join("REMOTE_JOURNAL")
    }

    pub fn remote_temp(&self) -> PathBuf {
        self.embr_dir().join("REMOTE_TEMP")
    }

    pub fn remote_head(&self) -> PathBuf {
        self.embr_dir().join("REMOTE_HEAD")
    }

    pub fn operations_state(&self) -> PathBuf {
        self.embr_dir().join("operations.state")
    }

    pub fn ensure_set_dirs(&self, set: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(self.set_dir(set))?;
        std::fs::create_dir_all(self.model_refs_dir(set))?;
        Ok(())
    }

    pub fn ensure_skeleton(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.objects_dir())?;
        std::fs::create_dir_all(self.sets_dir())?;
        Ok(())
    }
}

/// Write `contents` to `path` via a sibling `.tmp` file and an atomic rename
/// (write-temp-and-rename, used throughout for the index/HEAD/journal/refs).
pub fn atomic_write(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension(tmp_extension(path));
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn tmp_extension(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{ext}.tmp"),
        None => "tmp".to_string(),
    }
}

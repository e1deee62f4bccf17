//! Output writers.
//!
//! Every output is a JSON document addressed by a slash-separated path
//! such as `regulation/1005/2011-31725` or `layer/terms/1005/2011-31725`.

use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;
use tracing::debug;

use crate::StoreError;

#[async_trait::async_trait]
pub trait Writer: Send + Sync {
    async fn write(&self, path: &str, value: &Value) -> Result<(), StoreError>;
}

/// Writes each document to `root/{path}`, replacing any earlier copy
/// atomically.
#[derive(Debug, Clone)]
pub struct FsWriter {
    root: PathBuf,
}

impl FsWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an output path under the root, refusing anything that would
    /// escape it.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(path.trim_start_matches('/'));
        if path.trim().is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// Read back a document written earlier.
    pub fn read(&self, path: &str) -> Result<Value, StoreError> {
        let full = self.resolve(path)?;
        if !full.exists() {
            return Err(StoreError::NotFound(full));
        }
        let raw = std::fs::read_to_string(&full).map_err(|e| StoreError::io(&full, e))?;
        Ok(serde_json::from_str(&raw)?)
    }
}

fn write_atomic(target: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = target
        .parent()
        .ok_or_else(|| StoreError::InvalidPath(target.display().to_string()))?;
    std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    tmp.write_all(bytes).map_err(|e| StoreError::io(tmp.path(), e))?;
    tmp.persist(target)
        .map_err(|e| StoreError::io(target, e.error))?;
    Ok(())
}

#[async_trait::async_trait]
impl Writer for FsWriter {
    async fn write(&self, path: &str, value: &Value) -> Result<(), StoreError> {
        let target = self.resolve(path)?;
        let bytes = serde_json::to_vec_pretty(value)?;
        debug!(path = %target.display(), bytes = bytes.len(), "writing");
        tokio::task::spawn_blocking(move || write_atomic(&target, &bytes)).await?
    }
}

/// Keeps documents in memory; used for dry runs.
#[derive(Debug, Default)]
pub struct MemoryWriter {
    documents: Mutex<BTreeMap<String, Value>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        self.documents.lock().ok()?.get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.documents
            .lock()
            .map(|docs| docs.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Writer for MemoryWriter {
    async fn write(&self, path: &str, value: &Value) -> Result<(), StoreError> {
        let mut docs = self
            .documents
            .lock()
            .map_err(|e| StoreError::Backend(format!("mutex poisoned: {e}").into()))?;
        docs.insert(path.to_string(), value.clone());
        Ok(())
    }
}

//! Stage checkpoints.
//!
//! Each stage of a build is stored as `{counter:03}-{tag}.json` in the
//! checkpoint directory, where the counter is the stage's position in the
//! run. A re-run with the same stages in the same order reads the stored
//! values back instead of recomputing them. Unreadable entries are
//! recomputed; nothing is stored for a stage that fails. Reads and writes
//! go through `tokio::fs` so a build never blocks its runtime on disk.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointKey {
    path: Option<PathBuf>,
    force: bool,
}

impl CheckpointKey {
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Checkpoint store for one build. Without a directory every stage is
/// simply computed.
#[derive(Debug, Default)]
pub struct Checkpointer {
    dir: Option<PathBuf>,
    counter: u32,
}

impl Checkpointer {
    pub fn new(dir: Option<PathBuf>) -> Result<Self, StoreError> {
        if let Some(dir) = &dir {
            fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
        }
        Ok(Self { dir, counter: 0 })
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    /// Claim the next stage slot. `force` skips any stored value.
    pub fn next(&mut self, tag: &str) -> CheckpointKey {
        self.next_with(tag, false)
    }

    pub fn next_with(&mut self, tag: &str, force: bool) -> CheckpointKey {
        self.counter += 1;
        let file = format!("{:03}-{}.json", self.counter, sanitize(tag));
        CheckpointKey {
            path: self.dir.as_ref().map(|d| d.join(file)),
            force,
        }
    }

    /// The stored value for `key`, if there is a readable one.
    pub async fn load<T: DeserializeOwned>(&self, key: &CheckpointKey) -> Option<T> {
        let path = key.path.as_deref()?;
        if key.force {
            debug!(path = %path.display(), "checkpoint forced");
            return None;
        }
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable checkpoint, recomputing");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(path = %path.display(), "checkpoint hit");
                Some(value)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt checkpoint, recomputing");
                None
            }
        }
    }

    pub async fn save<T: Serialize>(
        &self,
        key: &CheckpointKey,
        value: &T,
    ) -> Result<(), StoreError> {
        let Some(path) = key.path.as_deref() else {
            return Ok(());
        };
        let json = serde_json::to_string(value)?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| StoreError::io(path, e))
    }

    /// Load the next stage or compute and store it.
    pub async fn checkpoint<T, E>(
        &mut self,
        tag: &str,
        force: bool,
        compute: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<StoreError>,
    {
        let key = self.next_with(tag, force);
        if let Some(value) = self.load(&key).await {
            return Ok(value);
        }
        let value = compute()?;
        self.save(&key, &value).await?;
        Ok(value)
    }
}

fn sanitize(tag: &str) -> String {
    tag.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

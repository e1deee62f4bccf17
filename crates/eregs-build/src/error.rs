use std::path::PathBuf;

use eregs_amend::AmendError;
use eregs_core::CoreError;
use eregs_parse::ParseError;
use eregs_store::StoreError;
use eregs_sync::SyncError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),

    #[error("amendments failed: {0}")]
    Amend(#[from] AmendError),

    #[error("storage failed: {0}")]
    Store(#[from] StoreError),

    #[error("fetch failed: {0}")]
    Sync(#[from] SyncError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("registry {path}: {source}")]
    Registry {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("notice {0} was not found among the part's final rules")]
    MissingNotice(String),

    #[error("regulation has no part label")]
    NoPart,
}

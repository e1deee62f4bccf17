use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("label has no part: {0}")]
    EmptyLabel(String),

    #[error("invalid node JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("settings file not readable: {path}: {source}")]
    Settings {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

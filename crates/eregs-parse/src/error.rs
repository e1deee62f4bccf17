use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unexpected text at offset {offset}: {message}")]
    Landmark { offset: usize, message: String },

    #[error("malformed XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("missing <{0}> element")]
    MissingElement(String),

    #[error("unrecognised date: {0}")]
    Date(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ParseError {
    pub(crate) fn landmark(offset: usize, message: impl Into<String>) -> Self {
        ParseError::Landmark {
            offset,
            message: message.into(),
        }
    }
}

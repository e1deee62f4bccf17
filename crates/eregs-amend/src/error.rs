use eregs_parse::ParseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AmendError {
    #[error("notice content: {0}")]
    Parse(#[from] ParseError),
}

use std::error::Error as StdError;

use thiserror::Error;

/// Chapterseek's crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Chapterseek's crate-wide error type.
///
/// This is intentionally decoupled from `anyhow` so downstream libraries aren't forced to
/// adopt `anyhow` in their own public APIs.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    /// The chapter source produced nothing searchable.
    #[error("no chapters to search")]
    NoChapters,

    #[error("invalid search options: {0}")]
    InvalidOpts(String),

    #[error("invalid search window [{start:.3}s, {end:.3}s)")]
    InvalidWindow { start: f64, end: f64 },

    /// A confirmed boundary did not come strictly after the previous one.
    #[error("confirmed timestamp {confirmed:.3}s is not after previous boundary {previous:.3}s")]
    OrderingViolation { previous: f64, confirmed: f64 },

    #[error(transparent)]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

impl Error {
    pub(crate) fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Message(format!("{err:#}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

//! Error taxonomy for the feedback loop
//!
//! Only two failure kinds ever reach a caller: the record store could not
//! be reached, or the language model call failed. Rating extraction has
//! its own error type because its failures are absorbed by the adaptive
//! session instead of being propagated.

use thiserror::Error;

/// Caller-visible failures
#[derive(Debug, Error)]
pub enum Error {
    /// Durable write or query against the record store failed
    #[error("feedback storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The completion call failed or returned an unusable body
    #[error("model invocation failed: {0}")]
    ModelInvocation(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn storage(msg: impl std::fmt::Display) -> Self {
        Error::StorageUnavailable(msg.to_string())
    }

    pub fn model(msg: impl std::fmt::Display) -> Self {
        Error::ModelInvocation(msg.to_string())
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, Error::StorageUnavailable(_))
    }

    pub fn is_model(&self) -> bool {
        matches!(self, Error::ModelInvocation(_))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::StorageUnavailable(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::ModelInvocation(err.to_string())
    }
}

/// Why a best-effort rating extraction produced nothing usable
#[derive(Debug, Error)]
pub enum ExtractionFailure {
    #[error("extraction call failed: {0}")]
    Model(#[source] Error),

    #[error("extraction output was not valid feedback JSON: {0}")]
    Unparsable(String),

    #[error("extracted rating {0} is outside 1..=5")]
    RatingOutOfRange(i64),
}

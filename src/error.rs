//! Error types for entry operations.

use crate::model::ValidationError;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    /// A field failed its constraint before anything touched the store.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Nothing matched. An expected outcome, not a defect.
    #[error("{0}")]
    NotFound(String),

    /// The entry addressed by id is owned by another vmname.
    #[error("entry {id} found but vmname {actual:?} does not match {expected:?}")]
    IdentityMismatch {
        id: i64,
        expected: String,
        actual: String,
    },

    /// Connectivity or query failure in the store.
    #[error("store failure: {0}")]
    Store(#[source] BoxError),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn not_found<S: Into<String>>(detail: S) -> Error {
        Error::NotFound(detail.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<postgres::Error> for Error {
    fn from(err: postgres::Error) -> Self {
        Error::Store(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_failures_are_not_not_found() {
        let err = Error::Store("connection reset".into());
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "store failure: connection reset");
    }

    #[test]
    fn validation_errors_convert() {
        let err: Error = ValidationError::Action {
            value: "Allow".to_string(),
        }
        .into();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(err.to_string(), "action \"Allow\" must be one of: [allow, reject]");
    }

    #[test]
    fn mismatch_message_names_both_vmnames() {
        let err = Error::IdentityMismatch {
            id: 4,
            expected: "web01".to_string(),
            actual: "db02".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "entry 4 found but vmname \"db02\" does not match \"web01\""
        );
    }
}

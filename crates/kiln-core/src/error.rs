//! Error types for kiln.

use thiserror::Error;

use crate::retry::Retryable;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("invalid build spec: {0}")]
    InvalidSpec(String),

    #[error("write conflict: {0}")]
    WriteConflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl Error {
    /// Stable numeric code reported to API clients.
    pub fn code(&self) -> u32 {
        match self {
            Error::NotFound(_) => 1001,
            Error::Conflict(_) => 1002,
            Error::PreconditionFailed(_) => 1003,
            Error::InvalidSpec(_) => 1004,
            Error::WriteConflict(_) => 1005,
            Error::InvalidInput(_) => 1006,
            Error::ExecutionFailed(_) => 1007,
            Error::Unexpected(_) => 1999,
        }
    }

    pub fn missing_spec_key(key: &str) -> Self {
        Error::InvalidSpec(format!("missing build-spec key '{}'", key))
    }
}

impl Retryable for Error {
    fn is_write_conflict(&self) -> bool {
        matches!(self, Error::WriteConflict(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            Error::NotFound(String::new()),
            Error::Conflict(String::new()),
            Error::PreconditionFailed(String::new()),
            Error::InvalidSpec(String::new()),
            Error::WriteConflict(String::new()),
            Error::InvalidInput(String::new()),
            Error::ExecutionFailed(String::new()),
            Error::Unexpected(String::new()),
        ];
        let mut codes: Vec<u32> = errors.iter().map(Error::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_missing_spec_key_names_the_key() {
        let err = Error::missing_spec_key("osType");
        assert!(err.to_string().contains("osType"));
        assert_eq!(err.code(), 1004);
    }
}

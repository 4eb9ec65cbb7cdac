//! Common error types for the reconciliation service

use thiserror::Error;

/// Common result type for reconciliation operations
pub type Result<T> = std::result::Result<T, Error>;

/// SQLite result codes that mean another connection holds the lock
/// (SQLITE_BUSY, SQLITE_LOCKED and their extended variants).
const SQLITE_CONTENTION_CODES: &[&str] = &["5", "6", "261", "262", "517"];

/// Common error types across the workspace
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    ///
    /// Lock contention is never stored here; see the `From<sqlx::Error>` impl.
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed caller input
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Lock wait expired or a concurrent writer held the identity; retryable
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Stored link structure is corrupt (multi-hop chain, dangling link,
    /// value shared by two groups)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        if is_lock_contention(&err) {
            Error::Conflict(format!("identity is locked by a concurrent request ({})", err))
        } else {
            Error::Database(err)
        }
    }
}

/// Whether a sqlx error reports lock contention rather than an I/O failure
pub fn is_lock_contention(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db_err) => {
            let by_code = db_err
                .code()
                .map(|code| SQLITE_CONTENTION_CODES.iter().any(|c| code == *c))
                .unwrap_or(false);
            by_code || db_err.message().contains("database is locked")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_becomes_conflict() {
        let err: Error = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, Error::Conflict(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_other_sqlx_errors_stay_database() {
        let err: Error = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, Error::Database(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_invariant_violation_not_retryable() {
        let err = Error::InvariantViolation("chain".to_string());
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "Invariant violation: chain");
    }
}

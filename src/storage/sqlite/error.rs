//! Classification of `SQLite` failures.
//!
//! Retry and recovery decisions are made on [`rusqlite::ErrorCode`] values,
//! never on message text.

use crate::Error;
use rusqlite::ErrorCode;

/// Failure classes the repository reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The database image is unreadable; recreate it.
    Corruption,
    /// May succeed on a fresh connection.
    Transient,
    /// Anything else.
    Fatal,
}

/// Classifies a `SQLite` result code.
#[must_use]
pub const fn classify_code(code: ErrorCode) -> FailureClass {
    match code {
        ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase => FailureClass::Corruption,
        ErrorCode::DatabaseBusy
        | ErrorCode::DatabaseLocked
        | ErrorCode::SystemIoFailure
        | ErrorCode::CannotOpen
        | ErrorCode::SchemaChanged
        // SQLITE_ERROR: failed prepare, typically against a half-open handle
        | ErrorCode::Unknown => FailureClass::Transient,
        _ => FailureClass::Fatal,
    }
}

/// Classifies a `rusqlite` error.
#[must_use]
pub fn classify(err: &rusqlite::Error) -> FailureClass {
    match err {
        rusqlite::Error::SqliteFailure(inner, _) => classify_code(inner.code),
        rusqlite::Error::InvalidPath(_) => FailureClass::Transient,
        _ => FailureClass::Fatal,
    }
}

/// Converts a `rusqlite` error into the crate error for `operation`.
pub fn storage_error(operation: &str, err: &rusqlite::Error) -> Error {
    let cause = err.to_string();
    match classify(err) {
        FailureClass::Corruption => Error::Corruption {
            operation: operation.to_string(),
            cause,
        },
        FailureClass::Transient => Error::Transient {
            operation: operation.to_string(),
            cause,
        },
        FailureClass::Fatal => Error::OperationFailed {
            operation: operation.to_string(),
            cause,
        },
    }
}

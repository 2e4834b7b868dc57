//! Error types for the storage layer

use thiserror::Error;

/// Errors raised by resource and campaign stores
#[derive(Error, Debug)]
pub enum StorageError {
    /// SQLite failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored row could not be decoded
    #[error("Corrupt {table} row '{id}': {reason}")]
    Corrupt {
        table: &'static str,
        id: String,
        reason: String,
    },

    /// A writer panicked while holding the store lock
    #[error("Store lock poisoned: {0}")]
    LockPoisoned(String),

    /// Update targeted a row that does not exist
    #[error("{table} row not found: {id}")]
    RowNotFound { table: &'static str, id: String },

    /// Filesystem error while opening the store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn lock_poisoned(what: impl Into<String>) -> Self {
        Self::LockPoisoned(what.into())
    }

    pub fn corrupt(table: &'static str, id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            table,
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn row_not_found(table: &'static str, id: impl Into<String>) -> Self {
        Self::RowNotFound {
            table,
            id: id.into(),
        }
    }

    /// Busy / locked databases and filesystem hiccups are worth retrying
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Database(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            Self::Io(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_message() {
        let err = StorageError::corrupt("campaigns", "c-1", "bad assignments json");
        let msg = err.to_string();
        assert!(msg.contains("campaigns"));
        assert!(msg.contains("c-1"));
    }

    #[test]
    fn test_busy_database_is_recoverable() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(StorageError::Database(busy).is_recoverable());
        assert!(!StorageError::lock_poisoned("resources").is_recoverable());
    }
}

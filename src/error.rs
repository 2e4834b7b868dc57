//! Unified error handling for the slotbook crate
//!
//! Domain errors live next to the code that raises them and are wrapped by
//! the crate-wide [`Error`] enum:
//!
//! - [`ProbeError`] - a single resource probe failed (never reaches callers of
//!   the allocator; the health monitor turns it into an `error` status)
//! - [`StorageError`] - the campaign or resource store could not be read or
//!   written
//! - [`CampaignError`] - a lifecycle operation was not valid for the
//!   campaign's current state
//!
//! Invalid settings are reported as [`Error::Config`].
//!
//! Running short of resources is not an error: the allocator pads with
//! placeholder assignments instead.
//!
//! # Usage
//!
//! ```rust,ignore
//! use slotbook::error::{Error, ErrorCategory, SlotbookErrorTrait};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         tracing::warn!(category = ?err.category(), "retrying: {err}");
//!     } else {
//!         tracing::error!("fatal: {err}");
//!     }
//! }
//! ```

use thiserror::Error;

pub use crate::campaign::error::CampaignError;
pub use crate::health::error::ProbeError;
pub use crate::storage::error::StorageError;

/// Common trait for all slotbook error types
pub trait SlotbookErrorTrait: std::error::Error {
    /// Check if this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// External probe / HTTP failures
    Network,
    /// Store and I/O failures
    Storage,
    /// Invalid lifecycle operations
    Campaign,
    /// Configuration and validation errors
    Config,
    /// Serialization errors
    Parsing,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Storage => "storage",
            Self::Campaign => "campaign",
            Self::Config => "config",
            Self::Parsing => "parsing",
        }
    }
}

/// Unified error type for the slotbook crate
#[derive(Error, Debug)]
pub enum Error {
    /// Resource or campaign store failures
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Probe failures surfaced outside the health monitor
    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    /// Campaign lifecycle errors
    #[error("Campaign error: {0}")]
    Campaign(#[from] CampaignError),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),
}

impl SlotbookErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_recoverable(),
            Self::Probe(e) => e.is_recoverable(),
            Self::Campaign(e) => e.is_recoverable(),
            Self::Json(_) => false,
            Self::Config(_) => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Storage(_) => ErrorCategory::Storage,
            Self::Probe(_) => ErrorCategory::Network,
            Self::Campaign(CampaignError::UnknownPackage { .. }) => ErrorCategory::Config,
            Self::Campaign(_) => ErrorCategory::Campaign,
            Self::Json(_) => ErrorCategory::Parsing,
            Self::Config(_) => ErrorCategory::Config,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Database(err))
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

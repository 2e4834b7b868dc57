//! Error types for resource probing

use thiserror::Error;

/// Errors that can occur while probing a single resource
#[derive(Error, Debug)]
pub enum ProbeError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Probe did not finish in time
    #[error("Probe timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Upstream answered with an unexpected status
    #[error("Unexpected status: {0}")]
    UnexpectedStatus(u16),

    /// Upstream payload could not be interpreted
    #[error("Invalid probe response: {0}")]
    InvalidResponse(String),

    /// Resource reference could not be turned into a playlist id
    #[error("Invalid resource reference: {0}")]
    InvalidReference(String),
}

impl ProbeError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout { .. })
            || matches!(self, Self::UnexpectedStatus(code) if *code == 429 || *code >= 500)
    }
}

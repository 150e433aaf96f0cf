use shared::error::SnapshotError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Transport failure or timeout.
    #[error("network error: {0}")]
    Network(String),
    /// The authority answered with an explicit not-ok body.
    #[error("rejected by server: {0}")]
    ServerRejected(String),
    /// A read superseded by a newer one.
    #[error("request cancelled")]
    Cancelled,
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl SyncError {
    /// Transient faults are worth another attempt; logical outcomes are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Network(_) | SyncError::Malformed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SyncError::Malformed(err.to_string())
        } else {
            SyncError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Malformed(err.to_string())
    }
}

impl From<SnapshotError> for SyncError {
    fn from(err: SnapshotError) -> Self {
        SyncError::Malformed(err.to_string())
    }
}

impl From<futures::future::Aborted> for SyncError {
    fn from(_: futures::future::Aborted) -> Self {
        SyncError::Cancelled
    }
}

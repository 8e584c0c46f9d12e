use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortError {
    #[error("not found")]
    NotFound,
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("version conflict: expected {expected}, found {found}")]
    VersionConflict { expected: u64, found: u64 },
}

impl PortError {
    /// Failures that may succeed when the same call is repeated.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Unavailable(_))
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification channel unavailable")]
    ChannelUnavailable,
}

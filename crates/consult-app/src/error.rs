use std::future::Future;
use std::time::Duration;

use consult_core::error::{DomainError, DomainErrorKind};
use consult_ports::error::PortError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("port error: {0}")]
    Port(#[from] PortError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("{0} timed out after {1:?}")]
    Timeout(&'static str, Duration),
}

/// Caller-facing classification of an [`AppError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Conflict,
    NotFound,
    Transient,
    Internal,
}

impl AppError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Domain(e) => match e.kind() {
                DomainErrorKind::Validation => ErrorCategory::Validation,
                DomainErrorKind::Conflict => ErrorCategory::Conflict,
            },
            Self::Port(PortError::NotFound) | Self::NotFound(_) => ErrorCategory::NotFound,
            Self::Port(PortError::VersionConflict { .. }) => ErrorCategory::Conflict,
            Self::Port(e) if e.is_transient() => ErrorCategory::Transient,
            Self::Port(_) => ErrorCategory::Internal,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Timeout(..) => ErrorCategory::Transient,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }

    /// The consult changed underneath us; re-reading it may succeed.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Port(PortError::VersionConflict { .. }))
    }
}

/// Awaits a port call for at most `limit`.
pub(crate) async fn bounded<T, F>(what: &'static str, limit: Duration, call: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, PortError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(AppError::from),
        Err(_) => Err(AppError::Timeout(what, limit)),
    }
}

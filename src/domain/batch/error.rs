use crate::domain::profile::ProfileError;
use crate::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum BatchServiceError {
    #[error("invalid input: {0}")]
    Invalid(String),
    /// The active profile cannot run a batch yet
    #[error("{0}")]
    NotConfigured(String),
    #[error("a batch is already running")]
    Conflict,
    #[error("no batch is running")]
    NotRunning,
    #[error("no batch has been started")]
    NotFound,
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error("dependency error: {0}")]
    Dependency(String),
}

impl From<BatchServiceError> for AppError {
    fn from(err: BatchServiceError) -> Self {
        match err {
            BatchServiceError::Invalid(msg) => AppError::BadRequest(msg),
            BatchServiceError::NotConfigured(msg) => AppError::PreconditionFailed(msg),
            BatchServiceError::Conflict => {
                AppError::Conflict("A batch is already running".to_string())
            }
            BatchServiceError::NotRunning => AppError::NotFound("No batch is running".to_string()),
            BatchServiceError::NotFound => {
                AppError::NotFound("No batch has been started".to_string())
            }
            BatchServiceError::Profile(e) => e.into(),
            BatchServiceError::Dependency(msg) => AppError::Internal(msg),
        }
    }
}

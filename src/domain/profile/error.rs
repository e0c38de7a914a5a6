use crate::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("configuration contains no profiles")]
    NoProfiles,
    #[error("profile not found: {0}")]
    UnknownProfile(String),
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed configuration: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl From<ProfileError> for AppError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::NoProfiles | ProfileError::UnknownProfile(_) => {
                AppError::PreconditionFailed(err.to_string())
            }
            ProfileError::Io(_) | ProfileError::Malformed(_) => AppError::Internal(err.to_string()),
        }
    }
}

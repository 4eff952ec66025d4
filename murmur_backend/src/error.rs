use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

/// Failure taxonomy shared by every service. Handlers translate these into
/// HTTP status codes; anything that is not a caller mistake or an upstream
/// refusal collapses into `Internal`.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("upstream service error ({status}): {message}")]
    Upstream { status: u16, message: String },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    /// Recovers a typed error that travelled through an `anyhow` boundary,
    /// e.g. out of a repository closure. Anything else is internal.
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        match err.downcast::<CoreError>() {
            Ok(core) => core,
            Err(other) => CoreError::Internal(other),
        }
    }
}

use thiserror::Error;

use crate::application::repos::StoreError;

/// Error kinds surfaced by the engine. The engine does not log, retry or
/// translate these; the presentation layer maps them to transport statuses
/// (404/403/503/400).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no category or virtual list matches `{slug}`")]
    NotFound { slug: String },
    #[error("`{slug}` requires an authenticated viewer")]
    PermissionDenied { slug: String },
    #[error("storage read failed")]
    Unavailable(#[source] StoreError),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl EngineError {
    pub fn not_found(slug: impl Into<String>) -> Self {
        Self::NotFound { slug: slug.into() }
    }

    pub fn permission_denied(slug: impl Into<String>) -> Self {
        Self::PermissionDenied { slug: slug.into() }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

impl From<StoreError> for EngineError {
    fn from(error: StoreError) -> Self {
        Self::Unavailable(error)
    }
}

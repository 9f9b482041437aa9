use thiserror::Error;

use super::resolver::ResolveError;
use crate::database::StoreError;
use crate::model::ModelError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    UnresolvableReference(String),

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        ServiceError::PermissionDenied(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }
}

impl From<ModelError> for ServiceError {
    fn from(err: ModelError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

impl From<ResolveError> for ServiceError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::DuplicatePlaceholder(_) => ServiceError::Validation(err.to_string()),
            ResolveError::UnresolvableReference { .. } => ServiceError::UnresolvableReference(err.to_string()),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

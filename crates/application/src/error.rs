use domain::{DomainError, RepositoryError};
use thiserror::Error;

/// 实时连接与 HTTP 请求共用的身份校验错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing credential")]
    Unauthenticated,
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
}

impl AuthError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        AuthError::InvalidCredential(reason.into())
    }
}

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
}

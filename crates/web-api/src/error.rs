use application::{ApplicationError, AuthError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::{DomainError, RepositoryError};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.body.code
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        let message = error.to_string();
        let (status, code) = match error {
            DomainError::UnknownParticipant(_) => (StatusCode::NOT_FOUND, "UNKNOWN_PARTICIPANT"),
            DomainError::UnknownItem(_) => (StatusCode::NOT_FOUND, "UNKNOWN_ITEM"),
            DomainError::MessageNotFound(_) => (StatusCode::NOT_FOUND, "MESSAGE_NOT_FOUND"),
            DomainError::SelfMessage => (StatusCode::BAD_REQUEST, "SELF_MESSAGE"),
            DomainError::EmptyContent => (StatusCode::BAD_REQUEST, "EMPTY_CONTENT"),
            DomainError::ContentTooLong { .. } => (StatusCode::BAD_REQUEST, "CONTENT_TOO_LONG"),
            DomainError::ForbiddenThread(_) => (StatusCode::FORBIDDEN, "FORBIDDEN_THREAD"),
            DomainError::NotReceiver => (StatusCode::FORBIDDEN, "NOT_RECEIVER"),
            DomainError::InvalidTransition { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INVALID_STATE")
            }
        };
        ApiError::new(status, code, message)
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Unauthenticated => ApiError::new(
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                "missing credential",
            ),
            AuthError::InvalidCredential(reason) => ApiError::new(
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIAL",
                format!("invalid credential: {reason}"),
            ),
        }
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        match error {
            ApplicationError::Domain(err) => err.into(),
            ApplicationError::Auth(err) => err.into(),
            ApplicationError::Repository(repo_err) => match repo_err {
                RepositoryError::NotFound => ApiError::new(
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    "requested resource not found",
                ),
                RepositoryError::Conflict => {
                    ApiError::new(StatusCode::CONFLICT, "CONFLICT", "resource already exists")
                }
                RepositoryError::Storage { message } => {
                    tracing::error!(error = %message, "存储操作失败");
                    ApiError::new(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "STORAGE_ERROR",
                        "storage unavailable",
                    )
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{ItemId, ThreadId, UserId};

    fn status_of(error: ApplicationError) -> StatusCode {
        ApiError::from(error).status()
    }

    #[test]
    fn domain_errors_map_to_client_statuses() {
        assert_eq!(
            status_of(DomainError::UnknownParticipant(UserId::new(1)).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(DomainError::UnknownItem(ItemId::new(1)).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status_of(DomainError::SelfMessage.into()), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(DomainError::ContentTooLong { len: 3, max: 2 }.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(DomainError::ForbiddenThread(ThreadId::allocate()).into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(status_of(DomainError::NotReceiver.into()), StatusCode::FORBIDDEN);
    }

    #[test]
    fn auth_and_storage_errors() {
        assert_eq!(
            status_of(AuthError::Unauthenticated.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(AuthError::invalid("expired").into()),
            StatusCode::UNAUTHORIZED
        );

        let storage = ApiError::from(ApplicationError::from(RepositoryError::storage(
            "connection reset",
        )));
        assert_eq!(storage.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(storage.code(), "STORAGE_ERROR");
    }
}

use application::ApplicationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
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

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        use application::ApplicationError as AppErr;
        use domain::{DomainError, RepositoryError};

        match error {
            AppErr::Domain(DomainError::InvalidArgument { field, reason }) => ApiError::new(
                StatusCode::BAD_REQUEST,
                "INVALID_ARGUMENT",
                format!("{}: {}", field, reason),
            ),
            AppErr::Domain(DomainError::PollNotFound) => {
                ApiError::new(StatusCode::NOT_FOUND, "POLL_NOT_FOUND", "Poll not found")
            }
            AppErr::Domain(DomainError::EmailAlreadyRegistered) => ApiError::new(
                StatusCode::BAD_REQUEST,
                "EMAIL_IN_USE",
                "Email already in use",
            ),
            AppErr::Domain(DomainError::InvalidCredentials) => ApiError::new(
                StatusCode::BAD_REQUEST,
                "INVALID_CREDENTIALS",
                "Invalid credentials",
            ),
            AppErr::Repository(repo_err) => match repo_err {
                RepositoryError::NotFound => ApiError::new(
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    "requested resource not found",
                ),
                RepositoryError::Conflict(_) => {
                    ApiError::new(StatusCode::CONFLICT, "CONFLICT", "resource already exists")
                }
                // 重试预算耗尽的瞬时故障：客户端稍后重试可能成功
                RepositoryError::Transient(message) => {
                    tracing::error!(error = %message, "存储瞬时故障，重试预算已耗尽");
                    ApiError::new(
                        StatusCode::SERVICE_UNAVAILABLE,
                        "STORAGE_UNAVAILABLE",
                        "storage temporarily unavailable",
                    )
                }
                RepositoryError::Storage(message) => {
                    tracing::error!(error = %message, "存储错误");
                    ApiError::new(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "DATABASE_ERROR",
                        "internal storage error",
                    )
                }
            },
            AppErr::Password(err) => {
                tracing::error!(error = %err, "密码哈希失败");
                ApiError::internal_server_error("internal error")
            }
            AppErr::Broadcast(err) => {
                tracing::error!(error = %err, "快照推送失败");
                ApiError::internal_server_error("internal error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use branch_core::BranchError;
use branch_service::ServiceError;
use serde::Serialize;
use thiserror::Error;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

const BRANCH_UNAVAILABLE: &str = "branch no longer available, refresh history";

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("missing X-User-Id header")]
    MissingUser,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct JsonError {
    message: String,
    r#type: String,
}

#[derive(Serialize)]
struct JsonErrorWrapper {
    error: JsonError,
}

impl AppError {
    fn error_type(&self) -> &'static str {
        match self {
            AppError::Service(ServiceError::Branch(BranchError::NodeNotFound(_))) => {
                "branch_unavailable"
            }
            AppError::Service(ServiceError::Branch(_)) => "integrity_error",
            AppError::Service(ServiceError::Store(_)) => "storage_error",
            AppError::Service(ServiceError::ConversationNotFound(_)) => "not_found",
            AppError::Service(ServiceError::Forbidden { .. }) => "forbidden",
            AppError::Service(ServiceError::InvalidRequest(_)) | AppError::BadRequest(_) => {
                "invalid_request"
            }
            AppError::MissingUser => "unauthorized",
            AppError::Internal(_) => "api_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Service(ServiceError::Branch(BranchError::NodeNotFound(_))) => {
                BRANCH_UNAVAILABLE.to_string()
            }
            other => other.to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Service(ServiceError::Branch(BranchError::NodeNotFound(_))) => {
                StatusCode::NOT_FOUND
            }
            AppError::Service(ServiceError::ConversationNotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Service(ServiceError::Forbidden { .. }) => StatusCode::FORBIDDEN,
            AppError::Service(ServiceError::InvalidRequest(_)) | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::MissingUser => StatusCode::UNAUTHORIZED,
            AppError::Service(ServiceError::Branch(_))
            | AppError::Service(ServiceError::Store(_))
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, status = status_code.as_u16(), "request rejected");
        }

        let error_response = JsonErrorWrapper {
            error: JsonError {
                message: self.client_message(),
                r#type: self.error_type().to_string(),
            },
        };
        HttpResponse::build(status_code).json(error_response)
    }
}

use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::backend::ServiceError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("{0}")]
    Invalid(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0} not found")]
    NotFound(String),
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("{message}")]
    Upstream {
        status: StatusCode,
        message: String,
        details: Option<String>,
    },
    #[error("Internal server error")]
    Internal { details: Option<String> },
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AppError {
    pub fn invalid(message: impl Into<String>) -> Self {
        AppError::Invalid(message.into())
    }

    /// Provider failure reported back to the caller as a 400.
    pub fn rejected(message: impl Into<String>, cause: &ServiceError) -> Self {
        AppError::Upstream {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            details: Some(cause.to_string()),
        }
    }

    /// Provider failure reported back to the caller as a 500.
    pub fn upstream(message: impl Into<String>, cause: &ServiceError) -> Self {
        AppError::Upstream {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            details: Some(cause.to_string()),
        }
    }

    pub fn internal(details: impl Into<String>) -> Self {
        AppError::Internal {
            details: Some(details.into()),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingFields(_) | AppError::Invalid(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Upstream { status, .. } => *status,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.to_string();
        let details = match self {
            AppError::Upstream { details, .. } | AppError::Internal { details } => details,
            _ => None,
        };

        (status, Json(ErrorResponse { error, details })).into_response()
    }
}

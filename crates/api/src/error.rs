//! API error types with HTTP response mapping.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::ParseLiteralError;
use domain::{DomainError, OrderError};

/// Message returned for every server-side failure. Details go to the log only.
pub const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// No valid credentials were presented.
    Unauthorized(String),
    /// Domain logic error.
    Domain(DomainError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match &err {
        DomainError::Order(OrderError::InvalidTransition { .. }) => {
            (StatusCode::CONFLICT, err.to_string())
        }
        DomainError::Order(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        DomainError::Forbidden(_) => (StatusCode::FORBIDDEN, err.to_string()),
        DomainError::OrderNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        DomainError::Store(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            INTERNAL_ERROR_MESSAGE.to_string(),
        ),
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<ParseLiteralError> for ApiError {
    fn from(err: ParseLiteralError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

//! Storefront E-commerce Backend
//!
//! Self-hosted e-commerce backend exposing REST endpoints for the product
//! catalog and the order lifecycle.
//!
//! ## Features
//! - Order creation with stock validation and atomic stock reservation
//! - Order status state machine (cancellation, returns, admin overrides)
//! - Product catalog with stock adjustment
//! - Paginated order queries for customers and admins

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;
use thiserror::Error;

pub mod domain;
pub mod service;
pub mod store;

// =============================================================================
// Error Types
// =============================================================================

/// Application error taxonomy. Every service operation fails with exactly one
/// of these kinds; the HTTP layer maps kinds to status codes.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// Malformed or missing input, caught before any store access.
    #[error("{0}")]
    Validation(String),

    /// Semantically invalid request given current data (unknown user or
    /// product, insufficient stock, illegal status value or transition).
    #[error("{0}")]
    BadRequest(String),

    /// Caller lacks permission for the target resource.
    #[error("{0}")]
    Unauthorized(String),

    /// Referenced resource does not exist.
    #[error("{0}")]
    NotFound(String),
}

impl CommerceError {
    /// Stable tag exposed to API callers alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            CommerceError::Validation(_) => "ValidationError",
            CommerceError::BadRequest(_) => "BadRequestError",
            CommerceError::Unauthorized(_) => "AuthenticationError",
            CommerceError::NotFound(_) => "NotFoundError",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            CommerceError::Validation(_) | CommerceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            CommerceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            CommerceError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

/// Store failures surface to callers as bad requests carrying the underlying
/// message; nothing internal beyond the message leaks.
impl From<store::StoreError> for CommerceError {
    fn from(err: store::StoreError) -> Self {
        CommerceError::BadRequest(err.to_string())
    }
}

impl From<domain::aggregates::order::TransitionError> for CommerceError {
    fn from(err: domain::aggregates::order::TransitionError) -> Self {
        CommerceError::BadRequest(err.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for CommerceError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, CommerceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_map_to_statuses() {
        assert_eq!(CommerceError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(CommerceError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(CommerceError::Unauthorized("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(CommerceError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(CommerceError::Unauthorized("x".into()).kind(), "AuthenticationError");
    }

    #[test]
    fn store_errors_become_bad_requests() {
        let err: CommerceError = store::StoreError::Backend("connection reset".into()).into();
        assert!(matches!(err, CommerceError::BadRequest(ref m) if m == "connection reset"));
    }
}

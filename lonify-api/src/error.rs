/// Error handling for the API server
///
/// This module provides a unified error type that maps to HTTP responses.
/// All handlers return `Result<T, ApiError>` which converts to the
/// appropriate status code, so no failure in a handler can crash the
/// process; everything degrades to a structured error body.
///
/// Taxonomy mapping:
///
/// | Error                 | Status | Code                  |
/// |-----------------------|--------|-----------------------|
/// | `BadRequest`          | 400    | `bad_request`         |
/// | `Unauthorized`        | 401    | `unauthorized`        |
/// | `Forbidden`           | 403    | `forbidden`           |
/// | `NotFound`            | 404    | `not_found`           |
/// | `Conflict`            | 409    | `conflict`            |
/// | `AlreadyPaid`         | 409    | `already_paid`        |
/// | `ValidationError`     | 422    | `validation_error`    |
/// | `InternalError`       | 500    | `internal_error`      |
/// | `PaymentSetup`        | 502    | `payment_setup_error` |

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lonify_shared::auth::{jwt::JwtError, middleware::AuthError};
use lonify_shared::models::application::WorkflowError;
use lonify_shared::models::loan::LoanTermsError;
use lonify_shared::payments::PaymentError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401) - missing/expired/invalid token; clients treat
    /// this as a forced sign-out
    Unauthorized(String),

    /// Forbidden (403) - role or ownership mismatch
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409) - e.g., an undefined status transition
    Conflict(String),

    /// Already paid (409) - idempotency guard on the fee payment
    AlreadyPaid(String),

    /// Unprocessable entity (422) - validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500)
    InternalError(String),

    /// Payment processor failure (502)
    PaymentSetup(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "forbidden", "already_paid")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::AlreadyPaid(msg) => write!(f, "Already paid: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::PaymentSetup(msg) => write!(f, "Payment setup failed: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::AlreadyPaid(msg) => (StatusCode::CONFLICT, "already_paid", msg, None),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            ApiError::PaymentSetup(msg) => {
                (StatusCode::BAD_GATEWAY, "payment_setup_error", msg, None)
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Convert sqlx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if let Some(constraint) = db_err.constraint() {
                    // The unique transaction-id index is the payment replay backstop
                    if constraint.contains("transaction") {
                        return ApiError::AlreadyPaid(
                            "A payment with this transaction id is already recorded".to_string(),
                        );
                    }
                    if constraint.contains("email") {
                        return ApiError::Conflict("Email already exists".to_string());
                    }
                    return ApiError::Conflict(format!("Constraint violation: {}", constraint));
                }

                ApiError::InternalError(format!("Database error: {}", db_err))
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

/// Convert workflow errors to API errors
impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::NotFound(id) => {
                ApiError::NotFound(format!("Application {} not found", id))
            }
            WorkflowError::InvalidTransition { .. } => ApiError::Conflict(err.to_string()),
            WorkflowError::NotOwner => {
                ApiError::Forbidden("Only the applicant may perform this action".to_string())
            }
            WorkflowError::AlreadyPaid => {
                ApiError::AlreadyPaid("Application fee is already paid".to_string())
            }
            WorkflowError::FeeUnpayable(_) => ApiError::Conflict(err.to_string()),
            WorkflowError::Database(e) => e.into(),
        }
    }
}

/// Convert credential-extraction errors to API errors
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => {
                ApiError::Unauthorized("Missing credentials".to_string())
            }
            AuthError::InvalidFormat(msg) => ApiError::BadRequest(msg),
            AuthError::InvalidToken(msg) => ApiError::Unauthorized(msg),
        }
    }
}

/// Convert JWT errors to API errors
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::InvalidIssuer => ApiError::Unauthorized("Invalid token issuer".to_string()),
            _ => ApiError::Unauthorized(format!("Invalid token: {}", err)),
        }
    }
}

/// Convert payment gateway errors to API errors
impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        ApiError::PaymentSetup(err.to_string())
    }
}

/// Convert loan-terms validation failures to field-level details
impl From<LoanTermsError> for ApiError {
    fn from(err: LoanTermsError) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: err.field().to_string(),
            message: err.to_string(),
        }])
    }
}

/// Convert `validator` derive failures to field-level details
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();

        ApiError::ValidationError(details)
    }
}

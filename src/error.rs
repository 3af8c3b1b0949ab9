//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::gateway::GatewayError;
use crate::services::amount_validator::AmountError;
use crate::services::ledger::LedgerError;

/// Field name → messages, returned for validation failures only.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Validation Errors**: bad input, rejected before any gateway call or ledger write
/// - **Resource Errors**: unknown user, package or transaction
/// - **Gateway Errors**: the provider rejected the request or could not be reached
/// - **Security Errors**: webhook signature mismatch
/// - **Ledger Errors**: persistence failures
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Ledger operation failed.
    ///
    /// Returns HTTP 500 without details.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Amount outside the currency bounds or unsupported currency.
    ///
    /// Returns HTTP 400.
    #[error("{0}")]
    InvalidAmount(#[from] AmountError),

    /// Missing or malformed request fields.
    ///
    /// Returns HTTP 400 with a field-level `errors` map.
    #[error("{message}")]
    Validation { message: String, errors: FieldErrors },

    /// Referenced entity does not exist.
    ///
    /// Returns HTTP 404.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The gateway rejected the input, after the automatic retry where one applies.
    ///
    /// Returns HTTP 422 with the gateway's field messages.
    #[error("{message}")]
    GatewayValidation { message: String, errors: FieldErrors },

    /// Transport failure or other gateway error.
    ///
    /// Returns HTTP 502.
    #[error("{0}")]
    Gateway(String),

    /// Webhook signature missing or wrong.
    ///
    /// Returns HTTP 401.
    #[error("Invalid webhook signature")]
    InvalidSignature,
}

impl AppError {
    /// Single-field validation error.
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.clone()]);
        AppError::Validation { message, errors }
    }
}

/// Gateway failures are translated here so no provider-specific shape
/// reaches a caller.
impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Validation { message, messages } => AppError::GatewayValidation {
                message,
                errors: messages,
            },
            other => AppError::Gateway(other.to_string()),
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "success": false,
///   "code": "error_type",
///   "message": "Human-readable error message",
///   "errors": { "field": ["message"] }
/// }
/// ```
///
/// `errors` is only present for validation failures.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, errors) = match self {
            AppError::InvalidAmount(ref err) => (
                StatusCode::BAD_REQUEST,
                "invalid_amount",
                err.to_string(),
                None,
            ),
            AppError::Validation {
                ref message,
                ref errors,
            } => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                message.clone(),
                Some(errors.clone()),
            ),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", self.to_string(), None),
            AppError::GatewayValidation {
                ref message,
                ref errors,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "gateway_validation_error",
                message.clone(),
                Some(errors.clone()),
            ),
            AppError::Gateway(ref msg) => {
                (StatusCode::BAD_GATEWAY, "gateway_error", msg.clone(), None)
            }
            AppError::InvalidSignature => (
                StatusCode::UNAUTHORIZED,
                "invalid_signature",
                self.to_string(),
                None,
            ),
            AppError::Ledger(ref err) => {
                tracing::error!(error = %err, "ledger failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let mut body = json!({
            "success": false,
            "code": code,
            "message": message,
        });

        if let Some(errors) = errors {
            body["errors"] = json!(errors);
        }

        (status, Json(body)).into_response()
    }
}

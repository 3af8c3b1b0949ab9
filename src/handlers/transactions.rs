//! Transaction HTTP handlers.
//!
//! This module implements the direct transaction endpoints:
//! - POST /payments/transactions - Open a purchase and charge it
//! - POST /payments/transactions/{id}/confirm - Confirm with a payment source
//! - GET /payments/transactions/{id}/status - Current gateway status

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::error::AppError;
use crate::models::payment::{
    ConfirmTransactionRequest, CreateTransactionRequest, TransactionStatusResponse,
};
use crate::services::transaction_service;
use crate::state::AppState;

/// Create a transaction for a package purchase.
///
/// # Request Body
///
/// ```json
/// {
///   "amount_in_cents": 15000000,
///   "currency": "COP",
///   "package_id": "550e8400-...",
///   "user_id": "660e8400-...",
///   "payment_method": { "type": "CARD", "token": "tok_test_123", "installments": 1 },
///   "customer": { "email": "ana@example.com", "full_name": "Ana Pérez" },
///   "acceptance_token": "eyJhbGciOi..."
/// }
/// ```
///
/// # Response (201)
///
/// ```json
/// {
///   "success": true,
///   "purchase_id": "770e8400-...",
///   "transaction_id": "1234-1610641025-49201",
///   "status": "APPROVED",
///   "ledger_status": "COMPLETED",
///   "reference": "PAY-1736870400000-660e8400-K3P9QZ"
/// }
/// ```
///
/// # Errors
///
/// - 400: invalid amount or fields
/// - 404: unknown user or package
/// - 422: gateway validation failed twice
/// - 502: gateway unreachable or other gateway failure
pub async fn create_transaction(
    State(state): State<AppState>,
    Json(request): Json<CreateTransactionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = transaction_service::create_transaction(&state, request).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Confirm a pending transaction.
///
/// # Endpoint
///
/// `POST /payments/transactions/{id}/confirm`
pub async fn confirm_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
    Json(request): Json<ConfirmTransactionRequest>,
) -> Result<Json<TransactionStatusResponse>, AppError> {
    let response =
        transaction_service::confirm_transaction(&state, &transaction_id, request).await?;

    Ok(Json(response))
}

/// Read the gateway status of a transaction. Does not modify the ledger.
pub async fn transaction_status(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<Json<TransactionStatusResponse>, AppError> {
    let response = transaction_service::transaction_status(&state, &transaction_id).await?;

    Ok(Json(response))
}

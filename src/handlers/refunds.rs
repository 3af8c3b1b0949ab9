//! Refund handler.

use axum::{Json, extract::State};

use crate::models::payment::{RefundRequest, RefundResult};
use crate::services::refund_service;
use crate::state::AppState;

/// Request a refund (gateway void).
///
/// Always answers 200; `success` tells whether the gateway accepted it. The
/// ledger moves to REFUNDED when the VOIDED webhook arrives.
pub async fn create_refund(
    State(state): State<AppState>,
    Json(request): Json<RefundRequest>,
) -> Json<RefundResult> {
    Json(refund_service::refund(&state, request).await)
}

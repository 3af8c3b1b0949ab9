//! Refunds through the gateway's void operation.
//!
//! The ledger is not touched here. When the gateway finishes the void it
//! sends a VOIDED webhook, and the webhook service moves the transaction and
//! purchase to REFUNDED.

use crate::gateway::GatewayError;
use crate::gateway::types::VoidPayload;
use crate::models::payment::{RefundRequest, RefundResult};
use crate::services::transaction_service::validate_transaction_id;
use crate::state::AppState;

/// Request a full or partial void of a gateway transaction.
///
/// Never fails: input and gateway errors come back as `success: false` with
/// a message.
pub async fn refund(state: &AppState, request: RefundRequest) -> RefundResult {
    let transaction_id = match validate_transaction_id(&request.transaction_id) {
        Ok(id) => id,
        Err(err) => return failure(err.to_string()),
    };
    if request.amount_in_cents.is_some_and(|amount| amount <= 0) {
        return failure("Refund amount must be positive");
    }

    let payload = VoidPayload {
        amount_in_cents: request.amount_in_cents,
        reason: request
            .reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty()),
    };

    match state.gateway.void_transaction(transaction_id, &payload).await {
        Ok(void) => {
            let status = void
                .status
                .or_else(|| void.transaction.as_ref().map(|tx| tx.status.clone()));
            let refund_id = void
                .id
                .or_else(|| void.transaction.map(|tx| tx.id));

            tracing::info!(
                transaction_id,
                refund_id = refund_id.as_deref().unwrap_or("-"),
                amount_in_cents = ?payload.amount_in_cents,
                "refund requested"
            );

            RefundResult {
                success: true,
                refund_id,
                status,
                message: "Refund requested".to_string(),
            }
        }
        Err(err) => {
            tracing::error!(
                transaction_id,
                kind = err.kind(),
                error = %err,
                "refund failed"
            );
            failure(match &err {
                GatewayError::Transport(_) => "Payment gateway unavailable".to_string(),
                other => other.to_string(),
            })
        }
    }
}

fn failure(message: impl Into<String>) -> RefundResult {
    RefundResult {
        success: false,
        refund_id: None,
        status: None,
        message: message.into(),
    }
}

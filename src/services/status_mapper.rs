//! Gateway status → internal ledger status.
//!
//! | Gateway           | Purchase  | Transaction |
//! |-------------------|-----------|-------------|
//! | APPROVED          | COMPLETED | COMPLETED   |
//! | DECLINED          | FAILED    | FAILED      |
//! | ERROR             | FAILED    | FAILED      |
//! | VOIDED            | REFUNDED  | REFUNDED    |
//! | PENDING / unknown | PENDING   | PENDING     |
//!
//! Both the synchronous gateway response path and webhook processing go
//! through these two functions.

use crate::gateway::types::GatewayStatus;
use crate::models::payment_transaction::{StatusUpdate, TransactionStatus};
use crate::models::purchase::PurchaseStatus;

pub fn purchase_status(status: &GatewayStatus) -> PurchaseStatus {
    match status {
        GatewayStatus::Approved => PurchaseStatus::Completed,
        GatewayStatus::Declined | GatewayStatus::Error => PurchaseStatus::Failed,
        GatewayStatus::Voided => PurchaseStatus::Refunded,
        GatewayStatus::Pending | GatewayStatus::Unknown(_) => PurchaseStatus::Pending,
    }
}

pub fn transaction_status(status: &GatewayStatus) -> TransactionStatus {
    match status {
        GatewayStatus::Approved => TransactionStatus::Completed,
        GatewayStatus::Declined | GatewayStatus::Error => TransactionStatus::Failed,
        GatewayStatus::Voided => TransactionStatus::Refunded,
        GatewayStatus::Pending | GatewayStatus::Unknown(_) => TransactionStatus::Pending,
    }
}

/// Ledger update for a gateway-reported status.
pub fn status_update(
    status: &GatewayStatus,
    payment_method: Option<String>,
    gateway_response: Option<serde_json::Value>,
) -> StatusUpdate {
    StatusUpdate {
        transaction_status: transaction_status(status),
        purchase_status: purchase_status(status),
        payment_method,
        gateway_response,
    }
}

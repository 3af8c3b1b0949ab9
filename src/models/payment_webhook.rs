//! Inbound gateway callbacks.
//!
//! Each accepted delivery becomes one `payment_webhooks` row. The row is the
//! durable copy of the raw event; only its processing columns change later.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Processing state of a received webhook.
///
/// RECEIVED → PROCESSING → {PROCESSED, FAILED}. Events that cannot be matched
/// to a transaction yet stay RECEIVED for reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "webhook_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebhookStatus {
    Received,
    Processing,
    Processed,
    Failed,
}

impl WebhookStatus {
    pub fn is_final(self) -> bool {
        matches!(self, Self::Processed | Self::Failed)
    }
}

/// Webhook record from the `payment_webhooks` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct PaymentWebhook {
    pub id: Uuid,
    /// Resolved local transaction, once known
    pub transaction_id: Option<Uuid>,
    /// Soft link to the gateway transaction carried by the event
    pub gateway_transaction_id: Option<String>,
    pub provider: String,
    pub event_type: String,
    /// Raw request body, exactly as signed
    pub payload: String,
    pub signature: Option<String>,
    pub status: WebhookStatus,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPaymentWebhook {
    pub gateway_transaction_id: Option<String>,
    pub provider: String,
    pub event_type: String,
    pub payload: String,
    pub signature: Option<String>,
}

/// Processing columns written after dispatch.
#[derive(Debug, Clone)]
pub struct WebhookUpdate {
    pub status: WebhookStatus,
    pub transaction_id: Option<Uuid>,
    pub error_message: Option<String>,
}

impl WebhookUpdate {
    pub fn processing(transaction_id: Uuid) -> Self {
        Self {
            status: WebhookStatus::Processing,
            transaction_id: Some(transaction_id),
            error_message: None,
        }
    }

    pub fn processed(transaction_id: Uuid) -> Self {
        Self {
            status: WebhookStatus::Processed,
            transaction_id: Some(transaction_id),
            error_message: None,
        }
    }

    pub fn failed(transaction_id: Option<Uuid>, error: impl Into<String>) -> Self {
        Self {
            status: WebhookStatus::Failed,
            transaction_id,
            error_message: Some(error.into()),
        }
    }
}

//! Request and response bodies of the `/payments` API.
//!
//! Every response carries `success`; failures use the envelope produced by
//! `AppError`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::GatewayEnvironment;
use crate::gateway::types::{GatewayStatus, PaymentMethod};
use crate::models::payment_transaction::TransactionStatus;
use crate::services::amount_validator::AmountBounds;

/// Payment method types accepted by the gateway integration.
pub const SUPPORTED_PAYMENT_METHODS: &[&str] = &["CARD", "NEQUI", "PSE", "BANCOLOMBIA_TRANSFER"];

/// Customer identity sent to the gateway.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerInfo {
    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub full_name: String,

    #[serde(default)]
    pub phone_number: Option<String>,

    /// National id number
    #[serde(default)]
    pub legal_id: Option<String>,

    /// e.g. "CC", "CE", "NIT", "PP"
    #[serde(default)]
    pub legal_id_type: Option<String>,
}

/// Body of `POST /payments/transactions`.
///
/// # JSON Example
///
/// ```json
/// {
///   "amount_in_cents": 50000,
///   "currency": "COP",
///   "package_id": "550e8400-e29b-41d4-a716-446655440000",
///   "user_id": "660e8400-e29b-41d4-a716-446655440001",
///   "payment_method": { "type": "CARD", "token": "tok_test_123", "installments": 1 },
///   "customer": { "email": "ana@example.com", "full_name": "Ana Pérez", "phone_number": "3001234567" },
///   "acceptance_token": "eyJhbGciOi..."
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTransactionRequest {
    pub amount_in_cents: i64,

    pub currency: String,

    pub package_id: Uuid,

    /// Omitted for temporary customers
    #[serde(default)]
    pub user_id: Option<Uuid>,

    pub payment_method: PaymentMethod,

    #[serde(default)]
    pub customer: CustomerInfo,

    #[serde(default)]
    pub description: Option<String>,

    /// Stored on the purchase under `payment_details.metadata`
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,

    #[serde(default)]
    pub acceptance_token: String,

    #[serde(default)]
    pub accept_personal_auth: Option<String>,

    #[serde(default)]
    pub redirect_url: Option<String>,
}

/// Result of a transaction creation.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionResponse {
    pub success: bool,
    pub purchase_id: Uuid,
    pub payment_transaction_id: Uuid,
    /// Gateway-assigned transaction id
    pub transaction_id: String,
    /// Status as reported by the gateway
    pub status: GatewayStatus,
    /// Status recorded in the ledger
    pub ledger_status: TransactionStatus,
    pub amount_in_cents: i64,
    pub currency: String,
    /// Reference of the attempt that succeeded
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

/// Body of `POST /payments/payment-links`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentLinkRequest {
    pub amount_in_cents: i64,

    pub currency: String,

    pub package_id: Uuid,

    #[serde(default)]
    pub user_id: Option<Uuid>,

    #[serde(default)]
    pub customer_email: String,

    /// Link title; defaults to the package name
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub redirect_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentLinkResponse {
    pub success: bool,
    pub purchase_id: Uuid,
    pub payment_link_id: String,
    /// Shareable checkout URL
    pub permalink: String,
    pub reference: String,
    pub amount_in_cents: i64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Body of `POST /payments/transactions/{id}/confirm`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmTransactionRequest {
    #[serde(default)]
    pub payment_source_id: String,

    #[serde(default)]
    pub customer_email: String,

    #[serde(default)]
    pub acceptance_token: String,
}

/// Gateway-reported state of a transaction.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionStatusResponse {
    pub success: bool,
    pub transaction_id: String,
    pub status: GatewayStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_in_cents: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// Body of `POST /payments/refunds`.
#[derive(Debug, Clone, Deserialize)]
pub struct RefundRequest {
    pub transaction_id: String,

    /// Partial amount; the full transaction when omitted
    #[serde(default)]
    pub amount_in_cents: Option<i64>,

    #[serde(default)]
    pub reason: Option<String>,
}

/// Refund outcome. Failures are reported in this shape too.
#[derive(Debug, Clone, Serialize)]
pub struct RefundResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<GatewayStatus>,
    pub message: String,
}

/// Public checkout configuration. Never includes secrets.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentConfigResponse {
    pub success: bool,
    pub provider: String,
    pub public_key: String,
    pub environment: GatewayEnvironment,
    pub currencies: Vec<&'static str>,
    pub payment_methods: Vec<&'static str>,
    pub amount_limits: Vec<AmountBounds>,
}

/// Response to the gateway after a webhook was accepted.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub success: bool,
    pub webhook_id: Uuid,
}

//! Wire types exchanged with the payment gateway.
//!
//! Request bodies are serialized as the gateway expects them; response types
//! keep unknown fields in `extra` so the ledger can store a faithful snapshot.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field name → validation messages, as reported by the gateway.
pub type FieldMessages = BTreeMap<String, Vec<String>>;

/// Transaction status in the gateway's vocabulary.
///
/// Deserializes from any string; values the gateway may add later land in
/// `Unknown` instead of failing the whole response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GatewayStatus {
    Approved,
    Declined,
    Error,
    Voided,
    #[default]
    Pending,
    Unknown(String),
}

impl From<String> for GatewayStatus {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "APPROVED" => Self::Approved,
            "DECLINED" => Self::Declined,
            "ERROR" => Self::Error,
            "VOIDED" => Self::Voided,
            "PENDING" => Self::Pending,
            _ => Self::Unknown(value),
        }
    }
}

impl From<&str> for GatewayStatus {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<GatewayStatus> for String {
    fn from(status: GatewayStatus) -> Self {
        status.to_string()
    }
}

impl fmt::Display for GatewayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approved => f.write_str("APPROVED"),
            Self::Declined => f.write_str("DECLINED"),
            Self::Error => f.write_str("ERROR"),
            Self::Voided => f.write_str("VOIDED"),
            Self::Pending => f.write_str("PENDING"),
            Self::Unknown(raw) => f.write_str(raw),
        }
    }
}

/// Payment method descriptor: a `type` plus method-specific fields
/// (card token and installments, Nequi phone number, PSE bank code...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethod {
    #[serde(rename = "type")]
    pub method_type: String,

    #[serde(flatten)]
    pub details: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerData {
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legal_id_type: Option<String>,
}

/// Body of `POST /transactions`.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionPayload {
    pub amount_in_cents: i64,
    pub currency: String,
    pub customer_email: String,
    /// Must be unique per attempt at the gateway
    pub reference: String,
    pub payment_method: PaymentMethod,
    pub acceptance_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept_personal_auth: Option<String>,
    pub customer_data: CustomerData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

/// Body of `POST /payment_links`.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentLinkPayload {
    pub name: String,
    pub description: String,
    pub single_use: bool,
    pub collect_shipping: bool,
    pub currency: String,
    pub amount_in_cents: i64,
    /// Carries our reference so the paid transaction can be traced back
    pub sku: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

/// Body of `POST /transactions/{id}/confirm`.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmPayload {
    pub payment_source_id: String,
    pub customer_email: String,
    pub acceptance_token: String,
}

/// Body of `POST /transactions/{id}/void`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VoidPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_in_cents: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Successful responses are wrapped in `{"data": ...}`.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEnvelope<T> {
    pub data: T,
}

/// A transaction as the gateway reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayTransaction {
    pub id: String,

    #[serde(default)]
    pub status: GatewayStatus,

    #[serde(default)]
    pub status_message: Option<String>,

    #[serde(default)]
    pub amount_in_cents: Option<i64>,

    #[serde(default)]
    pub currency: Option<String>,

    #[serde(default)]
    pub reference: Option<String>,

    #[serde(default)]
    pub payment_method_type: Option<String>,

    #[serde(default)]
    pub redirect_url: Option<String>,

    /// Set when the transaction was paid through a hosted payment link
    #[serde(default)]
    pub payment_link_id: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GatewayTransaction {
    /// JSON snapshot stored on the ledger row.
    pub fn snapshot(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPaymentLink {
    pub id: String,

    #[serde(default)]
    pub single_use: bool,

    #[serde(default)]
    pub active: Option<bool>,

    #[serde(default)]
    pub expires_at: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Void/refund acknowledgement.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayVoid {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub status: Option<GatewayStatus>,

    #[serde(default)]
    pub transaction: Option<GatewayTransaction>,
}

/// Error body: `{"error": {"type": ..., "reason": ..., "messages": {...}}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayErrorBody {
    pub error: GatewayErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayErrorDetail {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    #[serde(default)]
    pub reason: Option<String>,

    #[serde(default)]
    pub messages: Option<Value>,
}

impl GatewayErrorDetail {
    /// Human-readable summary of the error.
    pub fn message(&self) -> String {
        self.reason
            .clone()
            .or_else(|| self.kind.clone())
            .unwrap_or_else(|| "Gateway error".to_string())
    }

    /// Field messages, accepting either `field: [msg, ...]` or `field: msg`.
    pub fn field_messages(&self) -> FieldMessages {
        let mut out = FieldMessages::new();

        let Some(Value::Object(fields)) = &self.messages else {
            return out;
        };

        for (field, value) in fields {
            let messages = match value {
                Value::Array(items) => items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
                Value::String(s) => vec![s.clone()],
                other => vec![other.to_string()],
            };
            out.insert(field.clone(), messages);
        }

        out
    }
}

/// Event envelope posted to the webhook endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEvent {
    pub event: String,

    #[serde(default)]
    pub data: GatewayEventData,

    #[serde(default)]
    pub environment: Option<String>,

    #[serde(default)]
    pub sent_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayEventData {
    #[serde(default)]
    pub transaction: Option<GatewayTransaction>,
}

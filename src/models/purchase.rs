//! Purchase records: a customer's intent to acquire a package.
//!
//! This module defines:
//! - `Purchase`: Database entity for the `purchases` table
//! - `PurchaseStatus`: the payment status of a purchase
//! - `NewPurchase`: values required to open a purchase
//! - `FailedAttempt`: a rejected gateway attempt kept for reconciliation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment status of a purchase.
///
/// Maps to the `purchase_status` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "purchase_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
    Cancelled,
}

impl PurchaseStatus {
    /// Whether a payment event may move a purchase from `self` to `next`.
    ///
    /// A purchase can have several transactions. Once one of them completed,
    /// a later declined attempt must not downgrade the purchase, so
    /// COMPLETED only moves to REFUNDED. REFUNDED and CANCELLED are final.
    pub fn can_move_to(self, next: PurchaseStatus) -> bool {
        use PurchaseStatus::*;

        if self == next {
            return false;
        }

        match self {
            Pending | Failed => true,
            Completed => next == Refunded,
            Refunded | Cancelled => false,
        }
    }
}

/// Represents a purchase record from the database.
///
/// # Database Table
///
/// Maps to the `purchases` table. Each purchase:
/// - Belongs to a registered user, or to a temporary customer identified by email
/// - References the package being bought
/// - Stores its amount in minor units (cents)
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Purchase {
    pub id: Uuid,

    /// Registered owner; `None` for a temporary customer
    pub user_id: Option<Uuid>,

    pub customer_email: String,

    pub package_id: Uuid,

    /// Amount in minor units of `currency`
    pub amount_in_cents: i64,

    /// Currency code (ISO 4217)
    pub currency: String,

    pub payment_status: PurchaseStatus,

    /// Payment method label reported by the gateway (e.g. "CARD")
    pub payment_method: Option<String>,

    /// Gateway transaction id of the attempt that last changed the status
    pub transaction_reference: Option<String>,

    /// Hosted payment link created for this purchase, if any
    pub payment_link_id: Option<String>,

    /// Free-form details; `attempts` holds rejected gateway attempts
    pub payment_details: serde_json::Value,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Computed from the package validity window at creation; never changed by payments
    pub expires_at: Option<DateTime<Utc>>,
}

/// Values required to open a PENDING purchase.
#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub user_id: Option<Uuid>,
    pub customer_email: String,
    pub package_id: Uuid,
    pub amount_in_cents: i64,
    pub currency: String,
    pub payment_method: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub payment_details: serde_json::Value,
}

/// A gateway attempt that did not produce a transaction.
///
/// Appended to `payment_details.attempts` so the reference sent to the
/// gateway stays queryable after a retry replaced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedAttempt {
    pub reference: String,
    pub attempt: u32,
    pub outcome: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub messages: serde_json::Value,
    pub attempted_at: DateTime<Utc>,
}

//! Gateway-side payment attempts.
//!
//! A `PaymentTransaction` is one attempt at the gateway for a purchase. Its
//! status only moves forward; `Transition::between` is the single rule both
//! ledger implementations apply while holding the row lock.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::purchase::PurchaseStatus;

/// Status of a payment transaction.
///
/// Maps to the `transaction_status` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Refunded => "REFUNDED",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of comparing a requested status against the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Requested status equals the current one; redelivery.
    Same,
    /// A legal forward move.
    Advance,
    /// Backward or otherwise illegal move (stale or out-of-order event).
    Invalid,
}

impl Transition {
    pub fn between(current: TransactionStatus, requested: TransactionStatus) -> Self {
        use TransactionStatus::*;

        if current == requested {
            return Transition::Same;
        }

        let allowed = match current {
            Pending => matches!(requested, Processing | Completed | Failed | Cancelled),
            Processing => matches!(requested, Completed | Failed | Cancelled),
            Completed => requested == Refunded,
            Failed | Cancelled | Refunded => false,
        };

        if allowed {
            Transition::Advance
        } else {
            Transition::Invalid
        }
    }
}

/// Represents a payment transaction record from the database.
///
/// # Database Table
///
/// Maps to the `payment_transactions` table. `(provider, gateway_transaction_id)`
/// is unique once the gateway assigned an id.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub gateway_transaction_id: Option<String>,
    pub provider: String,
    /// Reference sent to the gateway for this attempt
    pub reference: String,
    pub amount_in_cents: i64,
    pub currency: String,
    pub payment_method: Option<String>,
    pub status: TransactionStatus,
    /// Last raw gateway representation of this transaction
    pub gateway_response: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Values for recording a transaction the gateway has acknowledged.
///
/// Transactions are always recorded PENDING; the gateway-reported status is
/// applied afterwards through the ledger's status application so the purchase
/// cascade has one code path.
#[derive(Debug, Clone)]
pub struct NewPaymentTransaction {
    pub purchase_id: Uuid,
    pub gateway_transaction_id: String,
    pub provider: String,
    pub reference: String,
    pub amount_in_cents: i64,
    pub currency: String,
    pub payment_method: Option<String>,
    pub gateway_response: Option<serde_json::Value>,
}

/// A status change requested by a gateway response or webhook.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub transaction_status: TransactionStatus,
    pub purchase_status: PurchaseStatus,
    pub payment_method: Option<String>,
    pub gateway_response: Option<serde_json::Value>,
}

/// What the ledger did with a `StatusUpdate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    /// The transaction moved forward. `purchase_status` is set when the
    /// parent purchase changed as well.
    Applied {
        previous: TransactionStatus,
        current: TransactionStatus,
        purchase_status: Option<PurchaseStatus>,
    },
    /// Already in the requested status; only `updated_at` was touched.
    Unchanged(TransactionStatus),
    /// Illegal move; nothing was written.
    Rejected {
        current: TransactionStatus,
        requested: TransactionStatus,
    },
}

#[cfg(test)]
mod tests {
    use super::TransactionStatus::*;
    use super::*;

    #[test]
    fn same_status_is_a_redelivery() {
        assert_eq!(Transition::between(Completed, Completed), Transition::Same);
        assert_eq!(Transition::between(Pending, Pending), Transition::Same);
    }

    #[test]
    fn pending_moves_forward() {
        for next in [Processing, Completed, Failed, Cancelled] {
            assert_eq!(Transition::between(Pending, next), Transition::Advance);
        }
    }

    #[test]
    fn refund_only_from_completed() {
        assert_eq!(Transition::between(Completed, Refunded), Transition::Advance);
        assert_eq!(Transition::between(Pending, Refunded), Transition::Invalid);
        assert_eq!(Transition::between(Processing, Refunded), Transition::Invalid);
        assert_eq!(Transition::between(Failed, Refunded), Transition::Invalid);
    }

    #[test]
    fn no_backward_moves() {
        assert_eq!(Transition::between(Completed, Pending), Transition::Invalid);
        assert_eq!(Transition::between(Processing, Pending), Transition::Invalid);
        assert_eq!(Transition::between(Failed, Completed), Transition::Invalid);
    }
}

//! Ledger persistence: purchases, payment transactions and webhooks.
//!
//! `LedgerStore` is the persistence seam used by the payment services;
//! `PgLedger` is the Postgres implementation.
//!
//! # Atomicity Guarantees
//!
//! Status application runs in one database transaction that locks the
//! payment transaction row and then its purchase row (`FOR UPDATE`). Two
//! concurrent deliveries for the same transaction are serialized, and the
//! second one observes the first one's result and becomes a no-op.

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::db::DbPool;
use crate::models::payment_transaction::{
    NewPaymentTransaction, PaymentTransaction, StatusChange, StatusUpdate, TransactionStatus,
    Transition,
};
use crate::models::payment_webhook::{NewPaymentWebhook, PaymentWebhook, WebhookStatus, WebhookUpdate};
use crate::models::purchase::{FailedAttempt, NewPurchase, Purchase, PurchaseStatus};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("failed to encode ledger data: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Persistence operations of the payment core.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Connectivity check for health reporting.
    async fn ping(&self) -> Result<(), LedgerError>;

    async fn create_purchase(&self, purchase: NewPurchase) -> Result<Purchase, LedgerError>;

    /// Append a rejected gateway attempt to `payment_details.attempts`.
    async fn record_failed_attempt(
        &self,
        purchase_id: Uuid,
        attempt: FailedAttempt,
    ) -> Result<(), LedgerError>;

    async fn attach_payment_link(
        &self,
        purchase_id: Uuid,
        payment_link_id: &str,
    ) -> Result<(), LedgerError>;

    async fn find_purchase_by_payment_link(
        &self,
        payment_link_id: &str,
    ) -> Result<Option<Purchase>, LedgerError>;

    /// Insert a PENDING transaction, or return the existing row for the same
    /// `(provider, gateway_transaction_id)`.
    async fn record_transaction(
        &self,
        transaction: NewPaymentTransaction,
    ) -> Result<PaymentTransaction, LedgerError>;

    async fn find_transaction_by_gateway_id(
        &self,
        provider: &str,
        gateway_transaction_id: &str,
    ) -> Result<Option<PaymentTransaction>, LedgerError>;

    /// Atomically apply a status to a transaction and cascade to its purchase.
    ///
    /// Re-applying the current status only touches `updated_at`; backward or
    /// illegal moves are rejected without writing.
    async fn apply_transaction_status(
        &self,
        transaction_id: Uuid,
        update: StatusUpdate,
    ) -> Result<StatusChange, LedgerError>;

    async fn insert_webhook(&self, webhook: NewPaymentWebhook)
    -> Result<PaymentWebhook, LedgerError>;

    async fn update_webhook(&self, webhook_id: Uuid, update: WebhookUpdate)
    -> Result<(), LedgerError>;
}

#[derive(Clone)]
pub struct PgLedger {
    pool: DbPool,
}

impl PgLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedger {
    async fn ping(&self) -> Result<(), LedgerError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_purchase(&self, purchase: NewPurchase) -> Result<Purchase, LedgerError> {
        let purchase = sqlx::query_as::<_, Purchase>(
            r#"
            INSERT INTO purchases (
                user_id,
                customer_email,
                package_id,
                amount_in_cents,
                currency,
                payment_status,
                payment_method,
                expires_at,
                payment_details
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(purchase.user_id)
        .bind(purchase.customer_email)
        .bind(purchase.package_id)
        .bind(purchase.amount_in_cents)
        .bind(purchase.currency)
        .bind(PurchaseStatus::Pending)
        .bind(purchase.payment_method)
        .bind(purchase.expires_at)
        .bind(purchase.payment_details)
        .fetch_one(&self.pool)
        .await?;

        Ok(purchase)
    }

    async fn record_failed_attempt(
        &self,
        purchase_id: Uuid,
        attempt: FailedAttempt,
    ) -> Result<(), LedgerError> {
        let attempt = serde_json::to_value(attempt)?;

        let updated = sqlx::query(
            r#"
            UPDATE purchases
            SET payment_details = jsonb_set(
                    payment_details,
                    '{attempts}',
                    COALESCE(payment_details->'attempts', '[]'::jsonb) || jsonb_build_array($2::jsonb)
                ),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(purchase_id)
        .bind(attempt)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(LedgerError::NotFound("purchase"));
        }

        Ok(())
    }

    async fn attach_payment_link(
        &self,
        purchase_id: Uuid,
        payment_link_id: &str,
    ) -> Result<(), LedgerError> {
        let updated = sqlx::query(
            "UPDATE purchases SET payment_link_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(purchase_id)
        .bind(payment_link_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(LedgerError::NotFound("purchase"));
        }

        Ok(())
    }

    async fn find_purchase_by_payment_link(
        &self,
        payment_link_id: &str,
    ) -> Result<Option<Purchase>, LedgerError> {
        let purchase =
            sqlx::query_as::<_, Purchase>("SELECT * FROM purchases WHERE payment_link_id = $1")
                .bind(payment_link_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(purchase)
    }

    async fn record_transaction(
        &self,
        transaction: NewPaymentTransaction,
    ) -> Result<PaymentTransaction, LedgerError> {
        let inserted = sqlx::query_as::<_, PaymentTransaction>(
            r#"
            INSERT INTO payment_transactions (
                purchase_id,
                gateway_transaction_id,
                provider,
                reference,
                amount_in_cents,
                currency,
                payment_method,
                status,
                gateway_response
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (provider, gateway_transaction_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(transaction.purchase_id)
        .bind(&transaction.gateway_transaction_id)
        .bind(&transaction.provider)
        .bind(&transaction.reference)
        .bind(transaction.amount_in_cents)
        .bind(&transaction.currency)
        .bind(&transaction.payment_method)
        .bind(TransactionStatus::Pending)
        .bind(&transaction.gateway_response)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok(row);
        }

        // Another writer (usually a webhook) recorded it first
        self.find_transaction_by_gateway_id(
            &transaction.provider,
            &transaction.gateway_transaction_id,
        )
        .await?
        .ok_or(LedgerError::NotFound("payment transaction"))
    }

    async fn find_transaction_by_gateway_id(
        &self,
        provider: &str,
        gateway_transaction_id: &str,
    ) -> Result<Option<PaymentTransaction>, LedgerError> {
        let transaction = sqlx::query_as::<_, PaymentTransaction>(
            "SELECT * FROM payment_transactions WHERE provider = $1 AND gateway_transaction_id = $2",
        )
        .bind(provider)
        .bind(gateway_transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(transaction)
    }

    async fn apply_transaction_status(
        &self,
        transaction_id: Uuid,
        update: StatusUpdate,
    ) -> Result<StatusChange, LedgerError> {
        let mut tx = self.pool.begin().await?;

        // Lock the transaction row; concurrent deliveries queue here
        let (current, purchase_id, gateway_transaction_id): (TransactionStatus, Uuid, Option<String>) =
            sqlx::query_as(
                r#"
                SELECT status, purchase_id, gateway_transaction_id
                FROM payment_transactions
                WHERE id = $1
                FOR UPDATE
                "#,
            )
            .bind(transaction_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(LedgerError::NotFound("payment transaction"))?;

        let requested = update.transaction_status;

        match Transition::between(current, requested) {
            Transition::Same => {
                sqlx::query("UPDATE payment_transactions SET updated_at = NOW() WHERE id = $1")
                    .bind(transaction_id)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;
                return Ok(StatusChange::Unchanged(current));
            }
            Transition::Invalid => {
                tx.rollback().await?;
                return Ok(StatusChange::Rejected { current, requested });
            }
            Transition::Advance => {}
        }

        let completed_at = (requested == TransactionStatus::Completed).then(Utc::now);

        sqlx::query(
            r#"
            UPDATE payment_transactions
            SET status = $2,
                payment_method = COALESCE($3, payment_method),
                gateway_response = COALESCE($4, gateway_response),
                completed_at = COALESCE($5, completed_at),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(transaction_id)
        .bind(requested)
        .bind(&update.payment_method)
        .bind(&update.gateway_response)
        .bind(completed_at)
        .execute(&mut *tx)
        .await?;

        let purchase_current: PurchaseStatus =
            sqlx::query_scalar("SELECT payment_status FROM purchases WHERE id = $1 FOR UPDATE")
                .bind(purchase_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(LedgerError::NotFound("purchase"))?;

        let purchase_status = if purchase_current.can_move_to(update.purchase_status) {
            sqlx::query(
                r#"
                UPDATE purchases
                SET payment_status = $2,
                    payment_method = COALESCE($3, payment_method),
                    transaction_reference = COALESCE($4, transaction_reference),
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(purchase_id)
            .bind(update.purchase_status)
            .bind(&update.payment_method)
            .bind(&gateway_transaction_id)
            .execute(&mut *tx)
            .await?;

            Some(update.purchase_status)
        } else {
            None
        };

        tx.commit().await?;

        Ok(StatusChange::Applied {
            previous: current,
            current: requested,
            purchase_status,
        })
    }

    async fn insert_webhook(
        &self,
        webhook: NewPaymentWebhook,
    ) -> Result<PaymentWebhook, LedgerError> {
        let webhook = sqlx::query_as::<_, PaymentWebhook>(
            r#"
            INSERT INTO payment_webhooks (
                gateway_transaction_id,
                provider,
                event_type,
                payload,
                signature,
                status
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(webhook.gateway_transaction_id)
        .bind(webhook.provider)
        .bind(webhook.event_type)
        .bind(webhook.payload)
        .bind(webhook.signature)
        .bind(WebhookStatus::Received)
        .fetch_one(&self.pool)
        .await?;

        Ok(webhook)
    }

    async fn update_webhook(
        &self,
        webhook_id: Uuid,
        update: WebhookUpdate,
    ) -> Result<(), LedgerError> {
        let processed_at = update.status.is_final().then(Utc::now);

        let updated = sqlx::query(
            r#"
            UPDATE payment_webhooks
            SET status = $2,
                transaction_id = COALESCE($3, transaction_id),
                error_message = $4,
                processed_at = COALESCE($5, processed_at)
            WHERE id = $1
            "#,
        )
        .bind(webhook_id)
        .bind(update.status)
        .bind(update.transaction_id)
        .bind(update.error_message)
        .bind(processed_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(LedgerError::NotFound("payment webhook"));
        }

        Ok(())
    }
}

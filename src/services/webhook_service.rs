//! Webhook service for gateway callbacks.
//!
//! This module handles signature verification, durable storage of every
//! accepted delivery, and applying the reported status to the ledger.
//!
//! # Flow
//!
//! `receive` runs inside the HTTP request: verify, then persist a RECEIVED
//! row. `dispatch` runs afterwards on its own task and is safe to repeat:
//! the ledger treats a redelivered status as a no-op.

use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use uuid::Uuid;

use crate::error::AppError;
use crate::gateway::types::{GatewayEvent, GatewayTransaction};
use crate::models::payment_transaction::{
    NewPaymentTransaction, PaymentTransaction, StatusChange, TransactionStatus,
};
use crate::models::payment_webhook::{NewPaymentWebhook, PaymentWebhook, WebhookUpdate};
use crate::services::status_mapper;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex HMAC of the raw body.
pub const SIGNATURE_HEADER: &str = "x-signature";

pub const TRANSACTION_UPDATED: &str = "transaction.updated";
pub const PAYMENT_LINK_PAID: &str = "payment_link.paid";

/// What dispatch did with a stored webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookDisposition {
    /// Status applied, or already in place (redelivery). Row is PROCESSED.
    Processed {
        transaction_id: Uuid,
        change: StatusChange,
    },
    /// Backward or illegal move. Row is FAILED.
    Rejected {
        transaction_id: Uuid,
        current: TransactionStatus,
        requested: TransactionStatus,
    },
    /// No matching transaction yet. Row stays RECEIVED.
    Unresolved,
    /// Event type we do not handle. Row stays RECEIVED.
    Ignored,
    /// Body could not be decoded into an event. Row is FAILED.
    Malformed,
}

/// Verify the `X-Signature` header against the raw body.
///
/// # Format
///
/// Hex HMAC-SHA256 of the body, optionally prefixed with `sha256=`.
/// Comparison is constant time.
///
/// # Degraded Mode
///
/// Without a configured secret every delivery is accepted and a warning is
/// logged. Production configs refuse to start without a secret.
pub fn verify_signature(
    secret: Option<&str>,
    payload: &[u8],
    signature: Option<&str>,
) -> Result<(), AppError> {
    let Some(secret) = secret else {
        tracing::warn!("webhook signature not verified: no events secret configured");
        return Ok(());
    };

    let signature = signature
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(AppError::InvalidSignature)?;
    let signature = signature.strip_prefix("sha256=").unwrap_or(signature);
    let expected = hex::decode(signature).map_err(|_| AppError::InvalidSignature)?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AppError::InvalidSignature)?;
    mac.update(payload);
    mac.verify_slice(&expected)
        .map_err(|_| AppError::InvalidSignature)
}

/// Hex HMAC-SHA256 of `payload`, as the gateway sends it.
pub fn compute_signature(secret: &str, payload: &[u8]) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify and persist a delivery.
///
/// # Process
///
/// 1. Verify the signature (nothing is stored on failure)
/// 2. Require a UTF-8 body, so the stored text is byte-for-byte what was signed
/// 3. Peek at the event type and gateway transaction id
/// 4. Store the raw body as a RECEIVED row
///
/// Bodies that are UTF-8 but not a decodable event are stored too, with
/// event type `unknown`, so the delivery is never lost.
pub async fn receive(
    state: &AppState,
    raw: &[u8],
    signature: Option<&str>,
) -> Result<PaymentWebhook, AppError> {
    if let Err(err) = verify_signature(state.settings.events_secret.as_deref(), raw, signature) {
        tracing::warn!(
            security_event = true,
            provider = %state.settings.provider,
            signature_present = signature.is_some(),
            body_len = raw.len(),
            "rejected webhook with invalid signature"
        );
        return Err(err);
    }

    let payload = std::str::from_utf8(raw).map_err(|err| {
        tracing::warn!(
            provider = %state.settings.provider,
            body_len = raw.len(),
            error = %err,
            "rejected webhook with non UTF-8 body"
        );
        AppError::invalid_field("body", "Webhook payload must be UTF-8")
    })?;

    let (event_type, gateway_transaction_id) = peek_event(raw);

    let webhook = state
        .ledger
        .insert_webhook(NewPaymentWebhook {
            gateway_transaction_id,
            provider: state.settings.provider.clone(),
            event_type,
            payload: payload.to_string(),
            signature: signature.map(str::to_string),
        })
        .await?;

    tracing::info!(
        webhook_id = %webhook.id,
        event_type = %webhook.event_type,
        gateway_transaction_id = webhook.gateway_transaction_id.as_deref().unwrap_or("-"),
        "webhook received"
    );

    Ok(webhook)
}

/// Apply a stored webhook to the ledger.
///
/// # Errors
///
/// Only ledger failures are returned. Every other outcome is a
/// `WebhookDisposition` and is reflected on the webhook row.
pub async fn dispatch(
    state: &AppState,
    webhook: &PaymentWebhook,
) -> Result<WebhookDisposition, AppError> {
    let event: GatewayEvent = match serde_json::from_str(&webhook.payload) {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(webhook_id = %webhook.id, error = %err, "undecodable webhook payload");
            state
                .ledger
                .update_webhook(
                    webhook.id,
                    WebhookUpdate::failed(None, format!("Undecodable payload: {err}")),
                )
                .await?;
            return Ok(WebhookDisposition::Malformed);
        }
    };

    if event.event != TRANSACTION_UPDATED && event.event != PAYMENT_LINK_PAID {
        tracing::info!(
            webhook_id = %webhook.id,
            event_type = %event.event,
            "ignoring unhandled webhook event"
        );
        return Ok(WebhookDisposition::Ignored);
    }

    let Some(gateway_tx) = event.data.transaction else {
        tracing::warn!(webhook_id = %webhook.id, event_type = %event.event, "webhook without transaction");
        state
            .ledger
            .update_webhook(
                webhook.id,
                WebhookUpdate::failed(None, "Event carries no transaction"),
            )
            .await?;
        return Ok(WebhookDisposition::Malformed);
    };

    let Some(transaction) = resolve_transaction(state, &gateway_tx).await? else {
        tracing::info!(
            webhook_id = %webhook.id,
            gateway_transaction_id = %gateway_tx.id,
            "no ledger transaction for webhook, kept for reconciliation"
        );
        return Ok(WebhookDisposition::Unresolved);
    };

    state
        .ledger
        .update_webhook(webhook.id, WebhookUpdate::processing(transaction.id))
        .await?;

    let update = status_mapper::status_update(
        &gateway_tx.status,
        gateway_tx.payment_method_type.clone(),
        Some(gateway_tx.snapshot()),
    );

    let change = match state
        .ledger
        .apply_transaction_status(transaction.id, update)
        .await
    {
        Ok(change) => change,
        Err(err) => {
            let failed = WebhookUpdate::failed(Some(transaction.id), err.to_string());
            if let Err(mark_err) = state.ledger.update_webhook(webhook.id, failed).await {
                tracing::error!(webhook_id = %webhook.id, error = %mark_err, "failed to mark webhook");
            }
            return Err(err.into());
        }
    };

    if let StatusChange::Rejected { current, requested } = change {
        tracing::warn!(
            webhook_id = %webhook.id,
            transaction_id = %transaction.id,
            %current,
            %requested,
            "webhook status transition rejected"
        );
        state
            .ledger
            .update_webhook(
                webhook.id,
                WebhookUpdate::failed(
                    Some(transaction.id),
                    format!("Transition from {current} to {requested} is not allowed"),
                ),
            )
            .await?;
        return Ok(WebhookDisposition::Rejected {
            transaction_id: transaction.id,
            current,
            requested,
        });
    }

    state
        .ledger
        .update_webhook(webhook.id, WebhookUpdate::processed(transaction.id))
        .await?;

    match &change {
        StatusChange::Applied {
            previous,
            current,
            purchase_status,
        } => tracing::info!(
            webhook_id = %webhook.id,
            transaction_id = %transaction.id,
            %previous,
            %current,
            purchase_status = ?purchase_status,
            "webhook status applied"
        ),
        _ => tracing::debug!(
            webhook_id = %webhook.id,
            transaction_id = %transaction.id,
            "webhook redelivery, status unchanged"
        ),
    }

    Ok(WebhookDisposition::Processed {
        transaction_id: transaction.id,
        change,
    })
}

/// Find the ledger transaction for an event, recording it first when it was
/// paid through one of our payment links.
async fn resolve_transaction(
    state: &AppState,
    gateway_tx: &GatewayTransaction,
) -> Result<Option<PaymentTransaction>, AppError> {
    let provider = &state.settings.provider;

    if let Some(existing) = state
        .ledger
        .find_transaction_by_gateway_id(provider, &gateway_tx.id)
        .await?
    {
        return Ok(Some(existing));
    }

    let Some(link_id) = gateway_tx.payment_link_id.as_deref() else {
        return Ok(None);
    };
    let Some(purchase) = state.ledger.find_purchase_by_payment_link(link_id).await? else {
        return Ok(None);
    };

    let recorded = state
        .ledger
        .record_transaction(NewPaymentTransaction {
            purchase_id: purchase.id,
            gateway_transaction_id: gateway_tx.id.clone(),
            provider: provider.clone(),
            reference: gateway_tx
                .reference
                .clone()
                .unwrap_or_else(|| link_id.to_string()),
            amount_in_cents: gateway_tx.amount_in_cents.unwrap_or(purchase.amount_in_cents),
            currency: gateway_tx
                .currency
                .clone()
                .unwrap_or_else(|| purchase.currency.clone()),
            payment_method: gateway_tx.payment_method_type.clone(),
            gateway_response: Some(gateway_tx.snapshot()),
        })
        .await?;

    tracing::info!(
        purchase_id = %purchase.id,
        payment_link_id = link_id,
        gateway_transaction_id = %gateway_tx.id,
        "recorded transaction paid through payment link"
    );

    Ok(Some(recorded))
}

/// Event type and transaction id, without requiring a well-formed event.
fn peek_event(raw: &[u8]) -> (String, Option<String>) {
    let Ok(value) = serde_json::from_slice::<Value>(raw) else {
        return ("unknown".to_string(), None);
    };

    let event_type = value
        .get("event")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let transaction_id = value
        .pointer("/data/transaction/id")
        .and_then(Value::as_str)
        .map(str::to_string);

    (event_type, transaction_id)
}

//! Transaction service - direct gateway transactions for a purchase.
//!
//! This service handles:
//! - Amount and field validation before any side effect
//! - Opening the PENDING purchase
//! - Creating the gateway transaction, retrying once on a validation failure
//! - Recording the transaction and applying the gateway-reported status
//!
//! # Retry Policy
//!
//! A gateway validation failure (HTTP 422) on the first attempt is retried
//! immediately with a new reference and otherwise identical data. A second
//! validation failure, and any other gateway error, is final. The purchase is
//! never rolled back; rejected attempts are appended to its
//! `payment_details.attempts`.

use chrono::Utc;
use rand::{Rng, distr::Alphanumeric};
use serde_json::json;

use crate::error::{AppError, FieldErrors};
use crate::gateway::GatewayError;
use crate::gateway::types::{ConfirmPayload, CustomerData, GatewayTransaction, TransactionPayload};
use crate::models::payment::{
    ConfirmTransactionRequest, CreateTransactionRequest, SUPPORTED_PAYMENT_METHODS,
    TransactionResponse, TransactionStatusResponse,
};
use crate::models::payment_transaction::{NewPaymentTransaction, StatusChange, TransactionStatus};
use crate::models::purchase::FailedAttempt;
use crate::services::amount_validator::validate_amount;
use crate::services::purchase_service::{PurchaseDraft, open_purchase};
use crate::services::status_mapper;
use crate::state::AppState;

/// Original attempt plus one retry.
const MAX_ATTEMPTS: u32 = 2;

/// Create a purchase and a gateway transaction for it.
///
/// # Process
///
/// 1. Validate amount against currency bounds
/// 2. Validate customer, acceptance token and payment method fields
/// 3. Open a PENDING purchase (user and package must exist)
/// 4. Call the gateway; on a first 422 retry once with a fresh reference
/// 5. Record the transaction and apply the mapped status
///
/// # Errors
///
/// - `InvalidAmount` / `Validation`: rejected before any write
/// - `NotFound`: unknown user or package
/// - `GatewayValidation`: 422 on both attempts
/// - `Gateway`: transport failure or other gateway error (not retried)
/// - `Ledger`: database error
pub async fn create_transaction(
    state: &AppState,
    request: CreateTransactionRequest,
) -> Result<TransactionResponse, AppError> {
    let currency = request.currency.trim().to_ascii_uppercase();

    validate_amount(request.amount_in_cents, &currency)?;
    validate_transaction_request(&request)?;

    let customer_email = request.customer.email.trim().to_ascii_lowercase();
    let method_type = request.payment_method.method_type.trim().to_ascii_uppercase();

    let (purchase, _package) = open_purchase(
        state,
        PurchaseDraft {
            user_id: request.user_id,
            package_id: request.package_id,
            customer_email: customer_email.clone(),
            amount_in_cents: request.amount_in_cents,
            currency: currency.clone(),
            payment_method: Some(method_type.clone()),
            payment_details: json!({
                "channel": "transaction",
                "description": request.description,
                "metadata": request.metadata,
            }),
        },
    )
    .await?;

    let caller = request
        .user_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| purchase.id.to_string());

    let mut payment_method = request.payment_method;
    payment_method.method_type = method_type;

    let mut payload = TransactionPayload {
        amount_in_cents: request.amount_in_cents,
        currency: currency.clone(),
        customer_email,
        reference: generate_reference(&caller),
        payment_method,
        acceptance_token: request.acceptance_token.trim().to_string(),
        accept_personal_auth: request.accept_personal_auth,
        customer_data: CustomerData {
            full_name: request.customer.full_name.trim().to_string(),
            phone_number: request.customer.phone_number,
            legal_id: request.customer.legal_id,
            legal_id_type: request.customer.legal_id_type,
        },
        redirect_url: request
            .redirect_url
            .or_else(|| state.settings.redirect_url.clone()),
    };

    let mut attempt = 1;
    let gateway_tx = loop {
        match state.gateway.create_transaction(&payload).await {
            Ok(tx) => break tx,
            Err(err) => {
                record_failed_attempt(state, purchase.id, &payload.reference, attempt, &err).await;

                if err.is_validation() && attempt < MAX_ATTEMPTS {
                    let rejected = std::mem::take(&mut payload.reference);
                    payload.reference = fresh_reference(&caller, &rejected);
                    tracing::warn!(
                        purchase_id = %purchase.id,
                        rejected_reference = %rejected,
                        retry_reference = %payload.reference,
                        "gateway validation failed, retrying with a new reference"
                    );
                    attempt += 1;
                    continue;
                }

                tracing::error!(
                    purchase_id = %purchase.id,
                    attempt,
                    kind = err.kind(),
                    error = %err,
                    "transaction creation failed"
                );
                return Err(err.into());
            }
        }
    };

    let recorded = state
        .ledger
        .record_transaction(NewPaymentTransaction {
            purchase_id: purchase.id,
            gateway_transaction_id: gateway_tx.id.clone(),
            provider: state.settings.provider.clone(),
            reference: payload.reference.clone(),
            amount_in_cents: payload.amount_in_cents,
            currency: currency.clone(),
            payment_method: gateway_tx
                .payment_method_type
                .clone()
                .or_else(|| Some(payload.payment_method.method_type.clone())),
            gateway_response: Some(gateway_tx.snapshot()),
        })
        .await?;

    let ledger_status = apply_gateway_status(state, recorded.id, &gateway_tx).await?;

    tracing::info!(
        purchase_id = %purchase.id,
        transaction_id = %gateway_tx.id,
        reference = %payload.reference,
        status = %gateway_tx.status,
        attempts = attempt,
        "transaction created"
    );

    Ok(TransactionResponse {
        success: true,
        purchase_id: purchase.id,
        payment_transaction_id: recorded.id,
        transaction_id: gateway_tx.id.clone(),
        status: gateway_tx.status.clone(),
        ledger_status,
        amount_in_cents: payload.amount_in_cents,
        currency,
        reference: payload.reference,
        redirect_url: gateway_tx.redirect_url.clone(),
    })
}

/// Confirm a pending transaction with a stored payment source.
///
/// When the transaction is already in the ledger, the status the gateway
/// reports is applied the same way as for a creation response.
pub async fn confirm_transaction(
    state: &AppState,
    transaction_id: &str,
    request: ConfirmTransactionRequest,
) -> Result<TransactionStatusResponse, AppError> {
    let transaction_id = validate_transaction_id(transaction_id)?;

    let mut errors = FieldErrors::new();
    require(&mut errors, "payment_source_id", &request.payment_source_id);
    require_email(&mut errors, "customer_email", &request.customer_email);
    require(&mut errors, "acceptance_token", &request.acceptance_token);
    into_validation(errors)?;

    let payload = ConfirmPayload {
        payment_source_id: request.payment_source_id.trim().to_string(),
        customer_email: request.customer_email.trim().to_ascii_lowercase(),
        acceptance_token: request.acceptance_token.trim().to_string(),
    };

    let gateway_tx = state
        .gateway
        .confirm_transaction(transaction_id, &payload)
        .await?;

    if let Some(existing) = state
        .ledger
        .find_transaction_by_gateway_id(&state.settings.provider, &gateway_tx.id)
        .await?
    {
        apply_gateway_status(state, existing.id, &gateway_tx).await?;
    }

    Ok(status_response(gateway_tx))
}

/// Current status as reported by the gateway. Read-only.
pub async fn transaction_status(
    state: &AppState,
    transaction_id: &str,
) -> Result<TransactionStatusResponse, AppError> {
    let transaction_id = validate_transaction_id(transaction_id)?;

    let gateway_tx = state
        .gateway
        .get_transaction_status(transaction_id)
        .await
        .map_err(|err| match err {
            GatewayError::Rejected { status: 404, .. } => AppError::NotFound("Transaction"),
            other => other.into(),
        })?;

    Ok(status_response(gateway_tx))
}

/// Apply a gateway-reported status to a recorded transaction; returns the
/// status the ledger holds afterwards.
async fn apply_gateway_status(
    state: &AppState,
    payment_transaction_id: uuid::Uuid,
    gateway_tx: &GatewayTransaction,
) -> Result<TransactionStatus, AppError> {
    let update = status_mapper::status_update(
        &gateway_tx.status,
        gateway_tx.payment_method_type.clone(),
        Some(gateway_tx.snapshot()),
    );

    let change = state
        .ledger
        .apply_transaction_status(payment_transaction_id, update)
        .await?;

    Ok(match change {
        StatusChange::Applied { current, .. } => current,
        StatusChange::Unchanged(current) => current,
        StatusChange::Rejected { current, requested } => {
            // A webhook already moved it further
            tracing::debug!(
                transaction_id = %gateway_tx.id,
                current = ?current,
                requested = ?requested,
                "synchronous status older than ledger state"
            );
            current
        }
    })
}

fn status_response(tx: GatewayTransaction) -> TransactionStatusResponse {
    TransactionStatusResponse {
        success: true,
        transaction_id: tx.id,
        status: tx.status,
        status_message: tx.status_message,
        amount_in_cents: tx.amount_in_cents,
        currency: tx.currency,
        reference: tx.reference,
    }
}

/// Persist a rejected attempt. Failures here are logged, not propagated, so
/// they never mask the gateway outcome.
async fn record_failed_attempt(
    state: &AppState,
    purchase_id: uuid::Uuid,
    reference: &str,
    attempt: u32,
    err: &GatewayError,
) {
    let messages = match err {
        GatewayError::Validation { messages, .. } => json!(messages),
        _ => serde_json::Value::Null,
    };

    let record = FailedAttempt {
        reference: reference.to_string(),
        attempt,
        outcome: err.kind().to_string(),
        message: err.to_string(),
        messages,
        attempted_at: Utc::now(),
    };

    if let Err(e) = state.ledger.record_failed_attempt(purchase_id, record).await {
        tracing::error!(
            purchase_id = %purchase_id,
            reference,
            error = %e,
            "failed to record rejected gateway attempt"
        );
    }
}

/// Reference sent to the gateway: timestamp, caller and a random suffix.
pub fn generate_reference(caller: &str) -> String {
    let caller: String = caller
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect();

    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();

    format!(
        "PAY-{}-{}-{}",
        Utc::now().timestamp_millis(),
        caller,
        suffix.to_ascii_uppercase()
    )
}

/// A reference guaranteed to differ from `rejected`.
pub fn fresh_reference(caller: &str, rejected: &str) -> String {
    loop {
        let candidate = generate_reference(caller);
        if candidate != rejected {
            return candidate;
        }
    }
}

fn validate_transaction_request(request: &CreateTransactionRequest) -> Result<(), AppError> {
    let mut errors = FieldErrors::new();

    require_email(&mut errors, "customer.email", &request.customer.email);
    require(&mut errors, "customer.full_name", &request.customer.full_name);
    require(&mut errors, "acceptance_token", &request.acceptance_token);

    let method = request.payment_method.method_type.trim().to_ascii_uppercase();
    if !SUPPORTED_PAYMENT_METHODS.contains(&method.as_str()) {
        errors
            .entry("payment_method.type".to_string())
            .or_default()
            .push(format!(
                "Unsupported payment method; expected one of {}",
                SUPPORTED_PAYMENT_METHODS.join(", ")
            ));
    }

    if let Some(url) = &request.redirect_url {
        validate_redirect_url(&mut errors, url);
    }

    into_validation(errors)
}

/// Trimmed gateway transaction id. Ids travel as a URL path segment, so only
/// ASCII letters, digits, `-` and `_` are accepted.
pub(crate) fn validate_transaction_id(transaction_id: &str) -> Result<&str, AppError> {
    let id = transaction_id.trim();
    if id.is_empty() {
        return Err(AppError::invalid_field(
            "transaction_id",
            "Transaction id is required",
        ));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::invalid_field(
            "transaction_id",
            "Transaction id may only contain letters, digits, '-' and '_'",
        ));
    }
    Ok(id)
}

pub(crate) fn require(errors: &mut FieldErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors
            .entry(field.to_string())
            .or_default()
            .push("This field is required".to_string());
    }
}

pub(crate) fn require_email(errors: &mut FieldErrors, field: &str, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        require(errors, field, value);
    } else if !value.contains('@') || value.starts_with('@') || value.ends_with('@') {
        errors
            .entry(field.to_string())
            .or_default()
            .push("Must be a valid email address".to_string());
    }
}

pub(crate) fn validate_redirect_url(errors: &mut FieldErrors, url: &str) {
    match url::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
        _ => errors
            .entry("redirect_url".to_string())
            .or_default()
            .push("Must be an absolute http(s) URL".to_string()),
    }
}

pub(crate) fn into_validation(errors: FieldErrors) -> Result<(), AppError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation {
            message: "Invalid payment request".to_string(),
            errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_carry_caller_and_differ() {
        let first = generate_reference("550e8400-e29b-41d4-a716-446655440000");
        assert!(first.starts_with("PAY-"));
        assert!(first.contains("-550e8400-"));

        let second = fresh_reference("550e8400-e29b-41d4-a716-446655440000", &first);
        assert_ne!(first, second);
    }

    #[test]
    fn email_validation() {
        let mut errors = FieldErrors::new();
        require_email(&mut errors, "email", "ana@example.com");
        assert!(errors.is_empty());

        require_email(&mut errors, "email", "not-an-email");
        require_email(&mut errors, "blank", "   ");
        assert_eq!(errors["email"], vec!["Must be a valid email address"]);
        assert_eq!(errors["blank"], vec!["This field is required"]);
    }

    #[test]
    fn transaction_ids_are_plain_tokens() {
        assert_eq!(
            validate_transaction_id(" 1234-1610641025-49201 ").unwrap(),
            "1234-1610641025-49201"
        );
        assert!(validate_transaction_id("tx_ok-2").is_ok());

        for bad in ["", "   ", "../../merchants/pub_test_x", "abc?x=", "a/b", "a#b", "..", "tx%2F1"] {
            assert!(
                matches!(validate_transaction_id(bad), Err(AppError::Validation { .. })),
                "{bad:?} accepted"
            );
        }
    }

    #[test]
    fn redirect_url_must_be_http() {
        let mut errors = FieldErrors::new();
        validate_redirect_url(&mut errors, "https://clinic.example.com/pagos/resultado");
        assert!(errors.is_empty());

        validate_redirect_url(&mut errors, "javascript:alert(1)");
        assert!(errors.contains_key("redirect_url"));
    }
}

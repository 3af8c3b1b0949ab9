//! Hosted payment links.
//!
//! Same validation and purchase opening as direct transactions, but the
//! gateway returns a checkout link instead of a transaction. The transaction
//! only appears when the customer pays, and is recorded from the webhook.
//! No retry: a validation failure here is final.

use chrono::Utc;
use serde_json::json;

use crate::error::{AppError, FieldErrors};
use crate::gateway::types::PaymentLinkPayload;
use crate::models::payment::{CreatePaymentLinkRequest, PaymentLinkResponse};
use crate::services::amount_validator::validate_amount;
use crate::services::purchase_service::{PurchaseDraft, open_purchase};
use crate::services::transaction_service::{
    generate_reference, into_validation, require_email, validate_redirect_url,
};
use crate::state::AppState;

pub async fn create_payment_link(
    state: &AppState,
    request: CreatePaymentLinkRequest,
) -> Result<PaymentLinkResponse, AppError> {
    let currency = request.currency.trim().to_ascii_uppercase();

    validate_amount(request.amount_in_cents, &currency)?;

    let mut errors = FieldErrors::new();
    require_email(&mut errors, "customer_email", &request.customer_email);
    if let Some(url) = &request.redirect_url {
        validate_redirect_url(&mut errors, url);
    }
    if request.expires_at.is_some_and(|at| at <= Utc::now()) {
        errors
            .entry("expires_at".to_string())
            .or_default()
            .push("Must be in the future".to_string());
    }
    into_validation(errors)?;

    let (purchase, package) = open_purchase(
        state,
        PurchaseDraft {
            user_id: request.user_id,
            package_id: request.package_id,
            customer_email: request.customer_email.trim().to_ascii_lowercase(),
            amount_in_cents: request.amount_in_cents,
            currency: currency.clone(),
            payment_method: None,
            payment_details: json!({
                "channel": "payment_link",
                "description": request.description,
            }),
        },
    )
    .await?;

    let caller = request
        .user_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| purchase.id.to_string());
    let reference = generate_reference(&caller);

    let payload = PaymentLinkPayload {
        name: request.name.unwrap_or_else(|| package.name.clone()),
        description: request
            .description
            .unwrap_or_else(|| format!("Compra de {}", package.name)),
        single_use: true,
        collect_shipping: false,
        currency: currency.clone(),
        amount_in_cents: request.amount_in_cents,
        sku: reference.clone(),
        expires_at: request.expires_at,
        redirect_url: request
            .redirect_url
            .or_else(|| state.settings.redirect_url.clone()),
    };

    let link = state
        .gateway
        .create_payment_link(&payload)
        .await
        .inspect_err(|err| {
            tracing::error!(
                purchase_id = %purchase.id,
                reference = %reference,
                kind = err.kind(),
                error = %err,
                "payment link creation failed"
            )
        })?;

    state
        .ledger
        .attach_payment_link(purchase.id, &link.id)
        .await?;

    tracing::info!(
        purchase_id = %purchase.id,
        payment_link_id = %link.id,
        reference = %reference,
        "payment link created"
    );

    Ok(PaymentLinkResponse {
        success: true,
        purchase_id: purchase.id,
        permalink: format!("{}{}", state.settings.checkout_url, link.id),
        payment_link_id: link.id,
        reference,
        amount_in_cents: request.amount_in_cents,
        currency,
        expires_at: request.expires_at,
    })
}

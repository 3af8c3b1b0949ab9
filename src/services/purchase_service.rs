//! Opening purchases ahead of a gateway call.

use chrono::Utc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::catalog::Package;
use crate::models::purchase::{NewPurchase, Purchase};
use crate::state::AppState;

/// Inputs shared by the transaction and payment-link flows.
#[derive(Debug, Clone)]
pub struct PurchaseDraft {
    pub user_id: Option<Uuid>,
    pub package_id: Uuid,
    pub customer_email: String,
    pub amount_in_cents: i64,
    pub currency: String,
    pub payment_method: Option<String>,
    pub payment_details: serde_json::Value,
}

/// Create a PENDING purchase after resolving its user and package.
///
/// The draft's amount and currency must be the package's price.
///
/// Returns the purchase together with the resolved package.
///
/// The purchase is kept even if the gateway call that follows fails, so the
/// ledger shows the attempt.
///
/// # Errors
///
/// - `NotFound("User")` / `NotFound("Package")`: unknown reference
/// - `Validation`: amount or currency differs from the package price, or
///   the package validity cannot be turned into an expiry date
/// - `Ledger`: database error
pub async fn open_purchase(
    state: &AppState,
    draft: PurchaseDraft,
) -> Result<(Purchase, Package), AppError> {
    if let Some(user_id) = draft.user_id {
        state
            .catalog
            .find_user(user_id)
            .await?
            .ok_or(AppError::NotFound("User"))?;
    }

    let package = state
        .catalog
        .find_package(draft.package_id)
        .await?
        .ok_or(AppError::NotFound("Package"))?;

    if !package.is_priced_at(draft.amount_in_cents, &draft.currency) {
        tracing::warn!(
            package_id = %package.id,
            amount_in_cents = draft.amount_in_cents,
            currency = %draft.currency,
            price_in_cents = package.price_in_cents,
            package_currency = %package.currency.trim(),
            "requested amount does not match package price"
        );
        return Err(AppError::invalid_field(
            "amount_in_cents",
            format!(
                "Amount must match the package price of {} {}",
                package.price_in_cents,
                package.currency.trim()
            ),
        ));
    }

    let expires_at = package.expires_at(Utc::now()).ok_or_else(|| {
        tracing::error!(
            package_id = %package.id,
            validity_days = package.validity_days,
            "package validity out of range"
        );
        AppError::invalid_field("package_id", "Package validity period is out of range")
    })?;

    let purchase = state
        .ledger
        .create_purchase(NewPurchase {
            user_id: draft.user_id,
            customer_email: draft.customer_email,
            package_id: package.id,
            amount_in_cents: draft.amount_in_cents,
            currency: draft.currency,
            payment_method: draft.payment_method,
            expires_at: Some(expires_at),
            payment_details: draft.payment_details,
        })
        .await?;

    tracing::info!(
        purchase_id = %purchase.id,
        package_id = %package.id,
        amount_in_cents = purchase.amount_in_cents,
        currency = %purchase.currency,
        "purchase opened"
    );

    Ok((purchase, package))
}

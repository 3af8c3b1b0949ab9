//! Payment link and checkout configuration handlers.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use crate::error::AppError;
use crate::models::payment::{CreatePaymentLinkRequest, PaymentConfigResponse, SUPPORTED_PAYMENT_METHODS};
use crate::services::amount_validator::AMOUNT_BOUNDS;
use crate::services::payment_link_service;
use crate::state::AppState;

/// Create a hosted payment link for a package purchase.
///
/// # Response (201)
///
/// ```json
/// {
///   "success": true,
///   "purchase_id": "770e8400-...",
///   "payment_link_id": "test_AbCdEf",
///   "permalink": "https://checkout.wompi.co/l/test_AbCdEf"
/// }
/// ```
pub async fn create_payment_link(
    State(state): State<AppState>,
    Json(request): Json<CreatePaymentLinkRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = payment_link_service::create_payment_link(&state, request).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Public checkout configuration for the frontend.
///
/// Only the public key is exposed; private key and events secret never
/// leave the server.
pub async fn payment_config(State(state): State<AppState>) -> Json<PaymentConfigResponse> {
    let settings = &state.settings;

    Json(PaymentConfigResponse {
        success: true,
        provider: settings.provider.clone(),
        public_key: settings.public_key.clone(),
        environment: settings.environment,
        currencies: AMOUNT_BOUNDS.iter().map(|b| b.currency).collect(),
        payment_methods: SUPPORTED_PAYMENT_METHODS.to_vec(),
        amount_limits: AMOUNT_BOUNDS.to_vec(),
    })
}

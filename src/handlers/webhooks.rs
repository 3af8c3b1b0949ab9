//! Inbound gateway webhook handler.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};

use crate::error::AppError;
use crate::models::payment::WebhookAck;
use crate::services::webhook_service::{self, SIGNATURE_HEADER};
use crate::state::AppState;

/// Receive a gateway event.
///
/// # Process
///
/// 1. Verify the `X-Signature` HMAC over the raw body
/// 2. Persist the delivery
/// 3. Answer 200 and apply the event on a background task
///
/// The gateway retries deliveries that are not acknowledged quickly, so no
/// ledger work happens before the response.
///
/// # Errors
///
/// - 401: signature missing or wrong (nothing persisted)
/// - 400: body is not UTF-8 (nothing persisted)
/// - 500: the delivery could not be stored
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let webhook = webhook_service::receive(&state, &body, signature).await?;
    let webhook_id = webhook.id;

    tokio::spawn(async move {
        if let Err(err) = webhook_service::dispatch(&state, &webhook).await {
            tracing::error!(webhook_id = %webhook.id, error = %err, "webhook dispatch failed");
        }
    });

    Ok(Json(WebhookAck {
        success: true,
        webhook_id,
    }))
}

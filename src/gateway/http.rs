//! reqwest-based gateway client.
//!
//! Every request carries `Authorization: Bearer <private key>` and runs under
//! a fixed client timeout. Request method, URL and redacted body, and
//! response status and body, are logged at `debug`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use url::Url;

use super::logging::redacted_json;
use super::types::{
    ConfirmPayload, GatewayEnvelope, GatewayErrorBody, GatewayPaymentLink, GatewayTransaction,
    GatewayVoid, PaymentLinkPayload, TransactionPayload, VoidPayload,
};
use super::{GatewayClient, GatewayError, GatewayResult};

#[derive(Clone)]
pub struct HttpGatewayClient {
    client: Client,
    base_url: Url,
    private_key: String,
}

impl HttpGatewayClient {
    /// Build a client for `base_url` (e.g. `https://sandbox.wompi.co/v1`).
    pub fn new(
        base_url: &str,
        private_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        // Url::join drops the last path segment unless the base ends with '/'
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };

        let base_url = Url::parse(&normalized)
            .map_err(|e| GatewayError::Transport(format!("invalid base url: {e}")))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("HTTP client error: {e}")))?;

        Ok(Self {
            client,
            base_url,
            private_key: private_key.into(),
        })
    }

    /// Resource URL under the base. Each segment is percent-encoded on its
    /// own, so ids cannot add segments, a query or a fragment.
    fn endpoint(&self, segments: &[&str]) -> GatewayResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::Transport("base url cannot hold a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post<B, T>(&self, segments: &[&str], body: &B) -> GatewayResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        let body_json = serde_json::to_string(body)
            .map_err(|e| GatewayError::Transport(format!("failed to encode request: {e}")))?;

        tracing::debug!(
            method = "POST",
            url = %url,
            body = %redacted_json(body),
            "gateway request"
        );

        let request = self
            .client
            .request(Method::POST, url.clone())
            .header("Content-Type", "application/json")
            .body(body_json);

        self.execute(Method::POST, url, request).await
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> GatewayResult<T> {
        let url = self.endpoint(segments)?;

        tracing::debug!(method = "GET", url = %url, "gateway request");

        let request = self.client.request(Method::GET, url.clone());
        self.execute(Method::GET, url, request).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        request: RequestBuilder,
    ) -> GatewayResult<T> {
        let response = request
            .bearer_auth(&self.private_key)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(method = %method, url = %url, error = %e, "gateway request failed");
                GatewayError::Transport(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(format!("failed to read response: {e}")))?;

        tracing::debug!(
            method = %method,
            url = %url,
            status = status.as_u16(),
            body = %body,
            "gateway response"
        );

        if !status.is_success() {
            return Err(error_from_response(status, &body));
        }

        serde_json::from_str::<GatewayEnvelope<T>>(&body)
            .map(|envelope| envelope.data)
            .map_err(|e| GatewayError::Transport(format!("unexpected gateway response: {e}")))
    }
}

/// Translate a non-success response into a `GatewayError`.
fn error_from_response(status: StatusCode, body: &str) -> GatewayError {
    let detail = serde_json::from_str::<GatewayErrorBody>(body)
        .ok()
        .map(|parsed| parsed.error);

    if status == StatusCode::UNPROCESSABLE_ENTITY {
        return GatewayError::Validation {
            message: detail
                .as_ref()
                .map(|d| d.message())
                .unwrap_or_else(|| "Gateway validation failed".to_string()),
            messages: detail.map(|d| d.field_messages()).unwrap_or_default(),
        };
    }

    GatewayError::Rejected {
        status: status.as_u16(),
        message: detail.map(|d| d.message()).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Gateway error")
                .to_string()
        }),
    }
}

#[async_trait]
impl GatewayClient for HttpGatewayClient {
    async fn create_transaction(
        &self,
        payload: &TransactionPayload,
    ) -> GatewayResult<GatewayTransaction> {
        self.post(&["transactions"], payload).await
    }

    async fn create_payment_link(
        &self,
        payload: &PaymentLinkPayload,
    ) -> GatewayResult<GatewayPaymentLink> {
        self.post(&["payment_links"], payload).await
    }

    async fn confirm_transaction(
        &self,
        transaction_id: &str,
        payload: &ConfirmPayload,
    ) -> GatewayResult<GatewayTransaction> {
        self.post(&["transactions", transaction_id, "confirm"], payload)
            .await
    }

    async fn get_transaction_status(
        &self,
        transaction_id: &str,
    ) -> GatewayResult<GatewayTransaction> {
        self.get(&["transactions", transaction_id]).await
    }

    async fn void_transaction(
        &self,
        transaction_id: &str,
        payload: &VoidPayload,
    ) -> GatewayResult<GatewayVoid> {
        self.post(&["transactions", transaction_id, "void"], payload)
            .await
    }
}

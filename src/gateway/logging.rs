//! Logging decorator for any `GatewayClient`.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::types::{
    ConfirmPayload, GatewayPaymentLink, GatewayTransaction, GatewayVoid, PaymentLinkPayload,
    TransactionPayload, VoidPayload,
};
use super::{GatewayClient, GatewayError, GatewayResult};

/// Request fields that never reach the logs.
const REDACTED_FIELDS: &[&str] = &[
    "token",
    "acceptance_token",
    "accept_personal_auth",
    "payment_source_id",
    "legal_id",
    "phone_number",
];

/// Serialize `body` for logging with sensitive fields masked.
pub(crate) fn redacted_json<B: Serialize + ?Sized>(body: &B) -> String {
    match serde_json::to_value(body) {
        Ok(mut value) => {
            redact(&mut value);
            value.to_string()
        }
        Err(_) => String::new(),
    }
}

fn redact(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if REDACTED_FIELDS.contains(&key.as_str()) {
                    if !field.is_null() {
                        *field = Value::String("[REDACTED]".to_string());
                    }
                } else {
                    redact(field);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact),
        _ => {}
    }
}

/// Logs each gateway operation and its outcome. Request bodies are logged
/// at `debug`, redacted.
///
/// Validation failures (HTTP 422) are expected and retried by the caller, so
/// they are logged at `warn`; every other failure is logged at `error`.
pub struct LoggingGateway<G> {
    inner: G,
}

impl<G: GatewayClient> LoggingGateway<G> {
    pub fn new(inner: G) -> Self {
        Self { inner }
    }

    fn log_request<B: Serialize + ?Sized>(operation: &str, target: Option<&str>, body: Option<&B>) {
        tracing::info!(operation, target = target.unwrap_or("-"), "gateway call");

        if let Some(body) = body {
            tracing::debug!(operation, body = %redacted_json(body), "gateway call body");
        }
    }

    fn log_outcome<T>(operation: &str, result: &GatewayResult<T>, describe: impl Fn(&T) -> String) {
        match result {
            Ok(value) => {
                tracing::info!(operation, result = %describe(value), "gateway call succeeded")
            }
            Err(GatewayError::Validation { message, messages }) => tracing::warn!(
                operation,
                message = %message,
                messages = ?messages,
                "gateway validation failed"
            ),
            Err(err) => tracing::error!(
                operation,
                kind = err.kind(),
                error = %err,
                "gateway call failed"
            ),
        }
    }
}

fn describe_transaction(tx: &GatewayTransaction) -> String {
    format!("id={} status={}", tx.id, tx.status)
}

#[async_trait]
impl<G: GatewayClient> GatewayClient for LoggingGateway<G> {
    async fn create_transaction(
        &self,
        payload: &TransactionPayload,
    ) -> GatewayResult<GatewayTransaction> {
        Self::log_request("create_transaction", Some(&payload.reference), Some(payload));
        let result = self.inner.create_transaction(payload).await;
        Self::log_outcome("create_transaction", &result, describe_transaction);
        result
    }

    async fn create_payment_link(
        &self,
        payload: &PaymentLinkPayload,
    ) -> GatewayResult<GatewayPaymentLink> {
        Self::log_request("create_payment_link", Some(&payload.sku), Some(payload));
        let result = self.inner.create_payment_link(payload).await;
        Self::log_outcome("create_payment_link", &result, |link| {
            format!("id={}", link.id)
        });
        result
    }

    async fn confirm_transaction(
        &self,
        transaction_id: &str,
        payload: &ConfirmPayload,
    ) -> GatewayResult<GatewayTransaction> {
        Self::log_request("confirm_transaction", Some(transaction_id), Some(payload));
        let result = self.inner.confirm_transaction(transaction_id, payload).await;
        Self::log_outcome("confirm_transaction", &result, describe_transaction);
        result
    }

    async fn get_transaction_status(
        &self,
        transaction_id: &str,
    ) -> GatewayResult<GatewayTransaction> {
        Self::log_request::<()>("get_transaction_status", Some(transaction_id), None);
        let result = self.inner.get_transaction_status(transaction_id).await;
        Self::log_outcome("get_transaction_status", &result, describe_transaction);
        result
    }

    async fn void_transaction(
        &self,
        transaction_id: &str,
        payload: &VoidPayload,
    ) -> GatewayResult<GatewayVoid> {
        Self::log_request("void_transaction", Some(transaction_id), Some(payload));
        let result = self.inner.void_transaction(transaction_id, payload).await;
        Self::log_outcome("void_transaction", &result, |void| {
            format!("id={}", void.id.as_deref().unwrap_or("-"))
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::types::{CustomerData, PaymentMethod};
    use serde_json::json;

    #[test]
    fn secrets_are_masked_in_logged_bodies() {
        let payload = TransactionPayload {
            amount_in_cents: 15_000_000,
            currency: "COP".to_string(),
            customer_email: "ana@example.com".to_string(),
            reference: "PAY-1-abc-XYZ".to_string(),
            payment_method: PaymentMethod {
                method_type: "CARD".to_string(),
                details: serde_json::from_value(json!({ "token": "tok_test_4242", "installments": 1 }))
                    .unwrap(),
            },
            acceptance_token: "eyJhbGciOi".to_string(),
            accept_personal_auth: Some("eyJwZXJzb25hbA".to_string()),
            customer_data: CustomerData {
                full_name: "Ana Gómez".to_string(),
                phone_number: Some("+573001234567".to_string()),
                legal_id: Some("1020304050".to_string()),
                legal_id_type: Some("CC".to_string()),
            },
            redirect_url: None,
        };

        let logged = redacted_json(&payload);

        for secret in ["tok_test_4242", "eyJhbGciOi", "eyJwZXJzb25hbA", "1020304050", "+573001234567"] {
            assert!(!logged.contains(secret), "{secret} leaked into {logged}");
        }
        assert!(logged.contains("PAY-1-abc-XYZ"));
        assert!(logged.contains("\"installments\":1"));
        assert!(logged.contains("[REDACTED]"));
    }

    #[test]
    fn nested_arrays_are_walked() {
        let logged = redacted_json(&json!({ "sources": [{ "payment_source_id": 77 }], "legal_id": null }));

        assert_eq!(
            logged,
            r#"{"legal_id":null,"sources":[{"payment_source_id":"[REDACTED]"}]}"#
        );
    }
}

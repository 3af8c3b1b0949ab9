//! Payment gateway client.
//!
//! `GatewayClient` is the seam between the payment services and the external
//! card processor. `HttpGatewayClient` talks to the real API and
//! `LoggingGateway` wraps any client with request/outcome logging. Failures
//! are values, so the retry policy in the transaction service is a match on
//! `GatewayError` rather than error-type inspection.

pub mod http;
pub mod logging;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;

use self::types::{
    ConfirmPayload, FieldMessages, GatewayPaymentLink, GatewayTransaction, GatewayVoid,
    PaymentLinkPayload, TransactionPayload, VoidPayload,
};

pub use self::http::HttpGatewayClient;
pub use self::logging::LoggingGateway;

/// Why a gateway call failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    /// HTTP 422: the gateway rejected the input. Expected and retryable once
    /// for transaction creation.
    #[error("{message}")]
    Validation {
        message: String,
        messages: FieldMessages,
    },

    /// Any other non-success HTTP status.
    #[error("gateway responded {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Network failure, timeout or an undecodable response.
    #[error("gateway request failed: {0}")]
    Transport(String),
}

impl GatewayError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Short label used in logs and persisted attempt records.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_failed",
            Self::Rejected { .. } => "rejected",
            Self::Transport(_) => "transport_failed",
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Operations the payment core needs from the gateway.
///
/// Implementations perform network I/O only and never touch the ledger.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    async fn create_transaction(
        &self,
        payload: &TransactionPayload,
    ) -> GatewayResult<GatewayTransaction>;

    async fn create_payment_link(
        &self,
        payload: &PaymentLinkPayload,
    ) -> GatewayResult<GatewayPaymentLink>;

    async fn confirm_transaction(
        &self,
        transaction_id: &str,
        payload: &ConfirmPayload,
    ) -> GatewayResult<GatewayTransaction>;

    async fn get_transaction_status(&self, transaction_id: &str)
    -> GatewayResult<GatewayTransaction>;

    async fn void_transaction(
        &self,
        transaction_id: &str,
        payload: &VoidPayload,
    ) -> GatewayResult<GatewayVoid>;
}

/// Shared clients delegate to the inner implementation.
#[async_trait]
impl<G: GatewayClient + ?Sized> GatewayClient for Arc<G> {
    async fn create_transaction(
        &self,
        payload: &TransactionPayload,
    ) -> GatewayResult<GatewayTransaction> {
        (**self).create_transaction(payload).await
    }

    async fn create_payment_link(
        &self,
        payload: &PaymentLinkPayload,
    ) -> GatewayResult<GatewayPaymentLink> {
        (**self).create_payment_link(payload).await
    }

    async fn confirm_transaction(
        &self,
        transaction_id: &str,
        payload: &ConfirmPayload,
    ) -> GatewayResult<GatewayTransaction> {
        (**self).confirm_transaction(transaction_id, payload).await
    }

    async fn get_transaction_status(
        &self,
        transaction_id: &str,
    ) -> GatewayResult<GatewayTransaction> {
        (**self).get_transaction_status(transaction_id).await
    }

    async fn void_transaction(
        &self,
        transaction_id: &str,
        payload: &VoidPayload,
    ) -> GatewayResult<GatewayVoid> {
        (**self).void_transaction(transaction_id, payload).await
    }
}

//! Shared application state handed to every handler.

use std::sync::Arc;

use crate::config::{Config, GatewayEnvironment};
use crate::gateway::GatewayClient;
use crate::services::catalog::Catalog;
use crate::services::ledger::LedgerStore;

/// Non-secret gateway settings plus the webhook secret.
#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub provider: String,
    pub public_key: String,
    pub environment: GatewayEnvironment,
    /// `None` runs webhook verification in degraded (unverified) mode
    pub events_secret: Option<String>,
    /// Prefix of hosted payment link URLs
    pub checkout_url: String,
    /// Default post-payment redirect
    pub redirect_url: Option<String>,
}

impl PaymentSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            provider: config.gateway_provider.clone(),
            public_key: config.gateway_public_key.clone(),
            environment: config.gateway_environment,
            events_secret: config.events_secret(),
            checkout_url: config.gateway_checkout_url.clone(),
            redirect_url: config.payment_redirect_url.clone(),
        }
    }
}

/// Collaborators of the payment services. Cloned per request; all mutable
/// state lives in the ledger.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn GatewayClient>,
    pub ledger: Arc<dyn LedgerStore>,
    pub catalog: Arc<dyn Catalog>,
    pub settings: Arc<PaymentSettings>,
}

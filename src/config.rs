//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use serde::{Deserialize, Serialize};

/// Gateway environment the credentials belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayEnvironment {
    Sandbox,
    Production,
}

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid environment: {0}")]
    Env(#[from] envy::Error),

    #[error("GATEWAY_EVENTS_SECRET is required when GATEWAY_ENVIRONMENT=production")]
    MissingEventsSecret,

    #[error("invalid GATEWAY_BASE_URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
}

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `GATEWAY_PRIVATE_KEY` / `GATEWAY_PUBLIC_KEY` (required): gateway credentials
/// - `GATEWAY_EVENTS_SECRET` (optional in sandbox): shared secret for webhook signatures
/// - `GATEWAY_BASE_URL`, `GATEWAY_ENVIRONMENT`, `GATEWAY_PROVIDER`,
///   `GATEWAY_TIMEOUT_SECS`, `GATEWAY_CHECKOUT_URL`, `PAYMENT_REDIRECT_URL` (optional)
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_base_url")]
    pub gateway_base_url: String,

    pub gateway_private_key: String,

    pub gateway_public_key: String,

    #[serde(default)]
    pub gateway_events_secret: Option<String>,

    #[serde(default = "default_environment")]
    pub gateway_environment: GatewayEnvironment,

    #[serde(default = "default_provider")]
    pub gateway_provider: String,

    #[serde(default = "default_timeout_secs")]
    pub gateway_timeout_secs: u64,

    #[serde(default = "default_checkout_url")]
    pub gateway_checkout_url: String,

    #[serde(default)]
    pub payment_redirect_url: Option<String>,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_base_url() -> String {
    "https://sandbox.wompi.co/v1".to_string()
}

fn default_environment() -> GatewayEnvironment {
    GatewayEnvironment::Sandbox
}

fn default_provider() -> String {
    "wompi".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_checkout_url() -> String {
    "https://checkout.wompi.co/l/".to_string()
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    /// - The webhook secret is missing in production
    pub fn from_env() -> Result<Self, ConfigError> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are automatically converted: database_url -> DATABASE_URL
        let config = envy::from_env::<Config>()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would run webhooks unauthenticated in production.
    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.gateway_base_url)?;

        let secret_missing = self
            .gateway_events_secret
            .as_deref()
            .is_none_or(|s| s.trim().is_empty());

        if secret_missing && self.gateway_environment == GatewayEnvironment::Production {
            return Err(ConfigError::MissingEventsSecret);
        }

        Ok(())
    }

    /// Webhook secret, with blank values treated as absent.
    pub fn events_secret(&self) -> Option<String> {
        self.gateway_events_secret
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

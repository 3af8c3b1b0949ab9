//! Data models: ledger rows, catalog views and API bodies.

/// Users and packages read from the booking catalog
pub mod catalog;
/// `/payments` request and response bodies
pub mod payment;
pub mod payment_transaction;
pub mod payment_webhook;
pub mod purchase;

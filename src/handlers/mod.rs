//! HTTP request handlers (route handlers).
//!
//! Each handler is a thin async function that extracts the request, calls
//! the matching service with the shared `AppState`, and shapes the response.

pub mod health;
/// Hosted payment links and public checkout configuration
pub mod payment_links;
pub mod refunds;
/// Direct transactions: create, confirm, status
pub mod transactions;
/// Inbound gateway events
pub mod webhooks;

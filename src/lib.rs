//! Payment core of the clinic booking platform.
//!
//! Orchestrates card-processor payments for package purchases: validates and
//! opens purchases, creates gateway transactions and payment links, verifies
//! and applies gateway webhooks, and keeps the purchase → transaction →
//! webhook ledger consistent.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Gateway**: reqwest client behind the `GatewayClient` trait
//! - **Webhooks**: HMAC-SHA256 signatures over the raw body
//! - **Format**: JSON requests/responses

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the HTTP router with all payment routes.
pub fn router(state: AppState) -> Router {
    let payments = Router::new()
        .route(
            "/transactions",
            post(handlers::transactions::create_transaction),
        )
        .route(
            "/transactions/{id}/confirm",
            post(handlers::transactions::confirm_transaction),
        )
        .route(
            "/transactions/{id}/status",
            get(handlers::transactions::transaction_status),
        )
        .route(
            "/payment-links",
            post(handlers::payment_links::create_payment_link),
        )
        .route("/webhooks", post(handlers::webhooks::receive_webhook))
        .route("/refunds", post(handlers::refunds::create_refund))
        .route("/config", get(handlers::payment_links::payment_config));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/payments", payments)
        // Add distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

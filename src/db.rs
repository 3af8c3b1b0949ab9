//! Postgres pool and schema migrations for the payment ledger.
//!
//! The ledger tables (`purchases`, `payment_transactions`, `payment_webhooks`)
//! and their enum types live in `migrations/`.

use std::time::Duration;

use sqlx::{Pool, Postgres};

/// Shared PostgreSQL connection pool.
pub type DbPool = Pool<Postgres>;

/// Create the connection pool used by the ledger and catalog lookups.
///
/// Status application holds row locks for the duration of a short
/// transaction, so acquiring a connection is bounded rather than unbounded.
///
/// # Errors
///
/// Returns an error if the connection string is invalid or the server
/// cannot be reached.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

/// Apply pending migrations from `./migrations`.
///
/// Applied migrations are tracked in `_sqlx_migrations`, so this is safe to
/// run on every start.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

//! Lookups into the booking catalog (users and packages).
//!
//! The tables belong to the CRUD layer; payments only read them to validate
//! and enrich a purchase at creation time.

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::DbPool;
use crate::models::catalog::{Package, User};
use crate::services::ledger::LedgerError;

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, LedgerError>;

    /// Active packages only.
    async fn find_package(&self, package_id: Uuid) -> Result<Option<Package>, LedgerError>;
}

#[derive(Clone)]
pub struct PgCatalog {
    pool: DbPool,
}

impl PgCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, LedgerError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, full_name, phone_number FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_package(&self, package_id: Uuid) -> Result<Option<Package>, LedgerError> {
        let package = sqlx::query_as::<_, Package>(
            r#"
            SELECT id, name, price_in_cents, currency, validity_days
            FROM packages
            WHERE id = $1 AND is_active = true
            "#,
        )
        .bind(package_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(package)
    }
}

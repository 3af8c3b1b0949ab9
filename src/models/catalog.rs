//! Read-only views of booking entities owned by the CRUD layer.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Registered platform user, as far as payments need it.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub phone_number: Option<String>,
}

/// Purchasable bundle of sessions/services.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Package {
    pub id: Uuid,
    pub name: String,
    pub price_in_cents: i64,
    pub currency: String,
    /// Days a purchase of this package stays usable
    pub validity_days: i32,
}

impl Package {
    /// Expiration of a purchase of this package created at `purchased_at`.
    ///
    /// `None` when the validity period runs past the representable range.
    pub fn expires_at(&self, purchased_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        Duration::try_days(i64::from(self.validity_days))
            .and_then(|validity| purchased_at.checked_add_signed(validity))
    }

    /// Whether `amount_in_cents` in `currency` is this package's price.
    pub fn is_priced_at(&self, amount_in_cents: i64, currency: &str) -> bool {
        self.price_in_cents == amount_in_cents
            && self.currency.trim().eq_ignore_ascii_case(currency.trim())
    }
}

//! Per-currency amount bounds.
//!
//! Amounts are integers in minor units (cents). Validation runs before any
//! ledger write or gateway call.

use serde::Serialize;

/// Accepted range for one currency, in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AmountBounds {
    pub currency: &'static str,
    pub min_in_cents: i64,
    pub max_in_cents: i64,
}

/// Supported currencies. COP has no circulating cents, so its minimum unit
/// count is far larger than USD's.
pub const AMOUNT_BOUNDS: &[AmountBounds] = &[
    AmountBounds {
        currency: "COP",
        min_in_cents: 10_000,
        max_in_cents: 5_000_000_000,
    },
    AmountBounds {
        currency: "USD",
        min_in_cents: 100,
        max_in_cents: 1_000_000,
    },
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("Currency {0} is not supported")]
    UnsupportedCurrency(String),

    #[error("Amount {amount} is below the minimum of {min} for {currency}")]
    BelowMinimum {
        amount: i64,
        min: i64,
        currency: String,
    },

    #[error("Amount {amount} exceeds the maximum of {max} for {currency}")]
    AboveMaximum {
        amount: i64,
        max: i64,
        currency: String,
    },
}

/// Bounds for `currency`, case-insensitive.
pub fn bounds_for(currency: &str) -> Option<&'static AmountBounds> {
    AMOUNT_BOUNDS
        .iter()
        .find(|b| b.currency.eq_ignore_ascii_case(currency.trim()))
}

/// Check `amount_in_cents` against the bounds of `currency` (inclusive).
pub fn validate_amount(amount_in_cents: i64, currency: &str) -> Result<(), AmountError> {
    let bounds = bounds_for(currency)
        .ok_or_else(|| AmountError::UnsupportedCurrency(currency.trim().to_string()))?;

    if amount_in_cents < bounds.min_in_cents {
        return Err(AmountError::BelowMinimum {
            amount: amount_in_cents,
            min: bounds.min_in_cents,
            currency: bounds.currency.to_string(),
        });
    }

    if amount_in_cents > bounds.max_in_cents {
        return Err(AmountError::AboveMaximum {
            amount: amount_in_cents,
            max: bounds.max_in_cents,
            currency: bounds.currency.to_string(),
        });
    }

    Ok(())
}

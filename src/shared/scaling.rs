//! Pure conversion between human token amounts and integer base units.
//!
//! All math uses `rust_decimal::Decimal` for exact integer arithmetic.
//! Rounding at the last representable digit is banker's rounding
//! (midpoint-nearest-even); floats are never involved.
//!
//! A one-decimal error here silently moves the swap amount by a factor of
//! ten, so this module is the single source of truth for the conversion.

use rust_decimal::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Errors that can occur while scaling an amount.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScalingError {
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(String),

    #[error("overflow: {context}")]
    Overflow { context: String },

    #[error("amount {0} rounds to zero base units")]
    ZeroAmount(String),
}

/// Convert a human-readable amount into integer base units.
///
/// ```text
/// base_units = round_half_even(amount * 10^decimals)
/// ```
pub fn to_base_units(amount: Decimal, decimals: u8) -> Result<u64, ScalingError> {
    if amount <= Decimal::ZERO {
        return Err(ScalingError::NonPositiveAmount(amount.to_string()));
    }

    let multiplier = pow10(decimals)?;
    let scaled = amount
        .checked_mul(multiplier)
        .ok_or_else(|| ScalingError::Overflow {
            context: format!("{amount} * 10^{decimals}"),
        })?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven);

    let units = scaled.to_u64().ok_or_else(|| ScalingError::Overflow {
        context: format!("{scaled} does not fit in u64"),
    })?;

    if units == 0 {
        return Err(ScalingError::ZeroAmount(amount.to_string()));
    }
    Ok(units)
}

/// Convert integer base units back to a human-readable amount.
pub fn from_base_units(units: u64, decimals: u8) -> Decimal {
    let mut value = Decimal::from(units);
    value.set_scale(decimals as u32).unwrap_or_default();
    value.normalize()
}

fn pow10(decimals: u8) -> Result<Decimal, ScalingError> {
    10u64
        .checked_pow(decimals as u32)
        .map(Decimal::from)
        .ok_or_else(|| ScalingError::Overflow {
            context: format!("10^{decimals} overflow"),
        })
}

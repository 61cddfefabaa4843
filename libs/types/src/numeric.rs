//! Human amount <-> ledger base unit conversion
//!
//! The ledger only tracks integer base units. Human amounts are scaled by
//! `10^decimals` and rounded to the nearest integer, ties away from zero.
//! Converting back is exact division; no rounding is applied on read.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use thiserror::Error;

/// Precision used when a registry session does not specify one.
pub const DEFAULT_DECIMALS: u8 = 9;

/// Largest precision whose base units still fit comfortably in a `u64`.
pub const MAX_DECIMALS: u8 = 18;

/// Reasons a human amount cannot be submitted to the ledger.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount is not a finite number")]
    NotFinite,

    #[error("amount must be positive, got {0}")]
    NotPositive(String),

    #[error("amount {amount} does not fit in base units at {decimals} decimals")]
    Overflow { amount: String, decimals: u8 },

    #[error("amount {amount} is below one base unit at {decimals} decimals")]
    BelowPrecision { amount: String, decimals: u8 },

    #[error("unsupported precision {0} (max 18)")]
    UnsupportedDecimals(u8),
}

/// Reject precisions that cannot be represented in `u64` base units.
pub fn validate_decimals(decimals: u8) -> Result<u8, AmountError> {
    if decimals > MAX_DECIMALS {
        return Err(AmountError::UnsupportedDecimals(decimals));
    }
    Ok(decimals)
}

fn scale(decimals: u8) -> Decimal {
    Decimal::from(10u64.pow(u32::from(decimals)))
}

/// Like [`to_base_units`] but also rejects amounts that round to zero base units.
pub fn to_positive_base_units(amount: f64, decimals: u8) -> Result<u64, AmountError> {
    match to_base_units(amount, decimals)? {
        0 => Err(AmountError::BelowPrecision {
            amount: amount.to_string(),
            decimals,
        }),
        raw => Ok(raw),
    }
}

/// Convert an exact decimal amount into base units.
pub fn decimal_to_base_units(amount: Decimal, decimals: u8) -> Result<u64, AmountError> {
    validate_decimals(decimals)?;
    if amount <= Decimal::ZERO {
        return Err(AmountError::NotPositive(amount.to_string()));
    }

    let overflow = || AmountError::Overflow {
        amount: amount.to_string(),
        decimals,
    };

    let scaled = amount
        .checked_mul(scale(decimals))
        .ok_or_else(overflow)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    scaled.to_u64().ok_or_else(overflow)
}

/// Convert a human-entered amount into base units: `round(amount × 10^decimals)`.
///
/// Fails for NaN/infinite input, non-positive amounts, and results that do
/// not fit in a `u64`. An amount that rounds to zero base units is accepted
/// and yields `0`; use [`to_positive_base_units`] to reject those too.
pub fn to_base_units(amount: f64, decimals: u8) -> Result<u64, AmountError> {
    if !amount.is_finite() {
        return Err(AmountError::NotFinite);
    }
    if amount <= 0.0 {
        return Err(AmountError::NotPositive(amount.to_string()));
    }
    let exact = Decimal::from_f64(amount).ok_or_else(|| AmountError::Overflow {
        amount: amount.to_string(),
        decimals,
    })?;
    decimal_to_base_units(exact, decimals)
}

/// Convert ledger base units back into a human amount: `raw / 10^decimals`.
pub fn from_base_units(raw: u64, decimals: u8) -> Decimal {
    Decimal::from_i128_with_scale(i128::from(raw), u32::from(decimals)).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_whole_amount_scales() {
        assert_eq!(to_base_units(100.0, 9).unwrap(), 100_000_000_000);
        assert_eq!(to_base_units(1.0, 0).unwrap(), 1);
    }

    #[test]
    fn test_fractional_amount_scales() {
        assert_eq!(to_base_units(1.5, 2).unwrap(), 150);
        assert_eq!(to_base_units(0.1, 9).unwrap(), 100_000_000);
        assert_eq!(to_base_units(0.000000001, 9).unwrap(), 1);
    }

    #[test]
    fn test_midpoint_rounds_away_from_zero() {
        assert_eq!(decimal_to_base_units(Decimal::new(25, 1), 0).unwrap(), 3);
        assert_eq!(decimal_to_base_units(Decimal::new(35, 1), 0).unwrap(), 4);
        assert_eq!(decimal_to_base_units(Decimal::new(1234, 3), 2).unwrap(), 123);
        assert_eq!(decimal_to_base_units(Decimal::new(1235, 3), 2).unwrap(), 124);
    }

    #[test]
    fn test_rejects_non_positive() {
        assert!(matches!(to_base_units(0.0, 9), Err(AmountError::NotPositive(_))));
        assert!(matches!(to_base_units(-5.0, 9), Err(AmountError::NotPositive(_))));
    }

    #[test]
    fn test_rejects_non_finite() {
        assert_eq!(to_base_units(f64::NAN, 9), Err(AmountError::NotFinite));
        assert_eq!(to_base_units(f64::INFINITY, 9), Err(AmountError::NotFinite));
        assert_eq!(to_base_units(f64::NEG_INFINITY, 9), Err(AmountError::NotFinite));
    }

    #[test]
    fn test_positive_base_units_rejects_dust() {
        assert_eq!(to_base_units(0.0000000001, 9).unwrap(), 0);
        assert!(matches!(
            to_positive_base_units(0.0000000001, 9),
            Err(AmountError::BelowPrecision { decimals: 9, .. })
        ));
        assert_eq!(to_positive_base_units(2.0, 9).unwrap(), 2_000_000_000);
    }

    #[test]
    fn test_rejects_overflow() {
        assert!(matches!(
            to_base_units(1e12, 9),
            Err(AmountError::Overflow { decimals: 9, .. })
        ));
    }

    #[test]
    fn test_rejects_unsupported_decimals() {
        assert_eq!(
            to_base_units(1.0, 19),
            Err(AmountError::UnsupportedDecimals(19))
        );
        assert!(validate_decimals(MAX_DECIMALS).is_ok());
    }

    #[test]
    fn test_from_base_units_is_exact() {
        assert_eq!(from_base_units(100_000_000_000, 9), Decimal::from(100));
        assert_eq!(from_base_units(1, 9), Decimal::new(1, 9));
        assert_eq!(from_base_units(0, 9), Decimal::ZERO);
        assert_eq!(from_base_units(u64::MAX, 0), Decimal::from(u64::MAX));
    }

    #[test]
    fn test_from_base_units_display_is_normalized() {
        assert_eq!(from_base_units(75_000_000_000, 9).to_string(), "75");
        assert_eq!(from_base_units(1_500, 3).to_string(), "1.5");
    }

    proptest! {
        #[test]
        fn prop_matches_rounded_product(units in 1u64..1_000_000_000_000u64, d in 0u8..=9) {
            // Amounts that are exact multiples of one base unit convert exactly.
            let amount = Decimal::from_i128_with_scale(i128::from(units), u32::from(d));
            prop_assert_eq!(decimal_to_base_units(amount, d).unwrap(), units);
        }

        #[test]
        fn prop_round_trip_within_one_unit(a in 0.000_001f64..1_000_000.0f64, d in 0u8..=9) {
            if let Ok(raw) = to_base_units(a, d) {
                let back = from_base_units(raw, d);
                let original = Decimal::from_f64(a).unwrap();
                let unit = Decimal::from_i128_with_scale(1, u32::from(d));
                prop_assert!((back - original).abs() <= unit);
            }
        }
    }
}

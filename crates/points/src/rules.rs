//! Conversion rules between money and points.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::LedgerError;

/// Points earned per currency unit of an activity's monetary value.
pub const POINTS_PER_CURRENCY_UNIT: i64 = 2;

/// Monetary worth of one redeemed point, in cents.
pub const CENTS_PER_POINT: i64 = 10;

/// Points credited for an activity worth `value` currency units.
///
/// `floor(value × POINTS_PER_CURRENCY_UNIT)`; never fractional.
pub fn earned_points(value: Decimal) -> Result<i64, LedgerError> {
    if value.is_sign_negative() {
        return Err(LedgerError::validation("value must not be negative"));
    }
    value
        .checked_mul(Decimal::from(POINTS_PER_CURRENCY_UNIT))
        .map(|v| v.floor())
        .and_then(|v| v.to_i64())
        .ok_or(LedgerError::Overflow)
}

/// Monetary value in cents of redeeming `points`.
pub fn points_to_cents(points: i64) -> Result<i64, LedgerError> {
    points.checked_mul(CENTS_PER_POINT).ok_or(LedgerError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn earned_points_doubles_and_floors() {
        assert_eq!(earned_points(dec("120000")).unwrap(), 240_000);
        assert_eq!(earned_points(dec("10.75")).unwrap(), 21);
        assert_eq!(earned_points(dec("0.49")).unwrap(), 0);
        assert_eq!(earned_points(dec("0.5")).unwrap(), 1);
    }

    #[test]
    fn decimal_values_do_not_suffer_float_rounding() {
        // 0.1 + 0.2 style inputs stay exact.
        assert_eq!(earned_points(dec("1.15")).unwrap(), 2);
        assert_eq!(earned_points(dec("4.35")).unwrap(), 8);
    }

    #[test]
    fn huge_values_overflow_instead_of_wrapping() {
        assert_eq!(earned_points(Decimal::MAX), Err(LedgerError::Overflow));
    }

    #[test]
    fn redemption_value_is_ten_cents_per_point() {
        assert_eq!(points_to_cents(300).unwrap(), 3000);
        assert_eq!(points_to_cents(i64::MAX), Err(LedgerError::Overflow));
    }
}

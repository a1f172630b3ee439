//! Fixed-point helpers for monetary arithmetic.
//!
//! Balances, cash flows and taxes are carried as [`Decimal`] so that values
//! accumulated over a multi-decade path do not drift. Returns and volatility
//! stay in `f64` because they come out of a sampling distribution.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

pub type Money = Decimal;

/// Upper bound applied to any single balance after growth.
pub const MONEY_CAP: Money = dec!(1_000_000_000_000_000);

const FACTOR_DP: u32 = 12;

pub fn to_money(value: f64) -> Money {
    if !value.is_finite() {
        return Decimal::ZERO;
    }
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

pub fn to_rate(value: f64) -> Decimal {
    if !value.is_finite() {
        return Decimal::ZERO;
    }
    Decimal::from_f64(value)
        .map(|d| d.round_dp(FACTOR_DP))
        .unwrap_or(Decimal::ZERO)
}

pub fn to_f64(value: Money) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

pub fn round_cents(value: Money) -> Money {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn clamp_non_negative(value: Money) -> Money {
    value.max(Decimal::ZERO)
}

/// `(1 + rate)^years`, compounded in fixed point.
pub fn growth_factor(rate: Decimal, years: u32) -> Decimal {
    let step = Decimal::ONE + rate;
    let mut factor = Decimal::ONE;
    for _ in 0..years {
        factor = match factor.checked_mul(step) {
            Some(v) => v.round_dp(FACTOR_DP),
            None => return MONEY_CAP,
        };
    }
    factor
}

/// Multiplies, saturating at [`MONEY_CAP`] instead of overflowing.
pub fn scale(amount: Money, factor: Decimal) -> Money {
    amount
        .checked_mul(factor)
        .map(|v| v.min(MONEY_CAP))
        .unwrap_or(MONEY_CAP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_factor_matches_hand_compounding() {
        assert_eq!(growth_factor(dec!(0.10), 0), Decimal::ONE);
        assert_eq!(growth_factor(dec!(0.10), 3), dec!(1.331));
        assert_eq!(growth_factor(dec!(0.03), 2), dec!(1.0609));
    }

    #[test]
    fn round_cents_rounds_half_away_from_zero() {
        assert_eq!(round_cents(dec!(10.005)), dec!(10.01));
        assert_eq!(round_cents(dec!(10.004)), dec!(10.00));
    }

    #[test]
    fn non_finite_floats_become_zero() {
        assert_eq!(to_money(f64::NAN), Decimal::ZERO);
        assert_eq!(to_money(f64::INFINITY), Decimal::ZERO);
        assert_eq!(to_rate(f64::NEG_INFINITY), Decimal::ZERO);
    }

    #[test]
    fn scale_saturates_at_cap() {
        assert_eq!(scale(MONEY_CAP, dec!(2)), MONEY_CAP);
        assert_eq!(scale(dec!(100), dec!(1.5)), dec!(150.0));
    }
}

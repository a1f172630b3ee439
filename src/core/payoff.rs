//! Amortization math for recurring debts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::money::{Money, to_f64};

pub const PAYOFF_CAP_MONTHS: u32 = 600;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayoffOutcome {
    Bounded { months: u32 },
    NeverWithinCap,
}

impl PayoffOutcome {
    pub fn months(self) -> Option<u32> {
        match self {
            PayoffOutcome::Bounded { months } => Some(months),
            PayoffOutcome::NeverWithinCap => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Debt {
    pub name: String,
    pub balance: Money,
    pub annual_rate: f64,
    pub monthly_payment: Money,
}

impl Debt {
    pub fn payoff(&self) -> PayoffOutcome {
        months_to_payoff(self.balance, self.annual_rate, self.monthly_payment)
    }

    /// Last age (inclusive) at which a payment is still due, or `None` if the
    /// debt is never cleared within the cap. Payments start the year after
    /// `current_age`, the first projected year.
    pub fn final_payment_age(&self, current_age: u32) -> Option<u32> {
        let months = self.payoff().months()?;
        if months == 0 {
            return Some(current_age);
        }
        Some(current_age + 1 + (months - 1) / 12)
    }

    /// Annual payment due at `age`; nothing is due at or before `current_age`.
    pub fn annual_payment_at(&self, age: u32, current_age: u32) -> Money {
        if age <= current_age || self.monthly_payment <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        match self.final_payment_age(current_age) {
            Some(last) if age > last => Decimal::ZERO,
            _ => self.monthly_payment * Decimal::from(12),
        }
    }
}

/// Months until `balance` is repaid at `monthly_payment` with interest compounding monthly.
pub fn months_to_payoff(balance: Money, annual_rate: f64, monthly_payment: Money) -> PayoffOutcome {
    if balance <= Decimal::ZERO {
        return PayoffOutcome::Bounded { months: 0 };
    }
    if monthly_payment <= Decimal::ZERO {
        return PayoffOutcome::NeverWithinCap;
    }

    let balance = to_f64(balance);
    let payment = to_f64(monthly_payment);
    let monthly_rate = annual_rate / 12.0;

    let months = if !monthly_rate.is_finite() || monthly_rate.abs() < 1e-12 {
        balance / payment
    } else {
        let interest_fraction = monthly_rate * balance / payment;
        if interest_fraction >= 1.0 {
            return PayoffOutcome::NeverWithinCap;
        }
        let numerator = -(1.0 - interest_fraction).ln();
        let denominator = (1.0 + monthly_rate).ln();
        if !numerator.is_finite() || !denominator.is_finite() || denominator <= 0.0 {
            return PayoffOutcome::NeverWithinCap;
        }
        numerator / denominator
    };

    if !months.is_finite() || months < 0.0 {
        return PayoffOutcome::NeverWithinCap;
    }
    let months = months.ceil();
    if months > PAYOFF_CAP_MONTHS as f64 {
        PayoffOutcome::NeverWithinCap
    } else {
        PayoffOutcome::Bounded {
            months: months as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn zero_rate_divides_balance_by_payment() {
        assert_eq!(
            months_to_payoff(dec!(1000), 0.0, dec!(100)),
            PayoffOutcome::Bounded { months: 10 }
        );
        assert_eq!(
            months_to_payoff(dec!(1050), 0.0, dec!(100)),
            PayoffOutcome::Bounded { months: 11 }
        );
    }

    #[test]
    fn standard_mortgage_pays_off_in_about_thirty_years() {
        // $200k at 6% with the payment rounded up to the cent.
        let outcome = months_to_payoff(dec!(200000), 0.06, dec!(1199.11));
        assert_eq!(outcome, PayoffOutcome::Bounded { months: 360 });
    }

    #[test]
    fn payment_below_interest_never_pays_off() {
        // 12% on 10k is 100/month of interest.
        assert_eq!(
            months_to_payoff(dec!(10000), 0.12, dec!(100)),
            PayoffOutcome::NeverWithinCap
        );
        assert_eq!(
            months_to_payoff(dec!(10000), 0.12, dec!(50)),
            PayoffOutcome::NeverWithinCap
        );
        assert_eq!(
            months_to_payoff(dec!(10000), 0.12, Decimal::ZERO),
            PayoffOutcome::NeverWithinCap
        );
    }

    #[test]
    fn payoff_beyond_cap_is_never() {
        assert_eq!(
            months_to_payoff(dec!(1000000), 0.0, dec!(1)),
            PayoffOutcome::NeverWithinCap
        );
    }

    #[test]
    fn empty_balance_is_already_paid() {
        assert_eq!(
            months_to_payoff(Decimal::ZERO, 0.05, dec!(100)),
            PayoffOutcome::Bounded { months: 0 }
        );
    }

    #[test]
    fn annual_payment_stops_after_payoff_year() {
        let debt = Debt {
            name: "Car loan".to_string(),
            balance: dec!(2400),
            annual_rate: 0.0,
            monthly_payment: dec!(100),
        };
        assert_eq!(debt.final_payment_age(40), Some(42));
        assert_eq!(debt.annual_payment_at(40, 40), Decimal::ZERO);
        assert_eq!(debt.annual_payment_at(41, 40), dec!(1200));
        assert_eq!(debt.annual_payment_at(42, 40), dec!(1200));
        assert_eq!(debt.annual_payment_at(43, 40), Decimal::ZERO);
    }

    #[test]
    fn one_year_debt_is_charged_in_full_over_projected_years() {
        let debt = Debt {
            name: "Phone".to_string(),
            balance: dec!(1200),
            annual_rate: 0.0,
            monthly_payment: dec!(100),
        };
        let charged: Money = (61..=63).map(|age| debt.annual_payment_at(age, 60)).sum();
        assert_eq!(charged, dec!(1200));
        assert_eq!(debt.annual_payment_at(61, 60), dec!(1200));

        let paid_off = Debt {
            balance: Decimal::ZERO,
            ..debt
        };
        assert_eq!(paid_off.annual_payment_at(61, 60), Decimal::ZERO);
    }

    #[test]
    fn unpayable_debt_is_charged_every_year() {
        let debt = Debt {
            name: "Card".to_string(),
            balance: dec!(10000),
            annual_rate: 0.24,
            monthly_payment: dec!(150),
        };
        assert_eq!(debt.payoff(), PayoffOutcome::NeverWithinCap);
        assert_eq!(debt.annual_payment_at(90, 40), dec!(1800));
    }
}

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;

use super::money::{Money, round_cents};
use super::types::{AccountBuckets, TaxRates, WithdrawalStrategy};

pub const RMD_START_AGE: u32 = 73;

/// IRS Uniform Lifetime Table, ages 72 through 119. Ages 120+ use 2.0.
const UNIFORM_LIFETIME_TABLE: [(u32, Decimal); 48] = [
    (72, dec!(27.4)),
    (73, dec!(26.5)),
    (74, dec!(25.5)),
    (75, dec!(24.6)),
    (76, dec!(23.7)),
    (77, dec!(22.9)),
    (78, dec!(22.0)),
    (79, dec!(21.1)),
    (80, dec!(20.2)),
    (81, dec!(19.4)),
    (82, dec!(18.5)),
    (83, dec!(17.7)),
    (84, dec!(16.8)),
    (85, dec!(16.0)),
    (86, dec!(15.2)),
    (87, dec!(14.4)),
    (88, dec!(13.7)),
    (89, dec!(12.9)),
    (90, dec!(12.2)),
    (91, dec!(11.5)),
    (92, dec!(10.8)),
    (93, dec!(10.1)),
    (94, dec!(9.5)),
    (95, dec!(8.9)),
    (96, dec!(8.4)),
    (97, dec!(7.8)),
    (98, dec!(7.3)),
    (99, dec!(6.8)),
    (100, dec!(6.4)),
    (101, dec!(6.0)),
    (102, dec!(5.6)),
    (103, dec!(5.2)),
    (104, dec!(4.9)),
    (105, dec!(4.6)),
    (106, dec!(4.3)),
    (107, dec!(4.1)),
    (108, dec!(3.9)),
    (109, dec!(3.7)),
    (110, dec!(3.5)),
    (111, dec!(3.4)),
    (112, dec!(3.3)),
    (113, dec!(3.1)),
    (114, dec!(3.0)),
    (115, dec!(2.9)),
    (116, dec!(2.8)),
    (117, dec!(2.7)),
    (118, dec!(2.5)),
    (119, dec!(2.3)),
];

const FINAL_DIVISOR: Decimal = dec!(2.0);

pub type BucketAmounts = AccountBuckets;

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalOutcome {
    /// Gross amounts taken out of each bucket.
    pub withdrawals: BucketAmounts,
    pub taxes_paid: Money,
    pub rmd_amount: Money,
    /// After-tax cash delivered toward the need.
    pub net_proceeds: Money,
    /// After-tax RMD proceeds beyond the need, moved into the taxable bucket.
    pub reinvested: Money,
    pub shortfall: Money,
}

impl WithdrawalOutcome {
    pub fn gross_total(&self) -> Money {
        self.withdrawals.total()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Bucket {
    Taxable,
    PreTax,
    Roth,
    Hsa,
}

const TAX_EFFICIENT_ORDER: [Bucket; 4] =
    [Bucket::Taxable, Bucket::PreTax, Bucket::Roth, Bucket::Hsa];

impl Bucket {
    fn balance_mut(self, buckets: &mut AccountBuckets) -> &mut Money {
        match self {
            Bucket::Taxable => &mut buckets.taxable,
            Bucket::PreTax => &mut buckets.pre_tax,
            Bucket::Roth => &mut buckets.roth,
            Bucket::Hsa => &mut buckets.hsa,
        }
    }

    fn balance(self, buckets: &AccountBuckets) -> Money {
        match self {
            Bucket::Taxable => buckets.taxable,
            Bucket::PreTax => buckets.pre_tax,
            Bucket::Roth => buckets.roth,
            Bucket::Hsa => buckets.hsa,
        }
    }

    /// Roth and HSA are treated as tax-free (qualified distributions).
    fn tax_rate(self, rates: &TaxRates) -> Decimal {
        match self {
            Bucket::Taxable => rates.capital_gains_rate(),
            Bucket::PreTax => rates.ordinary(),
            Bucket::Roth | Bucket::Hsa => Decimal::ZERO,
        }
    }
}

pub fn uniform_lifetime_divisor(age: u32) -> Option<Decimal> {
    if age < UNIFORM_LIFETIME_TABLE[0].0 {
        return None;
    }
    UNIFORM_LIFETIME_TABLE
        .iter()
        .find(|(table_age, _)| *table_age == age)
        .map(|(_, divisor)| *divisor)
        .or(Some(FINAL_DIVISOR))
}

pub fn required_minimum_distribution(pre_tax_balance: Money, age: u32) -> Money {
    if age < RMD_START_AGE || pre_tax_balance <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let Some(divisor) = uniform_lifetime_divisor(age) else {
        return Decimal::ZERO;
    };
    round_cents(pre_tax_balance / divisor).min(pre_tax_balance)
}

/// Covers `amount_needed` (after tax) from `buckets` under `strategy`.
///
/// `withdrawal_rate` is only read by [`WithdrawalStrategy::SimpleRate`].
pub fn withdraw(
    strategy: WithdrawalStrategy,
    buckets: &mut AccountBuckets,
    amount_needed: Money,
    age: u32,
    tax_rates: &TaxRates,
    withdrawal_rate: Decimal,
) -> WithdrawalOutcome {
    let need = amount_needed.max(Decimal::ZERO);
    match strategy {
        WithdrawalStrategy::TaxOptimized => withdraw_tax_optimized(buckets, need, age, tax_rates),
        WithdrawalStrategy::SimpleRate => {
            withdraw_simple_rate(buckets, need, tax_rates, withdrawal_rate)
        }
        WithdrawalStrategy::ProRata => withdraw_pro_rata(buckets, need, age, tax_rates),
    }
}

fn withdraw_tax_optimized(
    buckets: &mut AccountBuckets,
    need: Money,
    age: u32,
    rates: &TaxRates,
) -> WithdrawalOutcome {
    let mut outcome = WithdrawalOutcome::default();
    let mut remaining = take_rmd(buckets, need, age, rates, &mut outcome);

    for bucket in TAX_EFFICIENT_ORDER {
        if remaining <= Decimal::ZERO {
            break;
        }
        remaining -= draw_net(bucket, buckets, remaining, rates, &mut outcome);
    }

    outcome.shortfall = remaining.max(Decimal::ZERO);
    outcome
}

fn withdraw_simple_rate(
    buckets: &mut AccountBuckets,
    need: Money,
    rates: &TaxRates,
    withdrawal_rate: Decimal,
) -> WithdrawalOutcome {
    let mut outcome = WithdrawalOutcome::default();
    let total = buckets.total();
    let rate = withdrawal_rate.clamp(Decimal::ZERO, Decimal::ONE);
    if total <= Decimal::ZERO || rate.is_zero() {
        outcome.shortfall = need;
        return outcome;
    }

    let target = round_cents(rate * total);
    let mut shares = TAX_EFFICIENT_ORDER.map(|bucket| {
        let balance = bucket.balance(&*buckets);
        round_cents(target * balance / total).min(balance)
    });

    // Cent residue from rounding goes to the largest bucket that can absorb it.
    let residue = target - shares.iter().copied().sum::<Money>();
    if !residue.is_zero()
        && let Some(idx) = (0..TAX_EFFICIENT_ORDER.len())
            .max_by_key(|&idx| TAX_EFFICIENT_ORDER[idx].balance(&*buckets))
    {
        let balance = TAX_EFFICIENT_ORDER[idx].balance(buckets);
        shares[idx] = (shares[idx] + residue).clamp(Decimal::ZERO, balance);
    }

    for (bucket, gross) in TAX_EFFICIENT_ORDER.into_iter().zip(shares) {
        if gross <= Decimal::ZERO {
            continue;
        }
        let tax = round_cents(gross * bucket.tax_rate(rates));
        *bucket.balance_mut(buckets) -= gross;
        *bucket.balance_mut(&mut outcome.withdrawals) += gross;
        outcome.taxes_paid += tax;
        outcome.net_proceeds += gross - tax;
    }

    outcome.shortfall = (need - outcome.net_proceeds).max(Decimal::ZERO);
    outcome
}

fn withdraw_pro_rata(
    buckets: &mut AccountBuckets,
    need: Money,
    age: u32,
    rates: &TaxRates,
) -> WithdrawalOutcome {
    let mut outcome = WithdrawalOutcome::default();
    let mut remaining = take_rmd(buckets, need, age, rates, &mut outcome);
    if remaining <= Decimal::ZERO {
        return outcome;
    }

    let capacity = |bucket: Bucket, buckets: &AccountBuckets| {
        bucket.balance(buckets) * (Decimal::ONE - bucket.tax_rate(rates))
    };
    let total_capacity: Money = TAX_EFFICIENT_ORDER
        .iter()
        .map(|bucket| capacity(*bucket, &*buckets))
        .sum();

    if total_capacity > Decimal::ZERO {
        let targets = TAX_EFFICIENT_ORDER.map(|bucket| {
            round_cents(remaining * capacity(bucket, &*buckets) / total_capacity)
        });
        for (bucket, target) in TAX_EFFICIENT_ORDER.into_iter().zip(targets) {
            let target = target.min(remaining);
            if target <= Decimal::ZERO {
                continue;
            }
            remaining -= draw_net(bucket, buckets, target, rates, &mut outcome);
        }
    }

    // Rounding or exhausted buckets can leave a few cents; sweep in tax order.
    for bucket in TAX_EFFICIENT_ORDER {
        if remaining <= Decimal::ZERO {
            break;
        }
        remaining -= draw_net(bucket, buckets, remaining, rates, &mut outcome);
    }

    outcome.shortfall = remaining.max(Decimal::ZERO);
    outcome
}

/// Takes any required minimum distribution and returns the need still uncovered.
fn take_rmd(
    buckets: &mut AccountBuckets,
    need: Money,
    age: u32,
    rates: &TaxRates,
    outcome: &mut WithdrawalOutcome,
) -> Money {
    let rmd = required_minimum_distribution(buckets.pre_tax, age);
    if rmd <= Decimal::ZERO {
        return need;
    }

    let tax = round_cents(rmd * rates.ordinary());
    let net = rmd - tax;
    buckets.pre_tax -= rmd;
    outcome.withdrawals.pre_tax += rmd;
    outcome.taxes_paid += tax;
    outcome.rmd_amount = rmd;

    let used = net.min(need);
    outcome.net_proceeds += used;
    let surplus = net - used;
    if surplus > Decimal::ZERO {
        buckets.taxable += surplus;
        outcome.reinvested += surplus;
    }
    need - used
}

/// Sells enough of `bucket`, grossed up for its tax rate, to deliver `target_net`
/// after tax. Returns the net actually delivered, never more than `target_net`.
fn draw_net(
    bucket: Bucket,
    buckets: &mut AccountBuckets,
    target_net: Money,
    rates: &TaxRates,
    outcome: &mut WithdrawalOutcome,
) -> Money {
    let balance = bucket.balance(buckets);
    if target_net <= Decimal::ZERO || balance <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let rate = bucket.tax_rate(rates);
    let gross_needed = (target_net / (Decimal::ONE - rate))
        .round_dp_with_strategy(2, RoundingStrategy::AwayFromZero);

    let (gross, net) = if gross_needed <= balance {
        (gross_needed, target_net)
    } else {
        let net = (balance - round_cents(balance * rate)).min(target_net);
        (balance, net)
    };

    *bucket.balance_mut(buckets) -= gross;
    *bucket.balance_mut(&mut outcome.withdrawals) += gross;
    outcome.taxes_paid += gross - net;
    outcome.net_proceeds += net;
    net
}

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::life_events::LifeEvent;
use super::money::{Money, clamp_non_negative};
use super::payoff::Debt;

/// Highest combined rate accepted for any tax; keeps gross-up denominators positive.
pub const MAX_TAX_RATE: Decimal = dec!(0.95);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStrategy {
    TaxOptimized,
    SimpleRate,
    ProRata,
}

impl WithdrawalStrategy {
    pub const ALL: [WithdrawalStrategy; 3] = [
        WithdrawalStrategy::TaxOptimized,
        WithdrawalStrategy::SimpleRate,
        WithdrawalStrategy::ProRata,
    ];
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionTarget {
    PreTax,
    Taxable,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxRates {
    pub federal: Decimal,
    pub state: Decimal,
    pub capital_gains: Decimal,
}

impl TaxRates {
    pub fn ordinary(&self) -> Decimal {
        (self.federal + self.state).clamp(Decimal::ZERO, MAX_TAX_RATE)
    }

    pub fn capital_gains_rate(&self) -> Decimal {
        self.capital_gains.clamp(Decimal::ZERO, MAX_TAX_RATE)
    }

    pub fn zero() -> Self {
        Self {
            federal: Decimal::ZERO,
            state: Decimal::ZERO,
            capital_gains: Decimal::ZERO,
        }
    }
}

impl Default for TaxRates {
    fn default() -> Self {
        Self {
            federal: dec!(0.12),
            state: dec!(0.05),
            capital_gains: dec!(0.15),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpouseBenefit {
    pub birth_year: i32,
    /// Spouse's own PIA from their earnings record; zero if none.
    pub own_pia: Money,
    pub claiming_age: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SocialSecurityAssumptions {
    None,
    #[serde(rename_all = "camelCase")]
    Manual {
        monthly_benefit: Money,
        claiming_age: u32,
    },
    #[serde(rename_all = "camelCase")]
    Estimated {
        current_salary: Money,
        birth_year: i32,
        claiming_age: u32,
        #[serde(default = "default_career_start_age")]
        career_start_age: u32,
        #[serde(default)]
        manual_pia_override: Option<Money>,
        #[serde(default)]
        spouse: Option<SpouseBenefit>,
    },
}

fn default_career_start_age() -> u32 {
    22
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthcareAssumptions {
    pub is_married: bool,
    pub include_ltc: bool,
    pub ltc_start_age: u32,
    pub ltc_duration_years: u32,
}

impl Default for HealthcareAssumptions {
    fn default() -> Self {
        Self {
            is_married: false,
            include_ltc: false,
            ltc_start_age: 85,
            ltc_duration_years: 3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub current_age: u32,
    pub retirement_age: u32,
    pub life_expectancy: u32,
    pub pre_retirement_return: f64,
    pub post_retirement_return: f64,
    pub volatility: f64,
    pub inflation_rate: Decimal,
    pub medical_inflation_rate: Decimal,
    pub annual_spending: Money,
    pub current_annual_income: Money,
    pub pension_annual_income: Money,
    pub pension_start_age: u32,
    pub social_security: SocialSecurityAssumptions,
    pub healthcare: Option<HealthcareAssumptions>,
    pub withdrawal_strategy: WithdrawalStrategy,
    pub withdrawal_rate: Decimal,
    pub tax_rates: TaxRates,
    pub simulations: u32,
    pub seed: Option<u64>,
    pub life_events: Vec<LifeEvent>,
    pub debts: Vec<Debt>,
}

impl Scenario {
    /// A mid-career household used as the default for config files and tests.
    pub fn sample() -> Self {
        Self {
            current_age: 35,
            retirement_age: 65,
            life_expectancy: 95,
            pre_retirement_return: 0.07,
            post_retirement_return: 0.05,
            volatility: 0.15,
            inflation_rate: dec!(0.025),
            medical_inflation_rate: dec!(0.05),
            annual_spending: dec!(60000),
            current_annual_income: dec!(120000),
            pension_annual_income: Decimal::ZERO,
            pension_start_age: 65,
            social_security: SocialSecurityAssumptions::None,
            healthcare: None,
            withdrawal_strategy: WithdrawalStrategy::TaxOptimized,
            withdrawal_rate: dec!(0.04),
            tax_rates: TaxRates::default(),
            simulations: 1_000,
            seed: None,
            life_events: Vec::new(),
            debts: Vec::new(),
        }
    }

    pub fn has_valid_horizon(&self) -> bool {
        self.life_expectancy > self.current_age
    }

    /// Clamps physically meaningless inputs to zero instead of rejecting them.
    pub fn normalized(&self) -> Self {
        let mut out = self.clone();
        if out.annual_spending < Decimal::ZERO {
            log::warn!("annual spending {} clamped to 0", out.annual_spending);
            out.annual_spending = Decimal::ZERO;
        }
        if out.current_annual_income < Decimal::ZERO {
            log::warn!("annual income {} clamped to 0", out.current_annual_income);
            out.current_annual_income = Decimal::ZERO;
        }
        out.pension_annual_income = clamp_non_negative(out.pension_annual_income);
        if !out.volatility.is_finite() || out.volatility < 0.0 {
            log::warn!("volatility {} clamped to 0", out.volatility);
            out.volatility = 0.0;
        }
        for rate in [
            &mut out.pre_retirement_return,
            &mut out.post_retirement_return,
        ] {
            if !rate.is_finite() {
                log::warn!("non-finite expected return replaced with 0");
                *rate = 0.0;
            }
        }
        out.withdrawal_rate = out.withdrawal_rate.clamp(Decimal::ZERO, Decimal::ONE);
        out
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self::sample()
    }
}

/// The four tax-treatment balances owned by one simulated path.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBuckets {
    pub taxable: Money,
    pub pre_tax: Money,
    pub roth: Money,
    pub hsa: Money,
}

impl AccountBuckets {
    pub fn new(taxable: Money, pre_tax: Money, roth: Money, hsa: Money) -> Self {
        Self {
            taxable,
            pre_tax,
            roth,
            hsa,
        }
    }

    pub fn total(&self) -> Money {
        self.taxable + self.pre_tax + self.roth + self.hsa
    }

    pub fn is_empty(&self) -> bool {
        self.total() <= Decimal::ZERO
    }

    pub fn clamped(self) -> Self {
        Self {
            taxable: clamp_non_negative(self.taxable),
            pre_tax: clamp_non_negative(self.pre_tax),
            roth: clamp_non_negative(self.roth),
            hsa: clamp_non_negative(self.hsa),
        }
    }

    pub fn zero_out(&mut self) {
        *self = Self::default();
    }
}

/// Balances and savings figures handed over by the account data provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    pub buckets: AccountBuckets,
    pub annual_contribution: Money,
    pub employer_match: Money,
    pub contribution_growth_rate: Decimal,
    pub contribution_target: ContributionTarget,
}

impl AccountSnapshot {
    pub fn sample() -> Self {
        Self {
            buckets: AccountBuckets::new(dec!(100000), dec!(300000), dec!(80000), dec!(20000)),
            annual_contribution: dec!(20000),
            employer_match: Decimal::ZERO,
            contribution_growth_rate: Decimal::ZERO,
            contribution_target: ContributionTarget::PreTax,
        }
    }

    pub fn annual_savings(&self) -> Money {
        self.annual_contribution + self.employer_match
    }

    pub fn normalized(&self) -> Self {
        let mut out = self.clone();
        let clamped = out.buckets.clamped();
        if clamped != out.buckets {
            log::warn!("negative account balances clamped to 0");
        }
        out.buckets = clamped;
        out.annual_contribution = clamp_non_negative(out.annual_contribution);
        out.employer_match = clamp_non_negative(out.employer_match);
        out
    }
}

impl Default for AccountSnapshot {
    fn default() -> Self {
        Self::sample()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionPoint {
    pub age: u32,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub depletion_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub success_rate: f64,
    pub readiness_score: f64,
    pub median_portfolio_at_retirement: f64,
    pub median_portfolio_at_end: f64,
    pub median_depletion_age: Option<u32>,
    pub median_total_taxes: f64,
    pub paths_run: u32,
    pub seed: u64,
    pub projection: Vec<ProjectionPoint>,
}

impl SimulationResult {
    pub fn empty(seed: u64) -> Self {
        Self {
            success_rate: 0.0,
            readiness_score: 0.0,
            median_portfolio_at_retirement: 0.0,
            median_portfolio_at_end: 0.0,
            median_depletion_age: None,
            median_total_taxes: 0.0,
            paths_run: 0,
            seed,
            projection: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyComparison {
    pub strategy: WithdrawalStrategy,
    pub final_portfolio: Money,
    pub total_taxes: Money,
    pub depletion_age: Option<u32>,
}

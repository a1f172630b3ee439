use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::healthcare::{HealthcareInputs, annual_cost};
use super::life_events::{InflationContext, net_adjustment};
use super::money::{Money, clamp_non_negative, growth_factor, round_cents, scale, to_f64, to_rate};
use super::scoring::{Horizon, PathOutcome, ReadinessBasis, aggregate};
use super::social_security::household_benefits;
use super::types::{
    AccountBuckets, AccountSnapshot, ContributionTarget, HealthcareAssumptions, Scenario,
    SimulationResult, StrategyComparison, TaxRates, WithdrawalStrategy,
};
use super::withdrawal::{required_minimum_distribution, withdraw};

const RETURN_FLOOR: f64 = -0.95;
const RETURN_CEILING: f64 = 2.5;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Phase {
    Accumulating,
    Drawing,
    Depleted,
}

/// Deterministic cash flows for one simulated year, shared by every path.
#[derive(Debug, Clone, Copy)]
struct YearFlows {
    age: u32,
    phase: Phase,
    deposit: Money,
    need: Money,
}

#[derive(Debug, Clone)]
struct RunPlan {
    current_age: u32,
    strategy: WithdrawalStrategy,
    withdrawal_rate: Decimal,
    tax_rates: TaxRates,
    contribution_target: ContributionTarget,
    years: Vec<YearFlows>,
}

impl RunPlan {
    fn from_scenario(
        scenario: &Scenario,
        accounts: &AccountSnapshot,
        strategy: WithdrawalStrategy,
    ) -> Self {
        let current_age = scenario.current_age;
        let benefits = household_benefits(&scenario.social_security, current_age);
        let ctx = InflationContext {
            current_age,
            inflation_rate: scenario.inflation_rate,
            medical_inflation_rate: scenario.medical_inflation_rate,
        };
        let healthcare = scenario
            .healthcare
            .as_ref()
            .map(|assumptions| healthcare_inputs(scenario, assumptions));

        let span = scenario.life_expectancy.saturating_sub(current_age) as usize;
        let mut years = Vec::with_capacity(span);
        for age in (current_age + 1)..=scenario.life_expectancy {
            let elapsed = age - current_age;
            let events = net_adjustment(&scenario.life_events, age, &ctx);
            let debt_payments: Money = scenario
                .debts
                .iter()
                .map(|debt| debt.annual_payment_at(age, current_age))
                .sum();

            if age < scenario.retirement_age {
                let contribution = scale(
                    accounts.annual_contribution,
                    growth_factor(accounts.contribution_growth_rate, elapsed - 1),
                ) + accounts.employer_match;
                years.push(YearFlows {
                    age,
                    phase: Phase::Accumulating,
                    deposit: round_cents(clamp_non_negative(contribution + events - debt_payments)),
                    need: Decimal::ZERO,
                });
                continue;
            }

            let inflation = growth_factor(scenario.inflation_rate, elapsed);
            let spending = scale(scenario.annual_spending, inflation);
            let healthcare_cost = healthcare
                .as_ref()
                .map(|inputs| annual_cost(inputs, age).total)
                .unwrap_or(Decimal::ZERO);
            let social_security = scale(
                benefits
                    .iter()
                    .filter(|stream| age >= stream.start_age)
                    .map(|stream| stream.annual)
                    .sum(),
                inflation,
            );
            let pension = if age >= scenario.pension_start_age {
                scenario.pension_annual_income
            } else {
                Decimal::ZERO
            };

            let need = spending + healthcare_cost + debt_payments
                - social_security
                - pension
                - events;
            years.push(YearFlows {
                age,
                phase: Phase::Drawing,
                deposit: Decimal::ZERO,
                need: round_cents(clamp_non_negative(need)),
            });
        }

        Self {
            current_age,
            strategy,
            withdrawal_rate: scenario.withdrawal_rate,
            tax_rates: scenario.tax_rates,
            contribution_target: accounts.contribution_target,
            years,
        }
    }
}

/// Healthcare estimator inputs for a scenario. Retirement income for the IRMAA
/// lookup is Social Security plus pension plus spending, in today's dollars.
pub fn healthcare_inputs(
    scenario: &Scenario,
    assumptions: &HealthcareAssumptions,
) -> HealthcareInputs {
    let benefits: Money = household_benefits(&scenario.social_security, scenario.current_age)
        .iter()
        .map(|stream| stream.annual)
        .sum();
    HealthcareInputs {
        retirement_income: benefits + scenario.pension_annual_income + scenario.annual_spending,
        is_married: assumptions.is_married,
        include_ltc: assumptions.include_ltc,
        ltc_start_age: assumptions.ltc_start_age,
        ltc_duration_years: assumptions.ltc_duration_years,
        current_age: scenario.current_age,
        medical_inflation_rate: scenario.medical_inflation_rate,
    }
}

/// Source of one annual return per simulated year.
trait ReturnSource {
    fn annual_return(&mut self, phase: Phase) -> f64;
}

enum MarketModel {
    Sampled { pre: Normal<f64>, post: Normal<f64> },
    Fixed { pre: f64, post: f64 },
}

impl MarketModel {
    fn new(pre_mean: f64, post_mean: f64, volatility: f64) -> Self {
        match (
            Normal::new(pre_mean, volatility),
            Normal::new(post_mean, volatility),
        ) {
            (Ok(pre), Ok(post)) => MarketModel::Sampled { pre, post },
            _ => {
                log::warn!(
                    "invalid return distribution (pre {pre_mean}, post {post_mean}, vol {volatility}); using expected returns"
                );
                MarketModel::Fixed {
                    pre: pre_mean,
                    post: post_mean,
                }
            }
        }
    }
}

struct SampledReturns<'a> {
    rng: ChaCha8Rng,
    model: &'a MarketModel,
}

impl ReturnSource for SampledReturns<'_> {
    fn annual_return(&mut self, phase: Phase) -> f64 {
        let drawn = match (self.model, phase) {
            (MarketModel::Sampled { pre, .. }, Phase::Accumulating) => pre.sample(&mut self.rng),
            (MarketModel::Sampled { post, .. }, _) => post.sample(&mut self.rng),
            (MarketModel::Fixed { pre, .. }, Phase::Accumulating) => *pre,
            (MarketModel::Fixed { post, .. }, _) => *post,
        };
        drawn.clamp(RETURN_FLOOR, RETURN_CEILING)
    }
}

/// Every year earns exactly the expected return.
struct ExpectedReturns {
    pre: f64,
    post: f64,
}

impl ReturnSource for ExpectedReturns {
    fn annual_return(&mut self, phase: Phase) -> f64 {
        let rate = match phase {
            Phase::Accumulating => self.pre,
            Phase::Drawing | Phase::Depleted => self.post,
        };
        rate.clamp(RETURN_FLOOR, RETURN_CEILING)
    }
}

#[derive(Debug, Clone)]
struct PathWalk {
    balances: Vec<Money>,
    depletion_age: Option<u32>,
    total_taxes: Money,
}

impl PathWalk {
    fn final_balance(&self) -> Money {
        self.balances.last().copied().unwrap_or(Decimal::ZERO)
    }

    fn into_outcome(self) -> PathOutcome {
        PathOutcome {
            balances: self.balances.into_iter().map(to_f64).collect(),
            depletion_age: self.depletion_age,
            total_taxes: to_f64(self.total_taxes),
        }
    }
}

fn walk_path<R: ReturnSource>(plan: &RunPlan, start: AccountBuckets, returns: &mut R) -> PathWalk {
    let mut buckets = start.clamped();
    let mut balances = Vec::with_capacity(plan.years.len() + 1);
    balances.push(buckets.total());
    let mut depletion_age = None;
    let mut total_taxes = Decimal::ZERO;

    for year in &plan.years {
        let phase = if depletion_age.is_some() {
            Phase::Depleted
        } else {
            year.phase
        };

        match phase {
            Phase::Depleted => {
                balances.push(Decimal::ZERO);
                continue;
            }
            Phase::Accumulating => {
                apply_return(&mut buckets, returns.annual_return(phase));
                match plan.contribution_target {
                    ContributionTarget::PreTax => buckets.pre_tax += year.deposit,
                    ContributionTarget::Taxable => buckets.taxable += year.deposit,
                }
            }
            Phase::Drawing => {
                apply_return(&mut buckets, returns.annual_return(phase));
                let forced = plan.strategy != WithdrawalStrategy::SimpleRate
                    && required_minimum_distribution(buckets.pre_tax, year.age) > Decimal::ZERO;
                if year.need > Decimal::ZERO || forced {
                    let outcome = withdraw(
                        plan.strategy,
                        &mut buckets,
                        year.need,
                        year.age,
                        &plan.tax_rates,
                        plan.withdrawal_rate,
                    );
                    total_taxes += outcome.taxes_paid;
                }
            }
        }

        buckets = round_buckets(buckets);
        let total = buckets.total();
        if phase == Phase::Drawing && total <= Decimal::ZERO {
            depletion_age = Some(year.age);
            buckets.zero_out();
            balances.push(Decimal::ZERO);
        } else {
            balances.push(total);
        }
    }

    PathWalk {
        balances,
        depletion_age,
        total_taxes,
    }
}

fn apply_return(buckets: &mut AccountBuckets, annual_return: f64) {
    let factor = to_rate(1.0 + annual_return.clamp(RETURN_FLOOR, RETURN_CEILING));
    buckets.taxable = scale(buckets.taxable, factor);
    buckets.pre_tax = scale(buckets.pre_tax, factor);
    buckets.roth = scale(buckets.roth, factor);
    buckets.hsa = scale(buckets.hsa, factor);
}

fn round_buckets(buckets: AccountBuckets) -> AccountBuckets {
    AccountBuckets::new(
        round_cents(buckets.taxable),
        round_cents(buckets.pre_tax),
        round_cents(buckets.roth),
        round_cents(buckets.hsa),
    )
    .clamped()
}

fn run_paths(
    plan: &RunPlan,
    start: AccountBuckets,
    model: &MarketModel,
    seed: u64,
    simulations: u32,
) -> Vec<PathOutcome> {
    (0..simulations)
        .into_par_iter()
        .map(|path_index| {
            let mut returns = SampledReturns {
                rng: ChaCha8Rng::seed_from_u64(derive_seed(seed, path_index)),
                model,
            };
            walk_path(plan, start, &mut returns).into_outcome()
        })
        .collect()
}

fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| rand::rng().random())
}

pub fn run_simulation(scenario: &Scenario, accounts: &AccountSnapshot) -> SimulationResult {
    let scenario = scenario.normalized();
    let accounts = accounts.normalized();
    let seed = resolve_seed(scenario.seed);

    if !scenario.has_valid_horizon() || scenario.simulations == 0 {
        log::debug!(
            "skipping run: ages {}..{} with {} paths",
            scenario.current_age,
            scenario.life_expectancy,
            scenario.simulations
        );
        return SimulationResult::empty(seed);
    }

    log::debug!(
        "running {} paths, ages {}..={}, retirement at {}, strategy {:?}, seed {}",
        scenario.simulations,
        scenario.current_age,
        scenario.life_expectancy,
        scenario.retirement_age,
        scenario.withdrawal_strategy,
        seed
    );

    let plan = RunPlan::from_scenario(&scenario, &accounts, scenario.withdrawal_strategy);
    let model = MarketModel::new(
        scenario.pre_retirement_return,
        scenario.post_retirement_return,
        scenario.volatility,
    );
    let paths = run_paths(&plan, accounts.buckets, &model, seed, scenario.simulations);

    let horizon = Horizon {
        current_age: scenario.current_age,
        retirement_age: scenario.retirement_age,
        life_expectancy: scenario.life_expectancy,
    };
    let income = scenario.current_annual_income;
    let basis = ReadinessBasis {
        portfolio: to_f64(accounts.buckets.total()),
        annual_spending: to_f64(scenario.annual_spending),
        annual_savings: to_f64(accounts.annual_savings()),
        annual_income: (income > Decimal::ZERO).then(|| to_f64(income)),
    };
    let result = aggregate(&paths, &horizon, seed, &basis);

    log::debug!(
        "run finished: success {:.1}%, readiness {:.1}, median end {:.0}",
        result.success_rate,
        result.readiness_score,
        result.median_portfolio_at_end
    );
    result
}

/// Slider-driven variant: one pooled balance, one effective tax rate, no RMDs,
/// healthcare or life events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickInputs {
    pub current_age: u32,
    pub retirement_age: u32,
    pub life_expectancy: u32,
    pub portfolio: Money,
    pub annual_contribution: Money,
    pub annual_spending: Money,
    pub annual_income: Money,
    pub guaranteed_income: Money,
    pub guaranteed_income_start_age: u32,
    pub expected_return: f64,
    pub volatility: f64,
    pub inflation_rate: Decimal,
    pub effective_tax_rate: Decimal,
    pub simulations: u32,
    pub seed: Option<u64>,
}

impl QuickInputs {
    pub fn sample() -> Self {
        Self {
            current_age: 35,
            retirement_age: 65,
            life_expectancy: 95,
            portfolio: Decimal::from(500_000),
            annual_contribution: Decimal::from(20_000),
            annual_spending: Decimal::from(60_000),
            annual_income: Decimal::from(120_000),
            guaranteed_income: Decimal::ZERO,
            guaranteed_income_start_age: 67,
            expected_return: 0.06,
            volatility: 0.15,
            inflation_rate: Decimal::new(25, 3),
            effective_tax_rate: Decimal::new(15, 2),
            simulations: 500,
            seed: None,
        }
    }

    fn quick_plan(&self) -> RunPlan {
        let span = self.life_expectancy.saturating_sub(self.current_age) as usize;
        let mut years = Vec::with_capacity(span);
        for age in (self.current_age + 1)..=self.life_expectancy {
            if age < self.retirement_age {
                years.push(YearFlows {
                    age,
                    phase: Phase::Accumulating,
                    deposit: clamp_non_negative(self.annual_contribution),
                    need: Decimal::ZERO,
                });
                continue;
            }
            let inflation = growth_factor(self.inflation_rate, age - self.current_age);
            let guaranteed = if age >= self.guaranteed_income_start_age {
                clamp_non_negative(self.guaranteed_income)
            } else {
                Decimal::ZERO
            };
            let spending = clamp_non_negative(self.annual_spending);
            let need = scale(spending - guaranteed, inflation);
            years.push(YearFlows {
                age,
                phase: Phase::Drawing,
                deposit: Decimal::ZERO,
                need: round_cents(clamp_non_negative(need)),
            });
        }

        RunPlan {
            current_age: self.current_age,
            strategy: WithdrawalStrategy::TaxOptimized,
            withdrawal_rate: Decimal::ZERO,
            tax_rates: TaxRates {
                federal: Decimal::ZERO,
                state: Decimal::ZERO,
                capital_gains: self.effective_tax_rate,
            },
            contribution_target: ContributionTarget::Taxable,
            years,
        }
    }
}

pub fn run_quick_simulation(inputs: &QuickInputs) -> SimulationResult {
    let seed = resolve_seed(inputs.seed);
    if inputs.life_expectancy <= inputs.current_age || inputs.simulations == 0 {
        return SimulationResult::empty(seed);
    }

    let volatility = if inputs.volatility.is_finite() {
        inputs.volatility.max(0.0)
    } else {
        0.0
    };
    log::debug!(
        "quick run: {} paths, ages {}..={}, seed {}",
        inputs.simulations,
        inputs.current_age,
        inputs.life_expectancy,
        seed
    );

    let plan = inputs.quick_plan();
    let model = MarketModel::new(inputs.expected_return, inputs.expected_return, volatility);
    let pooled = AccountBuckets::new(
        clamp_non_negative(inputs.portfolio),
        Decimal::ZERO,
        Decimal::ZERO,
        Decimal::ZERO,
    );
    let paths = run_paths(&plan, pooled, &model, seed, inputs.simulations);

    let horizon = Horizon {
        current_age: inputs.current_age,
        retirement_age: inputs.retirement_age,
        life_expectancy: inputs.life_expectancy,
    };
    let basis = ReadinessBasis {
        portfolio: to_f64(pooled.total()),
        annual_spending: to_f64(clamp_non_negative(inputs.annual_spending)),
        annual_savings: to_f64(clamp_non_negative(inputs.annual_contribution)),
        annual_income: (inputs.annual_income > Decimal::ZERO).then(|| to_f64(inputs.annual_income)),
    };
    aggregate(&paths, &horizon, seed, &basis)
}

/// Walks each strategy once through the expected-return path, so the only
/// difference between rows is the withdrawal rule.
pub fn compare_strategies(
    scenario: &Scenario,
    accounts: &AccountSnapshot,
    strategies: &[WithdrawalStrategy],
) -> Vec<StrategyComparison> {
    let scenario = scenario.normalized();
    let accounts = accounts.normalized();
    if !scenario.has_valid_horizon() {
        return Vec::new();
    }

    strategies
        .iter()
        .map(|&strategy| {
            let plan = RunPlan::from_scenario(&scenario, &accounts, strategy);
            let mut returns = ExpectedReturns {
                pre: scenario.pre_retirement_return,
                post: scenario.post_retirement_return,
            };
            let walk = walk_path(&plan, accounts.buckets, &mut returns);
            log::debug!(
                "{strategy:?}: final {} taxes {} depleted at {:?} (from age {})",
                walk.final_balance(),
                walk.total_taxes,
                walk.depletion_age,
                plan.current_age
            );
            StrategyComparison {
                strategy,
                final_portfolio: walk.final_balance(),
                total_taxes: walk.total_taxes,
                depletion_age: walk.depletion_age,
            }
        })
        .collect()
}

fn derive_seed(base_seed: u64, path_index: u32) -> u64 {
    splitmix64(base_seed ^ ((path_index as u64) << 32) ^ path_index as u64)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::healthcare::MEDICARE_AGE;
    use crate::core::life_events::{EventCategory, InflationTreatment, LifeEvent};
    use crate::core::payoff::Debt;
    use crate::core::types::SocialSecurityAssumptions;
    use proptest::prelude::{any, prop_assert, proptest};
    use rust_decimal_macros::dec;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn seeded(mut scenario: Scenario, seed: u64) -> Scenario {
        scenario.seed = Some(seed);
        scenario
    }

    fn flat_scenario() -> Scenario {
        let mut scenario = Scenario::sample();
        scenario.current_age = 60;
        scenario.retirement_age = 60;
        scenario.life_expectancy = 70;
        scenario.pre_retirement_return = 0.0;
        scenario.post_retirement_return = 0.0;
        scenario.volatility = 0.0;
        scenario.inflation_rate = Decimal::ZERO;
        scenario.medical_inflation_rate = Decimal::ZERO;
        scenario.annual_spending = dec!(10000);
        scenario.tax_rates = TaxRates::zero();
        scenario.simulations = 4;
        scenario.seed = Some(1);
        scenario
    }

    fn roth_only(amount: Money) -> AccountSnapshot {
        AccountSnapshot {
            buckets: AccountBuckets::new(Decimal::ZERO, Decimal::ZERO, amount, Decimal::ZERO),
            annual_contribution: Decimal::ZERO,
            ..AccountSnapshot::sample()
        }
    }

    #[test]
    fn sample_household_yields_one_point_per_age() {
        let mut scenario = seeded(Scenario::sample(), 42);
        scenario.simulations = 100;
        let result = run_simulation(&scenario, &AccountSnapshot::sample());

        assert_eq!(result.projection.len(), 61);
        assert_eq!(result.projection[0].age, 35);
        assert_eq!(result.projection[60].age, 95);
        assert_approx(result.projection[0].p50, 500_000.0);
        assert_eq!(result.paths_run, 100);
        assert_eq!(result.seed, 42);
    }

    #[test]
    fn invalid_horizon_returns_empty_result() {
        let mut scenario = seeded(Scenario::sample(), 1);
        scenario.life_expectancy = scenario.current_age;
        let result = run_simulation(&scenario, &AccountSnapshot::sample());
        assert_approx(result.success_rate, 0.0);
        assert_approx(result.readiness_score, 0.0);
        assert!(result.projection.is_empty());
        assert_eq!(result.paths_run, 0);
    }

    #[test]
    fn zero_portfolio_with_high_spending_fails() {
        let mut scenario = seeded(Scenario::sample(), 5);
        scenario.current_age = 60;
        scenario.retirement_age = 60;
        scenario.annual_spending = dec!(120000);
        scenario.simulations = 200;
        let accounts = AccountSnapshot {
            buckets: AccountBuckets::default(),
            annual_contribution: Decimal::ZERO,
            ..AccountSnapshot::sample()
        };
        let result = run_simulation(&scenario, &accounts);
        assert!(result.success_rate < 10.0);
        assert_eq!(result.median_depletion_age, Some(61));
    }

    #[test]
    fn large_portfolio_with_low_spending_succeeds() {
        let mut scenario = seeded(Scenario::sample(), 6);
        scenario.annual_spending = dec!(20000);
        scenario.simulations = 200;
        let accounts = AccountSnapshot {
            buckets: AccountBuckets::new(
                dec!(5000000),
                dec!(5000000),
                Decimal::ZERO,
                Decimal::ZERO,
            ),
            ..AccountSnapshot::sample()
        };
        let result = run_simulation(&scenario, &accounts);
        assert!(result.success_rate > 80.0);
        assert!(result.median_depletion_age.is_none());
    }

    #[test]
    fn fixed_seed_reproduces_result() {
        let mut scenario = seeded(Scenario::sample(), 77);
        scenario.simulations = 64;
        let a = run_simulation(&scenario, &AccountSnapshot::sample());
        let b = run_simulation(&scenario, &AccountSnapshot::sample());
        assert_eq!(a.success_rate, b.success_rate);
        assert_eq!(a.median_total_taxes, b.median_total_taxes);
        for (pa, pb) in a.projection.iter().zip(&b.projection) {
            assert_eq!(pa.p10, pb.p10);
            assert_eq!(pa.p90, pb.p90);
        }
    }

    #[test]
    fn flat_walk_depletes_exactly_when_spending_exhausts_balance() {
        let scenario = flat_scenario();
        let accounts = roth_only(dec!(100000));
        let result = run_simulation(&scenario, &accounts);
        // Ten draws of 10k from 100k empty the account at 70.
        assert_approx(result.success_rate, 0.0);
        assert_eq!(result.median_depletion_age, Some(70));
        assert_approx(result.projection[9].p50, 10_000.0);

        let mut shorter = flat_scenario();
        shorter.life_expectancy = 69;
        let result = run_simulation(&shorter, &accounts);
        assert_approx(result.success_rate, 100.0);
        assert_approx(result.median_portfolio_at_end, 10_000.0);
    }

    #[test]
    fn depleted_path_stays_at_zero() {
        let scenario = flat_scenario();
        let accounts = roth_only(dec!(25000));
        let plan = RunPlan::from_scenario(&scenario, &accounts, WithdrawalStrategy::TaxOptimized);
        let mut returns = ExpectedReturns {
            pre: 0.0,
            post: 0.0,
        };
        let walk = walk_path(&plan, accounts.buckets, &mut returns);
        assert_eq!(walk.depletion_age, Some(63));
        assert_eq!(walk.balances.len(), 11);
        assert!(walk.balances[3..].iter().all(|b| b.is_zero()));
        assert_eq!(walk.balances[2], dec!(5000));
    }

    #[test]
    fn accumulation_adds_contributions_to_configured_bucket() {
        let mut scenario = flat_scenario();
        scenario.current_age = 40;
        scenario.retirement_age = 43;
        scenario.life_expectancy = 43;
        let accounts = AccountSnapshot {
            buckets: AccountBuckets::default(),
            annual_contribution: dec!(1000),
            employer_match: dec!(500),
            contribution_growth_rate: Decimal::ZERO,
            contribution_target: ContributionTarget::Taxable,
        };
        let plan = RunPlan::from_scenario(&scenario, &accounts, WithdrawalStrategy::TaxOptimized);
        let mut returns = ExpectedReturns {
            pre: 0.0,
            post: 0.0,
        };
        let walk = walk_path(&plan, accounts.buckets, &mut returns);
        assert_eq!(
            walk.balances,
            vec![dec!(0), dec!(1500), dec!(3000), dec!(0)]
        );
        assert_eq!(walk.depletion_age, Some(43));
    }

    #[test]
    fn life_event_cost_is_netted_against_contribution() {
        let mut scenario = flat_scenario();
        scenario.current_age = 40;
        scenario.retirement_age = 50;
        scenario.life_expectancy = 50;
        scenario.life_events = vec![
            LifeEvent::new(
                "Roof",
                EventCategory::Custom,
                41,
                None,
                None,
                Some(dec!(5000)),
                None,
                InflationTreatment::Standard,
            )
            .expect("valid event"),
        ];
        let accounts = AccountSnapshot {
            buckets: AccountBuckets::default(),
            annual_contribution: dec!(2000),
            employer_match: Decimal::ZERO,
            contribution_growth_rate: Decimal::ZERO,
            contribution_target: ContributionTarget::PreTax,
        };
        let plan = RunPlan::from_scenario(&scenario, &accounts, WithdrawalStrategy::TaxOptimized);
        assert_eq!(plan.years[0].deposit, Decimal::ZERO);
        assert_eq!(plan.years[1].deposit, dec!(2000));
    }

    #[test]
    fn drawing_need_includes_debts_and_healthcare_minus_income() {
        let mut scenario = flat_scenario();
        scenario.current_age = MEDICARE_AGE;
        scenario.retirement_age = MEDICARE_AGE;
        scenario.life_expectancy = MEDICARE_AGE + 2;
        scenario.pension_annual_income = dec!(4000);
        scenario.pension_start_age = MEDICARE_AGE;
        scenario.social_security = SocialSecurityAssumptions::Manual {
            monthly_benefit: dec!(500),
            claiming_age: MEDICARE_AGE + 2,
        };
        scenario.healthcare = Some(HealthcareAssumptions::default());
        scenario.debts = vec![Debt {
            name: "Car".to_string(),
            balance: dec!(1200),
            annual_rate: 0.0,
            monthly_payment: dec!(100),
        }];
        let plan = RunPlan::from_scenario(
            &scenario,
            &roth_only(dec!(1)),
            WithdrawalStrategy::TaxOptimized,
        );

        // 10,000 spending + 7,562.40 Medicare + 1,200 debt - 4,000 pension.
        assert_eq!(plan.years[0].need, dec!(14762.40));
        // Loan paid off; 6,000 of Social Security starts.
        assert_eq!(plan.years[1].need, dec!(14762.40) - dec!(1200) - dec!(6000));
    }

    #[test]
    fn debt_payments_are_charged_in_full_across_the_horizon() {
        let mut scenario = flat_scenario();
        scenario.current_age = 60;
        scenario.retirement_age = 64;
        scenario.life_expectancy = 64;
        scenario.debts = vec![Debt {
            name: "Phone".to_string(),
            balance: dec!(1200),
            annual_rate: 0.0,
            monthly_payment: dec!(100),
        }];
        let accounts = AccountSnapshot {
            buckets: AccountBuckets::default(),
            annual_contribution: dec!(2000),
            employer_match: Decimal::ZERO,
            contribution_growth_rate: Decimal::ZERO,
            contribution_target: ContributionTarget::PreTax,
        };
        let plan = RunPlan::from_scenario(&scenario, &accounts, WithdrawalStrategy::TaxOptimized);
        let deposits: Vec<Money> = plan.years.iter().map(|year| year.deposit).collect();
        assert_eq!(
            deposits,
            vec![dec!(800), dec!(2000), dec!(2000), Decimal::ZERO]
        );
        let charged: Money = plan
            .years
            .iter()
            .filter(|year| year.phase == Phase::Accumulating)
            .map(|year| dec!(2000) - year.deposit)
            .sum();
        assert_eq!(charged, dec!(1200));
    }

    #[test]
    fn healthcare_costs_lower_success() {
        let mut scenario = seeded(Scenario::sample(), 21);
        scenario.simulations = 120;
        let base = run_simulation(&scenario, &AccountSnapshot::sample());
        scenario.healthcare = Some(HealthcareAssumptions {
            include_ltc: true,
            ..HealthcareAssumptions::default()
        });
        let with_costs = run_simulation(&scenario, &AccountSnapshot::sample());
        assert!(with_costs.success_rate <= base.success_rate);
        assert!(
            with_costs.median_portfolio_at_end <= base.median_portfolio_at_end
        );
    }

    #[test]
    fn quick_simulation_matches_flat_hand_calculation() {
        let inputs = QuickInputs {
            current_age: 60,
            retirement_age: 60,
            life_expectancy: 70,
            portfolio: dec!(100000),
            annual_contribution: Decimal::ZERO,
            annual_spending: dec!(8500),
            annual_income: Decimal::ZERO,
            guaranteed_income: Decimal::ZERO,
            guaranteed_income_start_age: 67,
            expected_return: 0.0,
            volatility: 0.0,
            inflation_rate: Decimal::ZERO,
            effective_tax_rate: dec!(0.15),
            simulations: 8,
            seed: Some(3),
        };
        // 8,500 net grossed up at 15% is 10,000 a year.
        let result = run_quick_simulation(&inputs);
        assert_eq!(result.projection.len(), 11);
        assert_approx(result.projection[5].p50, 50_000.0);
        assert_approx(result.success_rate, 0.0);
        assert_eq!(result.median_depletion_age, Some(70));
        assert_approx(result.median_total_taxes, 15_000.0);
    }

    #[test]
    fn quick_simulation_with_invalid_horizon_is_empty() {
        let mut inputs = QuickInputs::sample();
        inputs.life_expectancy = inputs.current_age - 1;
        let result = run_quick_simulation(&inputs);
        assert!(result.projection.is_empty());
        assert_approx(result.success_rate, 0.0);
    }

    #[test]
    fn comparison_reports_each_strategy_in_order() {
        let mut scenario = flat_scenario();
        scenario.withdrawal_rate = dec!(0.05);
        let rows = compare_strategies(
            &scenario,
            &roth_only(dec!(200000)),
            &WithdrawalStrategy::ALL,
        );
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].strategy, WithdrawalStrategy::TaxOptimized);
        assert_eq!(rows[1].strategy, WithdrawalStrategy::SimpleRate);
        // Roth only: no tax, need-based strategies draw 10k a year for ten years.
        assert_eq!(rows[0].final_portfolio, dec!(100000));
        assert_eq!(rows[2].final_portfolio, dec!(100000));
        assert!(rows.iter().all(|row| row.total_taxes.is_zero()));
        // Simple-rate takes 5% of a shrinking balance.
        assert!(rows[1].final_portfolio > dec!(100000));
        assert!(rows.iter().all(|row| row.depletion_age.is_none()));
    }

    #[test]
    fn tax_optimized_pays_less_tax_than_pro_rata_when_gains_rate_is_lower() {
        let mut scenario = flat_scenario();
        scenario.tax_rates = TaxRates::default();
        scenario.life_expectancy = 62;
        let accounts = AccountSnapshot {
            buckets: AccountBuckets::new(dec!(100000), dec!(100000), Decimal::ZERO, Decimal::ZERO),
            ..roth_only(Decimal::ZERO)
        };
        let rows = compare_strategies(
            &scenario,
            &accounts,
            &[WithdrawalStrategy::TaxOptimized, WithdrawalStrategy::ProRata],
        );
        assert!(rows[0].total_taxes < rows[1].total_taxes);
    }

    #[test]
    fn derive_seed_separates_paths() {
        assert_ne!(derive_seed(7, 0), derive_seed(7, 1));
        assert_ne!(derive_seed(7, 0), derive_seed(8, 0));
        assert_eq!(derive_seed(7, 3), derive_seed(7, 3));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(16))]

        #[test]
        fn prop_projection_bands_are_ordered_and_depletion_only_rises_after_retirement(
            seed in any::<u64>(),
            current_age in 30u32..60,
            working_years in 0u32..15,
            retired_years in 1u32..30,
            portfolio in 0u32..2_000_000,
            spending in 10_000u32..150_000,
            vol_bp in 0u32..3000,
            paths in 8u32..40,
        ) {
            let mut scenario = Scenario::sample();
            scenario.seed = Some(seed);
            scenario.current_age = current_age;
            scenario.retirement_age = current_age + working_years;
            scenario.life_expectancy = scenario.retirement_age + retired_years;
            scenario.annual_spending = Decimal::from(spending);
            scenario.volatility = vol_bp as f64 / 10_000.0;
            scenario.simulations = paths;
            let accounts = AccountSnapshot {
                buckets: AccountBuckets::new(
                    Decimal::from(portfolio),
                    Decimal::ZERO,
                    Decimal::ZERO,
                    Decimal::ZERO,
                ),
                ..AccountSnapshot::sample()
            };

            let result = run_simulation(&scenario, &accounts);
            prop_assert!((0.0..=100.0).contains(&result.success_rate));
            prop_assert!((0.0..=100.0).contains(&result.readiness_score));
            prop_assert!(
                result.projection.len() as u32 == scenario.life_expectancy - current_age + 1
            );
            for point in &result.projection {
                prop_assert!(point.p10 <= point.p25);
                prop_assert!(point.p25 <= point.p50);
                prop_assert!(point.p50 <= point.p75);
                prop_assert!(point.p75 <= point.p90);
            }
            for pair in result.projection.windows(2) {
                if pair[0].age >= scenario.retirement_age {
                    prop_assert!(pair[1].depletion_pct >= pair[0].depletion_pct);
                }
            }
        }

        #[test]
        fn prop_social_security_never_lowers_success(
            seed in any::<u64>(),
            monthly_benefit in 0u32..5_000,
            claiming_age in 62u32..=70,
            spending in 40_000u32..120_000,
        ) {
            let mut scenario = Scenario::sample();
            scenario.seed = Some(seed);
            scenario.simulations = 40;
            scenario.annual_spending = Decimal::from(spending);
            let without = run_simulation(&scenario, &AccountSnapshot::sample());

            scenario.social_security = SocialSecurityAssumptions::Manual {
                monthly_benefit: Decimal::from(monthly_benefit),
                claiming_age,
            };
            let with = run_simulation(&scenario, &AccountSnapshot::sample());
            prop_assert!(with.success_rate >= without.success_rate);
            prop_assert!(
                with.median_portfolio_at_end >= without.median_portfolio_at_end
            );
        }
    }
}

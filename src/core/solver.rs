use rand::Rng;
use serde::{Deserialize, Serialize};

use super::engine::run_simulation;
use super::error::{ProjectionError, ProjectionResult};
use super::money::{round_cents, to_money};
use super::types::{AccountSnapshot, Scenario};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    /// Highest annual spending that still meets the target success rate.
    MaxSpending,
    /// Lowest annual contribution that meets the target success rate.
    RequiredContribution,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSolveConfig {
    pub goal_type: GoalType,
    /// Percent, 0 to 100.
    pub target_success_rate: f64,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
    pub simulations_per_iteration: u32,
    pub final_simulations: u32,
}

impl GoalSolveConfig {
    pub fn new(goal_type: GoalType, target_success_rate: f64) -> Self {
        let search_max = match goal_type {
            GoalType::MaxSpending => 250_000.0,
            GoalType::RequiredContribution => 100_000.0,
        };
        Self {
            goal_type,
            target_success_rate,
            search_min: 0.0,
            search_max,
            tolerance: 100.0,
            max_iterations: 24,
            simulations_per_iteration: 300,
            final_simulations: 1_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_value: f64,
    pub success_rate: f64,
    pub success_ci_half_width: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSolveResult {
    pub config: GoalSolveConfig,
    pub seed: u64,
    pub solved_value: Option<f64>,
    pub achieved_success_rate: Option<f64>,
    pub achieved_success_ci_half_width: Option<f64>,
    pub iterations: Vec<GoalSolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy)]
struct CandidateEval {
    success_rate: f64,
    success_ci_half_width: f64,
}

impl CandidateEval {
    fn meets(self, target: f64) -> bool {
        self.success_rate + 1e-9 >= target
    }
}

struct Candidate<'a> {
    scenario: &'a Scenario,
    accounts: &'a AccountSnapshot,
    goal_type: GoalType,
}

impl Candidate<'_> {
    fn evaluate(&self, value: f64, simulations: u32) -> CandidateEval {
        let mut scenario = self.scenario.clone();
        let mut accounts = self.accounts.clone();
        scenario.simulations = simulations.max(1);
        let amount = round_cents(to_money(value.max(0.0)));
        match self.goal_type {
            GoalType::MaxSpending => scenario.annual_spending = amount,
            GoalType::RequiredContribution => accounts.annual_contribution = amount,
        }

        let result = run_simulation(&scenario, &accounts);
        CandidateEval {
            success_rate: result.success_rate,
            success_ci_half_width: binomial_ci_half_width(
                result.success_rate / 100.0,
                scenario.simulations,
            ) * 100.0,
        }
    }
}

/// Bisects spending or contribution until the success rate crosses the target.
///
/// Every candidate reuses the same seed, so successive evaluations differ only
/// in the searched value.
pub fn solve_goal(
    scenario: &Scenario,
    accounts: &AccountSnapshot,
    config: GoalSolveConfig,
) -> ProjectionResult<GoalSolveResult> {
    validate_config(scenario, config)?;

    let seed = scenario
        .seed
        .unwrap_or_else(|| rand::rng().random());
    let mut pinned = scenario.clone();
    pinned.seed = Some(seed);
    let candidate = Candidate {
        scenario: &pinned,
        accounts,
        goal_type: config.goal_type,
    };

    let target = config.target_success_rate;
    let low_eval = candidate.evaluate(config.search_min, config.simulations_per_iteration);
    let high_eval = candidate.evaluate(config.search_max, config.simulations_per_iteration);

    // MaxSpending succeeds at the low end; RequiredContribution at the high end.
    let (feasible_bound, infeasible_bound, feasible_eval, infeasible_eval) = match config.goal_type
    {
        GoalType::MaxSpending => (config.search_min, config.search_max, low_eval, high_eval),
        GoalType::RequiredContribution => {
            (config.search_max, config.search_min, high_eval, low_eval)
        }
    };

    let mut iterations = Vec::with_capacity(config.max_iterations as usize);
    let mut converged = false;
    let (solved_value, feasible, message) = if !feasible_eval.meets(target) {
        (
            None,
            false,
            "No feasible value found within the search bounds.".to_string(),
        )
    } else if infeasible_eval.meets(target) {
        converged = true;
        let message = match config.goal_type {
            GoalType::MaxSpending => {
                "Upper spending bound still meets the target; raise search max."
            }
            GoalType::RequiredContribution => {
                "Already meets target at the lower contribution bound."
            }
        };
        (Some(infeasible_bound), true, message.to_string())
    } else {
        let mut good = feasible_bound;
        let mut bad = infeasible_bound;
        for iteration in 1..=config.max_iterations {
            let mid = (good + bad) * 0.5;
            let eval = candidate.evaluate(mid, config.simulations_per_iteration);
            iterations.push(GoalSolveIteration {
                iteration,
                lower_bound: good.min(bad),
                upper_bound: good.max(bad),
                candidate_value: mid,
                success_rate: eval.success_rate,
                success_ci_half_width: eval.success_ci_half_width,
            });
            log::debug!(
                "solver iteration {iteration}: {mid:.2} -> {:.1}%",
                eval.success_rate
            );

            if eval.meets(target) {
                good = mid;
            } else {
                bad = mid;
            }
            if (bad - good).abs() <= config.tolerance {
                converged = true;
                break;
            }
        }
        let message = if converged {
            match config.goal_type {
                GoalType::MaxSpending => "Solved maximum sustainable spending.",
                GoalType::RequiredContribution => "Solved required contribution.",
            }
        } else {
            "Reached max iterations before tolerance was met; returning best estimate."
        };
        (Some(good), true, message.to_string())
    };

    let final_eval = solved_value.map(|value| candidate.evaluate(value, config.final_simulations));

    Ok(GoalSolveResult {
        config,
        seed,
        solved_value,
        achieved_success_rate: final_eval.map(|eval| eval.success_rate),
        achieved_success_ci_half_width: final_eval.map(|eval| eval.success_ci_half_width),
        iterations,
        converged,
        feasible,
        message,
    })
}

fn binomial_ci_half_width(p: f64, n: u32) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = p.clamp(0.0, 1.0);
    1.96 * (p * (1.0 - p) / n as f64).sqrt()
}

fn validate_config(scenario: &Scenario, config: GoalSolveConfig) -> ProjectionResult<()> {
    let invalid = |reason: &str| Err(ProjectionError::InvalidSolverConfig(reason.to_string()));

    if !scenario.has_valid_horizon() {
        return invalid("life_expectancy must be greater than current_age");
    }
    if config.goal_type == GoalType::RequiredContribution
        && scenario.retirement_age <= scenario.current_age + 1
    {
        return invalid("required contribution needs at least one working year");
    }
    if !(0.0..=100.0).contains(&config.target_success_rate) {
        return invalid("target_success_rate must be between 0 and 100");
    }
    if !config.search_min.is_finite() || !config.search_max.is_finite() {
        return invalid("search bounds must be finite");
    }
    if config.search_min < 0.0 {
        return invalid("search_min must be >= 0");
    }
    if config.search_max <= config.search_min {
        return invalid("search_max must be greater than search_min");
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return invalid("tolerance must be > 0");
    }
    if config.max_iterations == 0 {
        return invalid("max_iterations must be > 0");
    }
    if config.simulations_per_iteration == 0 {
        return invalid("simulations_per_iteration must be > 0");
    }
    if config.final_simulations == 0 {
        return invalid("final_simulations must be > 0");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{AccountBuckets, ContributionTarget, TaxRates};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn deterministic_scenario() -> Scenario {
        let mut scenario = Scenario::sample();
        scenario.current_age = 60;
        scenario.retirement_age = 60;
        scenario.life_expectancy = 70;
        scenario.pre_retirement_return = 0.0;
        scenario.post_retirement_return = 0.0;
        scenario.volatility = 0.0;
        scenario.inflation_rate = Decimal::ZERO;
        scenario.tax_rates = TaxRates::zero();
        scenario.seed = Some(7);
        scenario
    }

    fn accounts(roth: Decimal) -> AccountSnapshot {
        AccountSnapshot {
            buckets: AccountBuckets::new(Decimal::ZERO, Decimal::ZERO, roth, Decimal::ZERO),
            annual_contribution: Decimal::ZERO,
            employer_match: Decimal::ZERO,
            contribution_growth_rate: Decimal::ZERO,
            contribution_target: ContributionTarget::Taxable,
        }
    }

    fn config(goal_type: GoalType, search_max: f64) -> GoalSolveConfig {
        GoalSolveConfig {
            goal_type,
            target_success_rate: 100.0,
            search_min: 0.0,
            search_max,
            tolerance: 0.5,
            max_iterations: 40,
            simulations_per_iteration: 1,
            final_simulations: 1,
        }
    }

    #[test]
    fn max_spending_solver_finds_deterministic_solution() {
        // Ten withdrawals must leave something at 70, so spending must stay below 10k.
        let config = config(GoalType::MaxSpending, 20_000.0);
        let result = solve_goal(&deterministic_scenario(), &accounts(dec!(100000)), config)
            .expect("must solve");
        assert!(result.feasible);
        assert!(result.converged);
        let value = result.solved_value.expect("value expected");
        assert!(value < 10_000.0);
        assert_close(value, 10_000.0, config.tolerance + 0.5);
        let achieved = result.achieved_success_rate.expect("rate expected");
        assert_close(achieved, 100.0, 1e-9);
    }

    #[test]
    fn required_contribution_solver_finds_deterministic_solution() {
        let mut scenario = deterministic_scenario();
        scenario.retirement_age = 62;
        scenario.life_expectancy = 62;
        scenario.annual_spending = dec!(100);
        let config = config(GoalType::RequiredContribution, 200.0);

        let result = solve_goal(&scenario, &accounts(Decimal::ZERO), config).expect("must solve");
        assert!(result.feasible);
        assert_close(
            result.solved_value.expect("value expected"),
            100.0,
            config.tolerance + 0.5,
        );
        assert!(!result.iterations.is_empty());
    }

    #[test]
    fn required_contribution_solver_reports_infeasible_when_bounds_too_low() {
        let mut scenario = deterministic_scenario();
        scenario.retirement_age = 62;
        scenario.life_expectancy = 62;
        scenario.annual_spending = dec!(100);
        let config = config(GoalType::RequiredContribution, 50.0);

        let result =
            solve_goal(&scenario, &accounts(Decimal::ZERO), config).expect("must return result");
        assert!(!result.feasible);
        assert!(result.solved_value.is_none());
        assert!(result.achieved_success_rate.is_none());
    }

    #[test]
    fn max_spending_reports_open_upper_bound() {
        let config = config(GoalType::MaxSpending, 5_000.0);
        let result = solve_goal(&deterministic_scenario(), &accounts(dec!(100000)), config)
            .expect("must solve");
        assert_eq!(result.solved_value, Some(5_000.0));
        assert!(result.iterations.is_empty());
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let scenario = deterministic_scenario();
        let snapshot = accounts(dec!(1000));

        let mut bad = config(GoalType::MaxSpending, 100.0);
        bad.tolerance = 0.0;
        assert!(matches!(
            solve_goal(&scenario, &snapshot, bad),
            Err(ProjectionError::InvalidSolverConfig(_))
        ));

        let mut bad = config(GoalType::MaxSpending, 100.0);
        bad.target_success_rate = 120.0;
        assert!(solve_goal(&scenario, &snapshot, bad).is_err());

        let bad = config(GoalType::MaxSpending, 0.0);
        assert!(solve_goal(&scenario, &snapshot, bad).is_err());

        // Retired already: there is no contribution to solve for.
        let bad = config(GoalType::RequiredContribution, 100.0);
        assert!(solve_goal(&scenario, &snapshot, bad).is_err());
    }

    #[test]
    fn ci_half_width_is_zero_at_certainty() {
        assert_close(binomial_ci_half_width(1.0, 100), 0.0, 1e-12);
        assert_close(binomial_ci_half_width(0.5, 100), 0.098, 1e-12);
        assert_close(binomial_ci_half_width(0.5, 0), 0.0, 1e-12);
    }
}

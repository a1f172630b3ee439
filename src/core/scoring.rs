//! Percentile bands across simulated paths and the 0 to 100 readiness score.

use serde::Serialize;

use super::types::{ProjectionPoint, SimulationResult};

const SUCCESS_WEIGHT: f64 = 0.5;
const COVERAGE_POINTS: f64 = 30.0;
const SAVINGS_POINTS: f64 = 20.0;
const TARGET_SAVINGS_RATE: f64 = 0.15;
const UNKNOWN_INCOME_SAVINGS_POINTS: f64 = 10.0;

/// One simulated path: a balance for every age of the horizon, in order.
#[derive(Debug, Clone)]
pub struct PathOutcome {
    pub balances: Vec<f64>,
    pub depletion_age: Option<u32>,
    pub total_taxes: f64,
}

impl PathOutcome {
    fn balance_at(&self, idx: usize) -> f64 {
        self.balances.get(idx).copied().unwrap_or(0.0)
    }

    fn final_balance(&self) -> f64 {
        self.balances.last().copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Horizon {
    pub current_age: u32,
    pub retirement_age: u32,
    pub life_expectancy: u32,
}

impl Horizon {
    pub fn point_count(&self) -> usize {
        if self.life_expectancy <= self.current_age {
            return 0;
        }
        (self.life_expectancy - self.current_age + 1) as usize
    }

    pub fn years_in_retirement(&self) -> u32 {
        let start = self.retirement_age.max(self.current_age);
        self.life_expectancy.saturating_sub(start)
    }

    fn retirement_index(&self) -> usize {
        let clamped = self
            .retirement_age
            .clamp(self.current_age, self.life_expectancy);
        (clamped - self.current_age) as usize
    }
}

/// Household figures the readiness score is measured against, fixed for a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadinessBasis {
    pub portfolio: f64,
    pub annual_spending: f64,
    pub annual_savings: f64,
    /// `None` when the household's income is unknown.
    pub annual_income: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessInputs {
    /// Percent, 0 to 100.
    pub success_rate: f64,
    pub portfolio: f64,
    pub annual_spending: f64,
    pub years_in_retirement: u32,
    pub annual_savings: f64,
    pub annual_income: Option<f64>,
}

pub fn readiness_score(inputs: &ReadinessInputs) -> f64 {
    let success = (SUCCESS_WEIGHT * finite_or_zero(inputs.success_rate)).clamp(0.0, 50.0);

    let required = finite_or_zero(inputs.annual_spending) * inputs.years_in_retirement as f64;
    let coverage = if required <= 0.0 {
        COVERAGE_POINTS
    } else {
        (finite_or_zero(inputs.portfolio) / required).clamp(0.0, 1.0) * COVERAGE_POINTS
    };

    let savings = finite_or_zero(inputs.annual_savings).max(0.0);
    let savings_points = match inputs.annual_income {
        Some(income) if income.is_finite() && income > 0.0 => {
            ((savings / income) / TARGET_SAVINGS_RATE).clamp(0.0, 1.0) * SAVINGS_POINTS
        }
        _ if savings > 0.0 => UNKNOWN_INCOME_SAVINGS_POINTS,
        _ => 0.0,
    };

    (success + coverage + savings_points).clamp(0.0, 100.0)
}

/// Collapses per-path trajectories into percentile bands, success and depletion
/// statistics, and the readiness score.
pub fn aggregate(
    paths: &[PathOutcome],
    horizon: &Horizon,
    seed: u64,
    basis: &ReadinessBasis,
) -> SimulationResult {
    let points = horizon.point_count();
    if paths.is_empty() || points == 0 {
        return SimulationResult::empty(seed);
    }
    let n = paths.len();

    let mut projection = Vec::with_capacity(points);
    let mut column = Vec::with_capacity(n);
    for idx in 0..points {
        let age = horizon.current_age + idx as u32;
        column.clear();
        column.extend(paths.iter().map(|path| path.balance_at(idx)));
        let depleted = paths
            .iter()
            .filter(|path| path.depletion_age.is_some_and(|d| d <= age))
            .count();

        projection.push(ProjectionPoint {
            age,
            p10: percentile(&mut column, 10.0),
            p25: percentile(&mut column, 25.0),
            p50: percentile(&mut column, 50.0),
            p75: percentile(&mut column, 75.0),
            p90: percentile(&mut column, 90.0),
            depletion_pct: depleted as f64 / n as f64 * 100.0,
        });
    }

    let successes = paths.iter().filter(|path| path.final_balance() > 0.0).count();
    let success_rate = successes as f64 / n as f64 * 100.0;

    let mut depletion_ages: Vec<f64> = paths
        .iter()
        .filter_map(|path| path.depletion_age.map(f64::from))
        .collect();
    let median_depletion_age = if depletion_ages.len() * 2 < n {
        None
    } else {
        Some(percentile(&mut depletion_ages, 50.0).round() as u32)
    };

    let retirement_idx = horizon.retirement_index();
    let mut at_retirement: Vec<f64> = paths
        .iter()
        .map(|path| path.balance_at(retirement_idx))
        .collect();
    let mut at_end: Vec<f64> = paths.iter().map(PathOutcome::final_balance).collect();
    let mut taxes: Vec<f64> = paths.iter().map(|path| path.total_taxes).collect();

    let readiness_score = readiness_score(&ReadinessInputs {
        success_rate,
        portfolio: basis.portfolio,
        annual_spending: basis.annual_spending,
        years_in_retirement: horizon.years_in_retirement(),
        annual_savings: basis.annual_savings,
        annual_income: basis.annual_income,
    });

    SimulationResult {
        success_rate,
        readiness_score,
        median_portfolio_at_retirement: percentile(&mut at_retirement, 50.0),
        median_portfolio_at_end: percentile(&mut at_end, 50.0),
        median_depletion_age,
        median_total_taxes: percentile(&mut taxes, 50.0),
        paths_run: n as u32,
        seed,
        projection,
    }
}

/// Linear interpolation between order statistics; sorts `values` in place.
pub fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len();
    if n == 1 {
        return values[0];
    }

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (n as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        values[lower]
    } else {
        let w = rank - lower as f64;
        let (lo, hi) = (values[lower], values[upper]);
        (lo + (hi - lo) * w).clamp(lo, hi)
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

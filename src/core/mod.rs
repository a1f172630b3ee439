mod engine;
mod error;
mod healthcare;
mod life_events;
mod money;
mod payoff;
mod scoring;
mod social_security;
mod solver;
mod types;
mod withdrawal;

pub use engine::{
    QuickInputs, compare_strategies, healthcare_inputs, run_quick_simulation, run_simulation,
};
pub use error::{ProjectionError, ProjectionResult};
pub use healthcare::{
    AgeHealthcareCost, HealthcareCost, HealthcareInputs, LifetimeHealthcare, MEDICARE_AGE,
    annual_cost, irmaa_monthly, lifetime_cost,
};
pub use life_events::{
    EventCategory, InflationContext, InflationTreatment, LifeEvent, net_adjustment,
};
pub use money::{Money, round_cents, to_f64, to_money, to_rate};
pub use payoff::{Debt, PAYOFF_CAP_MONTHS, PayoffOutcome, months_to_payoff};
pub use scoring::{
    Horizon, PathOutcome, ReadinessBasis, ReadinessInputs, aggregate, percentile, readiness_score,
};
pub use social_security::{
    BenefitStream, EARLIEST_CLAIMING_AGE, FullRetirementAge, LATEST_CLAIMING_AGE,
    SocialSecurityEstimate, SocialSecurityRequest, claiming_adjustment_factor, estimate,
    estimate_aime, full_retirement_age, household_benefits, primary_insurance_amount,
    spousal_benefit,
};
pub use solver::{GoalSolveConfig, GoalSolveIteration, GoalSolveResult, GoalType, solve_goal};
pub use types::{
    AccountBuckets, AccountSnapshot, ContributionTarget, HealthcareAssumptions, ProjectionPoint,
    Scenario, SimulationResult, SocialSecurityAssumptions, SpouseBenefit, StrategyComparison,
    TaxRates, WithdrawalStrategy,
};
pub use withdrawal::{
    BucketAmounts, RMD_START_AGE, WithdrawalOutcome, required_minimum_distribution,
    uniform_lifetime_divisor, withdraw,
};

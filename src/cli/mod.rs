use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{
    AccountBuckets, AccountSnapshot, ContributionTarget, Debt, EARLIEST_CLAIMING_AGE,
    GoalSolveConfig, GoalType, HealthcareAssumptions, LATEST_CLAIMING_AGE, LifeEvent,
    LifetimeHealthcare, ProjectionError, ProjectionResult, QuickInputs, Scenario,
    SocialSecurityAssumptions, SocialSecurityRequest, TaxRates, WithdrawalStrategy,
    compare_strategies, estimate, healthcare_inputs, lifetime_cost, run_quick_simulation,
    run_simulation, solve_goal, to_money, to_rate,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliWithdrawalStrategy {
    TaxOptimized,
    SimpleRate,
    ProRata,
}

impl From<CliWithdrawalStrategy> for WithdrawalStrategy {
    fn from(value: CliWithdrawalStrategy) -> Self {
        match value {
            CliWithdrawalStrategy::TaxOptimized => WithdrawalStrategy::TaxOptimized,
            CliWithdrawalStrategy::SimpleRate => WithdrawalStrategy::SimpleRate,
            CliWithdrawalStrategy::ProRata => WithdrawalStrategy::ProRata,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliGoal {
    MaxSpending,
    RequiredContribution,
}

impl From<CliGoal> for GoalType {
    fn from(value: CliGoal) -> Self {
        match value {
            CliGoal::MaxSpending => GoalType::MaxSpending,
            CliGoal::RequiredContribution => GoalType::RequiredContribution,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "nestegg",
    about = "Monte Carlo retirement projection for a household (taxable, pre-tax, Roth and HSA)"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Full Monte Carlo run over a scenario file.
    Simulate(SimulateArgs),
    /// Pooled-balance run driven entirely by flags.
    Quick(QuickArgs),
    /// Deterministic side-by-side of every withdrawal strategy.
    Compare(ScenarioArgs),
    /// Social Security benefit estimate.
    SocialSecurity(SocialSecurityArgs),
    /// Lifetime healthcare cost breakdown.
    Healthcare(ScenarioArgs),
    /// Solve for maximum spending or required contribution.
    Solve(SolveArgs),
}

#[derive(Args, Debug, Clone, Default)]
struct ScenarioArgs {
    #[arg(
        long,
        help = "Scenario JSON file; omitted fields use the sample household"
    )]
    scenario: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct SimulateArgs {
    #[command(flatten)]
    scenario: ScenarioArgs,
    #[arg(long, help = "Number of simulated paths")]
    paths: Option<u32>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, value_enum)]
    strategy: Option<CliWithdrawalStrategy>,
}

#[derive(Args, Debug, Clone)]
struct QuickArgs {
    #[arg(long, default_value_t = 35)]
    current_age: u32,
    #[arg(long, default_value_t = 65)]
    retirement_age: u32,
    #[arg(long, default_value_t = 95)]
    life_expectancy: u32,
    #[arg(long, default_value_t = 500_000.0)]
    portfolio: f64,
    #[arg(long, default_value_t = 20_000.0)]
    contribution: f64,
    #[arg(long, default_value_t = 60_000.0)]
    spending: f64,
    #[arg(long, default_value_t = 0.0, help = "Annual income; 0 when unknown")]
    income: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Annual Social Security and pension income"
    )]
    guaranteed_income: f64,
    #[arg(long, default_value_t = 67)]
    guaranteed_income_start_age: u32,
    #[arg(
        long = "return",
        default_value_t = 6.0,
        help = "Expected annual return in percent, e.g. 6"
    )]
    expected_return: f64,
    #[arg(
        long,
        default_value_t = 15.0,
        help = "Annual return volatility in percent"
    )]
    volatility: f64,
    #[arg(long, default_value_t = 2.5, help = "Inflation in percent")]
    inflation: f64,
    #[arg(
        long,
        default_value_t = 15.0,
        help = "Effective tax rate on withdrawals in percent"
    )]
    tax_rate: f64,
    #[arg(long, default_value_t = 500)]
    paths: u32,
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug, Clone)]
struct SocialSecurityArgs {
    #[arg(long)]
    salary: f64,
    #[arg(long)]
    age: u32,
    #[arg(long)]
    birth_year: i32,
    #[arg(long, default_value_t = 67)]
    claim_age: u32,
    #[arg(long, default_value_t = 22)]
    career_start_age: u32,
    #[arg(long, help = "Known monthly PIA; skips the earnings estimate")]
    pia: Option<f64>,
}

#[derive(Args, Debug, Clone)]
struct SolveArgs {
    #[command(flatten)]
    scenario: ScenarioArgs,
    #[arg(long, value_enum)]
    goal: CliGoal,
    #[arg(long, default_value_t = 90.0, help = "Target success rate in percent")]
    target: f64,
    #[arg(long)]
    search_max: Option<f64>,
    #[arg(long)]
    tolerance: Option<f64>,
    #[arg(long, help = "Paths per bisection step")]
    paths: Option<u32>,
    #[arg(long, help = "Paths for the final evaluation")]
    final_paths: Option<u32>,
}

/// On-disk scenario. Every field is optional and falls back to the sample
/// household. Scalar rates are percentages (`7` for 7%); nested `lifeEvents`
/// and `debts` use the library shapes, whose rates are fractions.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScenarioConfig {
    pub current_age: Option<u32>,
    pub retirement_age: Option<u32>,
    pub life_expectancy: Option<u32>,
    pub pre_retirement_return: Option<f64>,
    pub post_retirement_return: Option<f64>,
    pub volatility: Option<f64>,
    pub inflation_rate: Option<f64>,
    pub medical_inflation_rate: Option<f64>,
    pub annual_spending: Option<f64>,
    pub current_annual_income: Option<f64>,
    pub pension_annual_income: Option<f64>,
    pub pension_start_age: Option<u32>,
    pub social_security: Option<SocialSecurityAssumptions>,
    pub healthcare: Option<HealthcareAssumptions>,
    pub withdrawal_strategy: Option<WithdrawalStrategy>,
    pub withdrawal_rate: Option<f64>,
    pub federal_tax_rate: Option<f64>,
    pub state_tax_rate: Option<f64>,
    pub capital_gains_rate: Option<f64>,
    pub simulations: Option<u32>,
    pub seed: Option<u64>,
    pub life_events: Vec<LifeEvent>,
    pub debts: Vec<Debt>,
    pub accounts: AccountsConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccountsConfig {
    pub taxable: Option<f64>,
    pub pre_tax: Option<f64>,
    pub roth: Option<f64>,
    pub hsa: Option<f64>,
    pub annual_contribution: Option<f64>,
    pub employer_match: Option<f64>,
    pub contribution_growth_rate: Option<f64>,
    pub contribution_target: Option<ContributionTarget>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthcareReport {
    is_married: bool,
    include_ltc: bool,
    #[serde(flatten)]
    lifetime: LifetimeHealthcare,
}

pub fn scenario_config_from_json(json: &str) -> ProjectionResult<ScenarioConfig> {
    Ok(serde_json::from_str(json)?)
}

fn load_config(path: Option<&Path>) -> ProjectionResult<ScenarioConfig> {
    match path {
        None => Ok(ScenarioConfig::default()),
        Some(path) => scenario_config_from_json(&fs::read_to_string(path)?),
    }
}

fn invalid(message: impl Into<String>) -> ProjectionError {
    ProjectionError::InvalidScenario(message.into())
}

/// Percent input to a fraction, rejecting non-finite values and values outside `range`.
fn percent(name: &str, value: f64, range: std::ops::Range<f64>) -> ProjectionResult<Decimal> {
    if !value.is_finite() || !range.contains(&value) {
        return Err(invalid(format!(
            "{name} must be in [{}, {}) percent",
            range.start, range.end
        )));
    }
    Ok(to_rate(value / 100.0))
}

fn percent_f64(name: &str, value: f64, range: std::ops::Range<f64>) -> ProjectionResult<f64> {
    if !value.is_finite() || !range.contains(&value) {
        return Err(invalid(format!(
            "{name} must be in [{}, {}) percent",
            range.start, range.end
        )));
    }
    Ok(value / 100.0)
}

/// Resolves a config against the sample household and validates it.
///
/// Hard errors are rejected; negative balances and spending are left for the
/// engine to clamp.
pub fn build_scenario(config: ScenarioConfig) -> ProjectionResult<(Scenario, AccountSnapshot)> {
    let mut scenario = Scenario::sample();
    let mut accounts = AccountSnapshot::sample();

    if let Some(age) = config.current_age {
        scenario.current_age = age;
    }
    if let Some(age) = config.retirement_age {
        scenario.retirement_age = age;
    }
    if let Some(age) = config.life_expectancy {
        scenario.life_expectancy = age;
    }
    if scenario.has_valid_horizon() && scenario.retirement_age > scenario.life_expectancy {
        return Err(invalid("retirementAge must be <= lifeExpectancy"));
    }

    if let Some(value) = config.pre_retirement_return {
        scenario.pre_retirement_return = percent_f64("preRetirementReturn", value, -95.0..250.0)?;
    }
    if let Some(value) = config.post_retirement_return {
        scenario.post_retirement_return = percent_f64("postRetirementReturn", value, -95.0..250.0)?;
    }
    if let Some(value) = config.volatility {
        scenario.volatility = percent_f64("volatility", value, 0.0..100.0)?;
    }
    if let Some(value) = config.inflation_rate {
        scenario.inflation_rate = percent("inflationRate", value, -50.0..100.0)?;
    }
    if let Some(value) = config.medical_inflation_rate {
        scenario.medical_inflation_rate = percent("medicalInflationRate", value, -50.0..100.0)?;
    }
    if let Some(value) = config.annual_spending {
        scenario.annual_spending = to_money(value);
    }
    if let Some(value) = config.current_annual_income {
        scenario.current_annual_income = to_money(value);
    }
    if let Some(value) = config.pension_annual_income {
        scenario.pension_annual_income = to_money(value);
    }
    if let Some(age) = config.pension_start_age {
        scenario.pension_start_age = age;
    }

    if let Some(social_security) = config.social_security {
        validate_social_security(&social_security)?;
        scenario.social_security = social_security;
    }
    if let Some(healthcare) = config.healthcare {
        if healthcare.include_ltc && healthcare.ltc_duration_years == 0 {
            return Err(invalid(
                "healthcare.ltcDurationYears must be > 0 when LTC is included",
            ));
        }
        scenario.healthcare = Some(healthcare);
    }

    if let Some(strategy) = config.withdrawal_strategy {
        scenario.withdrawal_strategy = strategy;
    }
    if let Some(value) = config.withdrawal_rate {
        let rate = percent("withdrawalRate", value, 0.0..100.0)?;
        if rate.is_zero() {
            return Err(invalid("withdrawalRate must be > 0"));
        }
        scenario.withdrawal_rate = rate;
    }

    let defaults = TaxRates::default();
    scenario.tax_rates = TaxRates {
        federal: match config.federal_tax_rate {
            Some(value) => percent("federalTaxRate", value, 0.0..100.0)?,
            None => defaults.federal,
        },
        state: match config.state_tax_rate {
            Some(value) => percent("stateTaxRate", value, 0.0..100.0)?,
            None => defaults.state,
        },
        capital_gains: match config.capital_gains_rate {
            Some(value) => percent("capitalGainsRate", value, 0.0..100.0)?,
            None => defaults.capital_gains,
        },
    };
    if scenario.tax_rates.federal + scenario.tax_rates.state >= Decimal::ONE {
        return Err(invalid("federalTaxRate + stateTaxRate must be < 100"));
    }

    if let Some(simulations) = config.simulations {
        if simulations == 0 {
            return Err(invalid("simulations must be > 0"));
        }
        scenario.simulations = simulations;
    }
    scenario.seed = config.seed;

    for event in &config.life_events {
        event.validate()?;
    }
    scenario.life_events = config.life_events;

    for debt in &config.debts {
        if !debt.annual_rate.is_finite() || debt.annual_rate < 0.0 {
            return Err(invalid(format!(
                "debt '{}' annualRate must be >= 0",
                debt.name
            )));
        }
    }
    scenario.debts = config.debts;

    let account_config = config.accounts;
    let sample = accounts.buckets;
    accounts.buckets = AccountBuckets::new(
        account_config.taxable.map(to_money).unwrap_or(sample.taxable),
        account_config.pre_tax.map(to_money).unwrap_or(sample.pre_tax),
        account_config.roth.map(to_money).unwrap_or(sample.roth),
        account_config.hsa.map(to_money).unwrap_or(sample.hsa),
    );
    if let Some(value) = account_config.annual_contribution {
        accounts.annual_contribution = to_money(value);
    }
    if let Some(value) = account_config.employer_match {
        accounts.employer_match = to_money(value);
    }
    if let Some(value) = account_config.contribution_growth_rate {
        accounts.contribution_growth_rate =
            percent("accounts.contributionGrowthRate", value, -50.0..100.0)?;
    }
    if let Some(target) = account_config.contribution_target {
        accounts.contribution_target = target;
    }

    Ok((scenario, accounts))
}

fn validate_social_security(assumptions: &SocialSecurityAssumptions) -> ProjectionResult<()> {
    let claiming_ok = |age: u32| (EARLIEST_CLAIMING_AGE..=LATEST_CLAIMING_AGE).contains(&age);
    match assumptions {
        SocialSecurityAssumptions::None => Ok(()),
        SocialSecurityAssumptions::Manual { claiming_age, .. }
        | SocialSecurityAssumptions::Estimated { claiming_age, .. }
            if !claiming_ok(*claiming_age) =>
        {
            Err(invalid(
                "socialSecurity.claimingAge must be between 62 and 70",
            ))
        }
        SocialSecurityAssumptions::Estimated {
            spouse: Some(spouse),
            ..
        } if !claiming_ok(spouse.claiming_age) => Err(invalid(
            "socialSecurity.spouse.claimingAge must be between 62 and 70",
        )),
        _ => Ok(()),
    }
}

fn quick_inputs(args: &QuickArgs) -> ProjectionResult<QuickInputs> {
    if args.paths == 0 {
        return Err(invalid("--paths must be > 0"));
    }
    if args.retirement_age > args.life_expectancy && args.life_expectancy > args.current_age {
        return Err(invalid("--retirement-age must be <= --life-expectancy"));
    }
    Ok(QuickInputs {
        current_age: args.current_age,
        retirement_age: args.retirement_age,
        life_expectancy: args.life_expectancy,
        portfolio: to_money(args.portfolio),
        annual_contribution: to_money(args.contribution),
        annual_spending: to_money(args.spending),
        annual_income: to_money(args.income),
        guaranteed_income: to_money(args.guaranteed_income),
        guaranteed_income_start_age: args.guaranteed_income_start_age,
        expected_return: percent_f64("--return", args.expected_return, -95.0..250.0)?,
        volatility: percent_f64("--volatility", args.volatility, 0.0..100.0)?,
        inflation_rate: percent("--inflation", args.inflation, -50.0..100.0)?,
        effective_tax_rate: percent("--tax-rate", args.tax_rate, 0.0..95.0)?,
        simulations: args.paths,
        seed: args.seed,
    })
}

fn solve_config(args: &SolveArgs) -> GoalSolveConfig {
    let mut config = GoalSolveConfig::new(args.goal.into(), args.target);
    if let Some(search_max) = args.search_max {
        config.search_max = search_max;
    }
    if let Some(tolerance) = args.tolerance {
        config.tolerance = tolerance;
    }
    if let Some(paths) = args.paths {
        config.simulations_per_iteration = paths;
    }
    if let Some(paths) = args.final_paths {
        config.final_simulations = paths;
    }
    config
}

fn scenario_from_args(args: &ScenarioArgs) -> anyhow::Result<(Scenario, AccountSnapshot)> {
    let path = args.scenario.as_deref();
    let config = load_config(path).with_context(|| match path {
        Some(path) => format!("failed to load scenario {}", path.display()),
        None => "failed to build default scenario".to_string(),
    })?;
    Ok(build_scenario(config)?)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Simulate(args) => {
            let (mut scenario, accounts) = scenario_from_args(&args.scenario)?;
            if let Some(paths) = args.paths {
                anyhow::ensure!(paths > 0, "--paths must be > 0");
                scenario.simulations = paths;
            }
            if args.seed.is_some() {
                scenario.seed = args.seed;
            }
            if let Some(strategy) = args.strategy {
                scenario.withdrawal_strategy = strategy.into();
            }
            print_json(&run_simulation(&scenario, &accounts))
        }
        Command::Quick(args) => print_json(&run_quick_simulation(&quick_inputs(&args)?)),
        Command::Compare(args) => {
            let (scenario, accounts) = scenario_from_args(&args)?;
            print_json(&compare_strategies(
                &scenario,
                &accounts,
                &WithdrawalStrategy::ALL,
            ))
        }
        Command::SocialSecurity(args) => {
            anyhow::ensure!(
                (EARLIEST_CLAIMING_AGE..=LATEST_CLAIMING_AGE).contains(&args.claim_age),
                "--claim-age must be between 62 and 70"
            );
            let mut request = SocialSecurityRequest::new(
                to_money(args.salary),
                args.age,
                args.birth_year,
                args.claim_age,
            );
            request.career_start_age = args.career_start_age;
            request.manual_pia_override = args.pia.map(to_money);
            print_json(&estimate(&request))
        }
        Command::Healthcare(args) => {
            let (scenario, _) = scenario_from_args(&args)?;
            let assumptions = scenario.healthcare.clone().unwrap_or_default();
            let inputs = healthcare_inputs(&scenario, &assumptions);
            print_json(&HealthcareReport {
                is_married: assumptions.is_married,
                include_ltc: assumptions.include_ltc,
                lifetime: lifetime_cost(&inputs, scenario.life_expectancy),
            })
        }
        Command::Solve(args) => {
            let (scenario, accounts) = scenario_from_args(&args.scenario)?;
            print_json(&solve_goal(&scenario, &accounts, solve_config(&args))?)
        }
    }
}

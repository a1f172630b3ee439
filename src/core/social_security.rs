//! Social Security benefit estimation: salary → AIME → PIA → claiming-age benefit.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use super::money::{Money, growth_factor, round_cents};
use super::types::SocialSecurityAssumptions;

pub const BEND_POINT_1: Money = dec!(1174);
pub const BEND_POINT_2: Money = dec!(7078);
pub const TAXABLE_MAXIMUM: Money = dec!(168600);
pub const WAGE_GROWTH_RATE: Decimal = dec!(0.025);
pub const COMPUTATION_YEARS: usize = 35;
pub const EARLIEST_CLAIMING_AGE: u32 = 62;
pub const LATEST_CLAIMING_AGE: u32 = 70;

const MONTHS_PER_YEAR: u32 = 12;
const REDUCED_MONTHS_TIER: u32 = 36;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FullRetirementAge {
    pub months: u32,
}

impl FullRetirementAge {
    pub fn from_years_months(years: u32, months: u32) -> Self {
        Self {
            months: years * MONTHS_PER_YEAR + months,
        }
    }

    pub fn years(self) -> u32 {
        self.months / MONTHS_PER_YEAR
    }

    pub fn extra_months(self) -> u32 {
        self.months % MONTHS_PER_YEAR
    }

    pub fn as_years(self) -> f64 {
        self.months as f64 / MONTHS_PER_YEAR as f64
    }
}

#[derive(Clone, Debug)]
pub struct SocialSecurityRequest {
    pub current_salary: Money,
    pub current_age: u32,
    pub birth_year: i32,
    pub claiming_age: u32,
    pub career_start_age: u32,
    pub manual_pia_override: Option<Money>,
}

impl SocialSecurityRequest {
    pub fn new(
        current_salary: Money,
        current_age: u32,
        birth_year: i32,
        claiming_age: u32,
    ) -> Self {
        Self {
            current_salary,
            current_age,
            birth_year,
            claiming_age,
            career_start_age: 22,
            manual_pia_override: None,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialSecurityEstimate {
    pub estimated_pia: Money,
    pub monthly_at_62: Money,
    pub monthly_at_fra: Money,
    pub monthly_at_70: Money,
    pub fra_age: FullRetirementAge,
    pub claiming_age: u32,
    pub monthly_benefit: Money,
}

/// Full retirement age by birth year, with the two-month transitional steps.
pub fn full_retirement_age(birth_year: i32) -> FullRetirementAge {
    let months = match birth_year {
        y if y <= 1937 => 65 * 12,
        y @ 1938..=1942 => 65 * 12 + 2 * (y - 1937) as u32,
        1943..=1954 => 66 * 12,
        y @ 1955..=1959 => 66 * 12 + 2 * (y - 1954) as u32,
        _ => 67 * 12,
    };
    FullRetirementAge { months }
}

/// Average indexed monthly earnings from a salary back-projected over the career.
pub fn estimate_aime(current_salary: Money, current_age: u32, career_start_age: u32) -> Money {
    if current_salary <= Decimal::ZERO || current_age < career_start_age {
        return Decimal::ZERO;
    }

    let mut earnings: Vec<Money> = (0..=current_age - career_start_age)
        .map(|years_ago| {
            let factor = growth_factor(WAGE_GROWTH_RATE, years_ago);
            current_salary
                .checked_div(factor)
                .unwrap_or(Decimal::ZERO)
                .min(TAXABLE_MAXIMUM)
        })
        .collect();

    earnings.sort_by(|a, b| b.cmp(a));
    let top: Money = earnings.iter().take(COMPUTATION_YEARS).sum();
    let months = Decimal::from(COMPUTATION_YEARS as u32 * MONTHS_PER_YEAR);
    round_cents(top / months)
}

/// Three-segment bend-point formula.
pub fn primary_insurance_amount(aime: Money) -> Money {
    if aime <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let first = aime.min(BEND_POINT_1);
    let second = (aime.min(BEND_POINT_2) - BEND_POINT_1).max(Decimal::ZERO);
    let third = (aime - BEND_POINT_2).max(Decimal::ZERO);
    dec!(0.90) * first + dec!(0.32) * second + dec!(0.15) * third
}

/// Multiplier on PIA for claiming at `claiming_months` of age.
pub fn claiming_adjustment_factor(fra: FullRetirementAge, claiming_months: u32) -> Decimal {
    let claiming_months = claiming_months.clamp(
        EARLIEST_CLAIMING_AGE * MONTHS_PER_YEAR,
        LATEST_CLAIMING_AGE * MONTHS_PER_YEAR,
    );

    if claiming_months < fra.months {
        let early = fra.months - claiming_months;
        let first_tier = early.min(REDUCED_MONTHS_TIER);
        let second_tier = early - first_tier;
        let reduction = Decimal::from(first_tier * 5) / dec!(900)
            + Decimal::from(second_tier * 5) / dec!(1200);
        Decimal::ONE - reduction
    } else {
        let delayed = claiming_months - fra.months;
        Decimal::ONE + Decimal::from(delayed * 2) / dec!(300)
    }
}

pub fn estimate(request: &SocialSecurityRequest) -> SocialSecurityEstimate {
    let pia = match request.manual_pia_override {
        Some(pia) => pia.max(Decimal::ZERO),
        None => primary_insurance_amount(estimate_aime(
            request.current_salary,
            request.current_age,
            request.career_start_age,
        )),
    };

    let fra = full_retirement_age(request.birth_year);
    let claiming_age = request
        .claiming_age
        .clamp(EARLIEST_CLAIMING_AGE, LATEST_CLAIMING_AGE);
    let at = |age_months: u32| round_cents(pia * claiming_adjustment_factor(fra, age_months));

    SocialSecurityEstimate {
        estimated_pia: round_cents(pia),
        monthly_at_62: at(EARLIEST_CLAIMING_AGE * MONTHS_PER_YEAR),
        monthly_at_fra: at(fra.months),
        monthly_at_70: at(LATEST_CLAIMING_AGE * MONTHS_PER_YEAR),
        fra_age: fra,
        claiming_age,
        monthly_benefit: at(claiming_age * MONTHS_PER_YEAR),
    }
}

/// Spouse's monthly benefit: the larger of their own adjusted benefit and half the
/// worker's PIA with spousal early-claiming reductions (no delayed credits).
pub fn spousal_benefit(
    worker_pia: Money,
    spouse_own_pia: Money,
    spouse_fra: FullRetirementAge,
    spouse_claiming_months: u32,
) -> Money {
    let claiming_months = spouse_claiming_months.clamp(
        EARLIEST_CLAIMING_AGE * MONTHS_PER_YEAR,
        LATEST_CLAIMING_AGE * MONTHS_PER_YEAR,
    );

    let spousal_factor = if claiming_months < spouse_fra.months {
        let early = spouse_fra.months - claiming_months;
        let first_tier = early.min(REDUCED_MONTHS_TIER);
        let second_tier = early - first_tier;
        Decimal::ONE
            - Decimal::from(first_tier * 25) / dec!(3600)
            - Decimal::from(second_tier * 5) / dec!(1200)
    } else {
        Decimal::ONE
    };

    let spousal = worker_pia.max(Decimal::ZERO) * dec!(0.5) * spousal_factor;
    let own = spouse_own_pia.max(Decimal::ZERO)
        * claiming_adjustment_factor(spouse_fra, claiming_months);
    round_cents(own.max(spousal))
}

/// One household member's benefit, starting at a given age of the primary planner.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BenefitStream {
    pub start_age: u32,
    pub annual: Money,
}

/// Resolves the scenario's assumptions into annual benefit streams in today's dollars.
pub fn household_benefits(
    assumptions: &SocialSecurityAssumptions,
    current_age: u32,
) -> Vec<BenefitStream> {
    match assumptions {
        SocialSecurityAssumptions::None => Vec::new(),
        SocialSecurityAssumptions::Manual {
            monthly_benefit,
            claiming_age,
        } => vec![BenefitStream {
            start_age: *claiming_age,
            annual: (*monthly_benefit).max(Decimal::ZERO) * Decimal::from(MONTHS_PER_YEAR),
        }],
        SocialSecurityAssumptions::Estimated {
            current_salary,
            birth_year,
            claiming_age,
            career_start_age,
            manual_pia_override,
            spouse,
        } => {
            let request = SocialSecurityRequest {
                current_salary: *current_salary,
                current_age,
                birth_year: *birth_year,
                claiming_age: *claiming_age,
                career_start_age: *career_start_age,
                manual_pia_override: *manual_pia_override,
            };
            let worker = estimate(&request);
            let mut streams = vec![BenefitStream {
                start_age: worker.claiming_age,
                annual: worker.monthly_benefit * Decimal::from(MONTHS_PER_YEAR),
            }];

            if let Some(spouse) = spouse {
                let spouse_fra = full_retirement_age(spouse.birth_year);
                let spouse_claiming_age = spouse
                    .claiming_age
                    .clamp(EARLIEST_CLAIMING_AGE, LATEST_CLAIMING_AGE);
                let monthly = spousal_benefit(
                    worker.estimated_pia,
                    spouse.own_pia,
                    spouse_fra,
                    spouse_claiming_age * MONTHS_PER_YEAR,
                );
                // Spouse claims at their own age; shift onto the planner's age axis.
                let offset = spouse.birth_year - birth_year;
                let start_age = (spouse_claiming_age as i64 + offset as i64).max(0) as u32;
                streams.push(BenefitStream {
                    start_age,
                    annual: monthly * Decimal::from(MONTHS_PER_YEAR),
                });
            }
            streams
        }
    }
}

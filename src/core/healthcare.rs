//! Annual healthcare cost by life phase: marketplace cover before 65, Medicare
//! with IRMAA surcharges from 65, and an optional long-term-care window.
//!
//! All constants are monthly amounts in today's dollars and are inflated at the
//! medical inflation rate from the household's current age.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use super::money::{Money, growth_factor, round_cents};

pub const MEDICARE_AGE: u32 = 65;

const ACA_MONTHLY_SINGLE: Money = dec!(650);
const ACA_MONTHLY_COUPLE: Money = dec!(1300);
const PART_B_MONTHLY: Money = dec!(174.70);
const PART_D_MONTHLY: Money = dec!(55.50);
const MEDIGAP_MONTHLY: Money = dec!(150);
const OUT_OF_POCKET_ANNUAL: Money = dec!(3000);
const LTC_HOME_CARE_MONTHLY: Money = dec!(5900);
const LTC_FACILITY_MONTHLY: Money = dec!(9000);
const MONTHS: Money = dec!(12);

struct IrmaaBracket {
    /// Inclusive single-filer ceiling; `None` for the top bracket.
    max_income: Option<Money>,
    part_b: Money,
    part_d: Money,
}

const IRMAA_BRACKETS: [IrmaaBracket; 6] = [
    IrmaaBracket {
        max_income: Some(dec!(103000)),
        part_b: dec!(0),
        part_d: dec!(0),
    },
    IrmaaBracket {
        max_income: Some(dec!(129000)),
        part_b: dec!(69.90),
        part_d: dec!(12.90),
    },
    IrmaaBracket {
        max_income: Some(dec!(161000)),
        part_b: dec!(174.70),
        part_d: dec!(33.30),
    },
    IrmaaBracket {
        max_income: Some(dec!(193000)),
        part_b: dec!(279.50),
        part_d: dec!(53.80),
    },
    IrmaaBracket {
        max_income: Some(dec!(499999.99)),
        part_b: dec!(384.30),
        part_d: dec!(74.20),
    },
    IrmaaBracket {
        max_income: None,
        part_b: dec!(419.30),
        part_d: dec!(81.00),
    },
];

#[derive(Clone, Debug)]
pub struct HealthcareInputs {
    /// Annual retirement income in today's dollars, used for the IRMAA lookup.
    pub retirement_income: Money,
    pub is_married: bool,
    pub include_ltc: bool,
    pub ltc_start_age: u32,
    pub ltc_duration_years: u32,
    pub current_age: u32,
    pub medical_inflation_rate: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthcareCost {
    pub aca_insurance: Money,
    pub medicare_part_b: Money,
    pub medicare_part_d: Money,
    pub medigap: Money,
    pub irmaa_surcharge: Money,
    pub out_of_pocket: Money,
    pub long_term_care: Money,
    pub total: Money,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeHealthcareCost {
    pub age: u32,
    pub cost: HealthcareCost,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifetimeHealthcare {
    pub pre_medicare: Money,
    pub medicare: Money,
    pub long_term_care: Money,
    pub total: Money,
    pub by_age: Vec<AgeHealthcareCost>,
}

/// Monthly IRMAA add-ons (Part B, Part D) per person for the given income.
pub fn irmaa_monthly(retirement_income: Money, is_married: bool) -> (Money, Money) {
    let multiplier = if is_married { dec!(2) } else { Decimal::ONE };
    for bracket in &IRMAA_BRACKETS {
        match bracket.max_income {
            Some(ceiling) if retirement_income <= ceiling * multiplier => {
                return (bracket.part_b, bracket.part_d);
            }
            Some(_) => continue,
            None => return (bracket.part_b, bracket.part_d),
        }
    }
    (Decimal::ZERO, Decimal::ZERO)
}

pub fn ltc_active(inputs: &HealthcareInputs, age: u32) -> bool {
    inputs.include_ltc
        && age >= inputs.ltc_start_age
        && age < inputs.ltc_start_age.saturating_add(inputs.ltc_duration_years)
}

pub fn annual_cost(inputs: &HealthcareInputs, age: u32) -> HealthcareCost {
    let inflation = growth_factor(
        inputs.medical_inflation_rate,
        age.saturating_sub(inputs.current_age),
    );
    let persons = if inputs.is_married {
        dec!(2)
    } else {
        Decimal::ONE
    };
    let annualize =
        |monthly: Money, people: Money| round_cents(monthly * MONTHS * people * inflation);

    let mut cost = HealthcareCost::default();

    if age < MEDICARE_AGE {
        let monthly = if inputs.is_married {
            ACA_MONTHLY_COUPLE
        } else {
            ACA_MONTHLY_SINGLE
        };
        cost.aca_insurance = annualize(monthly, Decimal::ONE);
    } else {
        let (irmaa_b, irmaa_d) = irmaa_monthly(inputs.retirement_income, inputs.is_married);
        cost.medicare_part_b = annualize(PART_B_MONTHLY, persons);
        cost.medicare_part_d = annualize(PART_D_MONTHLY, persons);
        cost.medigap = annualize(MEDIGAP_MONTHLY, persons);
        cost.irmaa_surcharge = annualize(irmaa_b + irmaa_d, persons);
    }

    cost.out_of_pocket = round_cents(OUT_OF_POCKET_ANNUAL * persons * inflation);

    if ltc_active(inputs, age) {
        let monthly = if age == inputs.ltc_start_age {
            LTC_HOME_CARE_MONTHLY
        } else {
            LTC_FACILITY_MONTHLY
        };
        cost.long_term_care = annualize(monthly, Decimal::ONE);
    }

    cost.total = cost.aca_insurance
        + cost.medicare_part_b
        + cost.medicare_part_d
        + cost.medigap
        + cost.irmaa_surcharge
        + cost.out_of_pocket
        + cost.long_term_care;
    cost
}

/// Sums [`annual_cost`] from the current age through life expectancy and
/// splits the total into pre-Medicare, Medicare and long-term-care phases.
pub fn lifetime_cost(inputs: &HealthcareInputs, life_expectancy: u32) -> LifetimeHealthcare {
    let mut lifetime = LifetimeHealthcare::default();
    if life_expectancy < inputs.current_age {
        return lifetime;
    }

    for age in inputs.current_age..=life_expectancy {
        let cost = annual_cost(inputs, age);
        let non_ltc = cost.total - cost.long_term_care;
        if age < MEDICARE_AGE {
            lifetime.pre_medicare += non_ltc;
        } else {
            lifetime.medicare += non_ltc;
        }
        lifetime.long_term_care += cost.long_term_care;
        lifetime.total += cost.total;
        lifetime.by_age.push(AgeHealthcareCost { age, cost });
    }

    lifetime
}

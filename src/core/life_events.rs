use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::error::{ProjectionError, ProjectionResult};
use super::money::{Money, growth_factor, round_cents};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Child,
    Pet,
    HomePurchase,
    HomeDownsize,
    CareerChange,
    Bonus,
    Healthcare,
    Travel,
    Vehicle,
    ElderCare,
    Custom,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "rate", rename_all = "snake_case")]
pub enum InflationTreatment {
    Standard,
    Medical,
    Custom(Decimal),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifeEvent {
    pub name: String,
    pub category: EventCategory,
    pub start_age: u32,
    #[serde(default)]
    pub end_age: Option<u32>,
    #[serde(default)]
    pub annual_cost: Option<Money>,
    #[serde(default)]
    pub one_time_cost: Option<Money>,
    #[serde(default)]
    pub income_change: Option<Money>,
    #[serde(default = "default_inflation")]
    pub inflation: InflationTreatment,
}

fn default_inflation() -> InflationTreatment {
    InflationTreatment::Standard
}

/// Rates a life event can be inflated by, anchored at the scenario's current age.
#[derive(Copy, Clone, Debug)]
pub struct InflationContext {
    pub current_age: u32,
    pub inflation_rate: Decimal,
    pub medical_inflation_rate: Decimal,
}

impl LifeEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        category: EventCategory,
        start_age: u32,
        end_age: Option<u32>,
        annual_cost: Option<Money>,
        one_time_cost: Option<Money>,
        income_change: Option<Money>,
        inflation: InflationTreatment,
    ) -> ProjectionResult<Self> {
        let event = Self {
            name: name.into(),
            category,
            start_age,
            end_age,
            annual_cost,
            one_time_cost,
            income_change,
            inflation,
        };
        event.validate()?;
        Ok(event)
    }

    pub fn validate(&self) -> ProjectionResult<()> {
        let invalid = |reason: &str| ProjectionError::InvalidLifeEvent {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.annual_cost.is_none()
            && self.one_time_cost.is_none()
            && self.income_change.is_none()
        {
            return Err(invalid(
                "at least one of annual_cost, one_time_cost or income_change must be set",
            ));
        }
        if let Some(end) = self.end_age
            && end < self.start_age
        {
            return Err(invalid("end_age must be >= start_age"));
        }
        for (label, amount) in [
            ("annual_cost", self.annual_cost),
            ("one_time_cost", self.one_time_cost),
        ] {
            if amount.is_some_and(|v| v < Decimal::ZERO) {
                return Err(invalid(&format!("{label} must be >= 0")));
            }
        }
        if let InflationTreatment::Custom(rate) = self.inflation
            && rate <= dec!(-1)
        {
            return Err(invalid("custom inflation rate must be > -100%"));
        }
        Ok(())
    }

    /// Planning defaults for a category, in today's dollars.
    pub fn template(category: EventCategory, start_age: u32) -> Self {
        #[rustfmt::skip]
        let (name, end_offset, annual, one_time, income, inflation) = match category {
            EventCategory::Child => ("Child", Some(17), Some(dec!(15000)), None, None, InflationTreatment::Standard),
            EventCategory::Pet => ("Pet", Some(12), Some(dec!(1500)), Some(dec!(500)), None, InflationTreatment::Standard),
            EventCategory::HomePurchase => ("Home purchase", None, None, Some(dec!(80000)), None, InflationTreatment::Standard),
            EventCategory::HomeDownsize => ("Downsize home", None, None, None, Some(dec!(150000)), InflationTreatment::Standard),
            EventCategory::CareerChange => ("Career change", Some(2), None, Some(dec!(10000)), Some(dec!(-20000)), InflationTreatment::Standard),
            EventCategory::Bonus => ("Bonus", None, None, None, Some(dec!(10000)), InflationTreatment::Standard),
            EventCategory::Healthcare => ("Medical expense", None, None, Some(dec!(10000)), None, InflationTreatment::Medical),
            EventCategory::Travel => ("Travel", Some(9), Some(dec!(8000)), None, None, InflationTreatment::Standard),
            EventCategory::Vehicle => ("Vehicle", None, None, Some(dec!(35000)), None, InflationTreatment::Standard),
            EventCategory::ElderCare => ("Elder care", Some(4), Some(dec!(20000)), None, None, InflationTreatment::Medical),
            EventCategory::Custom => ("Custom event", None, None, Some(dec!(5000)), None, InflationTreatment::Standard),
        };

        Self {
            name: name.to_string(),
            category,
            start_age,
            end_age: end_offset.map(|offset| start_age + offset),
            annual_cost: annual,
            one_time_cost: one_time,
            income_change: income,
            inflation,
        }
    }

    /// Whether the event's annual effects apply at `age`. Events without an end age
    /// are one-time and active only in their start year.
    pub fn is_active(&self, age: u32) -> bool {
        let end = self.end_age.unwrap_or(self.start_age);
        age >= self.start_age && age <= end
    }

    fn inflation_rate(&self, ctx: &InflationContext) -> Decimal {
        match self.inflation {
            InflationTreatment::Standard => ctx.inflation_rate,
            InflationTreatment::Medical => ctx.medical_inflation_rate,
            InflationTreatment::Custom(rate) => rate,
        }
    }

    /// Signed cash effect of this event at `age` in nominal dollars.
    pub fn cash_flow_at(&self, age: u32, ctx: &InflationContext) -> Money {
        let mut flow = Decimal::ZERO;
        if self.is_active(age) {
            flow += self.income_change.unwrap_or(Decimal::ZERO);
            flow -= self.annual_cost.unwrap_or(Decimal::ZERO);
        }
        if age == self.start_age {
            flow -= self.one_time_cost.unwrap_or(Decimal::ZERO);
        }
        if flow.is_zero() {
            return flow;
        }

        let elapsed = age.saturating_sub(ctx.current_age);
        let factor = growth_factor(self.inflation_rate(ctx), elapsed);
        round_cents(flow * factor)
    }
}

/// Net annual cash adjustment from all events at `age`: negative for added
/// cost, positive for added income.
pub fn net_adjustment(events: &[LifeEvent], age: u32, ctx: &InflationContext) -> Money {
    events.iter().map(|event| event.cash_flow_at(age, ctx)).sum()
}

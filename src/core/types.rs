use serde::Serialize;

/// Longest horizon the engine will project; longer requests are clamped.
pub const MAX_PROJECTION_YEARS: u32 = 100;

/// Inputs for one projection. Rates and percentages are annual percents (5.99 = 5.99%).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationConfig {
    pub home_value_start: f64,
    pub home_value_growth_pct: f64,
    pub home_loan_start: f64,
    pub offset_balance_start: f64,
    pub kickstart_from_offset: f64,
    pub remaining_term_years_start: f64,
    pub home_rate_pct: f64,
    pub invest_loan_rate_pct: f64,
    pub base_monthly_repayment: f64,
    pub invest_growth_pct: f64,
    pub invest_yield_pct: f64,
    pub franked_portion_pct: f64,
    pub marginal_tax_rate_pct: f64,
    pub projection_years: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            home_value_start: 900_000.0,
            home_value_growth_pct: 3.0,
            home_loan_start: 600_000.0,
            offset_balance_start: 50_000.0,
            kickstart_from_offset: 30_000.0,
            remaining_term_years_start: 25.0,
            home_rate_pct: 5.99,
            invest_loan_rate_pct: 5.99,
            base_monthly_repayment: 4_000.0,
            invest_growth_pct: 5.0,
            invest_yield_pct: 3.0,
            franked_portion_pct: 30.0,
            marginal_tax_rate_pct: 39.0,
            projection_years: 20,
        }
    }
}

impl SimulationConfig {
    /// Coerces every field into the engine's domain: non-finite or negative values
    /// become 0, percentages that are shares of a whole are capped at 100 and the
    /// horizon is capped at [`MAX_PROJECTION_YEARS`].
    pub fn sanitized(&self) -> Self {
        Self {
            home_value_start: non_negative(self.home_value_start),
            home_value_growth_pct: non_negative(self.home_value_growth_pct),
            home_loan_start: non_negative(self.home_loan_start),
            offset_balance_start: non_negative(self.offset_balance_start),
            kickstart_from_offset: non_negative(self.kickstart_from_offset),
            remaining_term_years_start: non_negative(self.remaining_term_years_start),
            home_rate_pct: non_negative(self.home_rate_pct),
            invest_loan_rate_pct: non_negative(self.invest_loan_rate_pct),
            base_monthly_repayment: non_negative(self.base_monthly_repayment),
            invest_growth_pct: non_negative(self.invest_growth_pct),
            invest_yield_pct: non_negative(self.invest_yield_pct),
            franked_portion_pct: non_negative(self.franked_portion_pct).min(100.0),
            marginal_tax_rate_pct: non_negative(self.marginal_tax_rate_pct).min(100.0),
            projection_years: self.projection_years.min(MAX_PROJECTION_YEARS),
        }
    }
}

pub(crate) fn non_negative(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}

/// Which side of the tax line a loan split sits on.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SplitKind {
    HomeNonDeductible,
    InvestmentDeductible,
}

/// End-of-year position of both strategies. Strategy A is the do-nothing baseline,
/// Strategy B recycles home debt into investment debt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearSnapshot {
    pub year: u32,
    pub house_value: f64,
    pub home_loan_a: f64,
    pub offset_balance_a: f64,
    pub net_wealth_a: f64,
    pub home_loan_b: f64,
    pub invest_loan_b: f64,
    pub offset_balance_b: f64,
    pub portfolio_b: f64,
    pub cost_base: f64,
    pub net_wealth_b: f64,
    pub after_tax_liquidation_value: f64,
    pub total_debt_b: f64,
    pub surplus_if_liquidated: f64,
    pub monthly_repayment_a: f64,
    pub monthly_repayment_b: f64,
    pub monthly_sweep_applied: f64,
    pub after_tax_income_sweep: f64,
    pub redraw_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub years: Vec<YearSnapshot>,
    pub debt_free_year: Option<u32>,
    pub required_minimum_a: f64,
    pub required_minimum_b: f64,
    pub effective_repayment_a: f64,
    pub effective_repayment_b: f64,
    pub kickstart_applied: f64,
    pub net_wealth_advantage: f64,
}

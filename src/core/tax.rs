use super::types::non_negative;

/// Flat company tax rate assumed to sit behind franked dividends.
pub const COMPANY_TAX_RATE: f64 = 0.30;
/// Share of a long-held capital gain that is exempt from tax.
pub const CGT_DISCOUNT: f64 = 0.50;

/// Inputs for one year's after-tax income sweep. All rates are annual percents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncomeSweepInputs {
    pub portfolio_opening_balance: f64,
    pub yield_pct: f64,
    pub franked_portion_pct: f64,
    pub marginal_tax_rate_pct: f64,
    pub avg_deductible_loan_balance: f64,
    pub invest_loan_rate_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncomeSweep {
    pub cash_income: f64,
    pub franking_credit: f64,
    pub assessable_income: f64,
    pub deductible_interest: f64,
    pub net_tax: f64,
    /// Negative when the year's tax position costs the household money.
    pub after_tax_cash_to_home_loan: f64,
}

pub fn income_sweep(inputs: &IncomeSweepInputs) -> IncomeSweep {
    let cash_income =
        non_negative(inputs.portfolio_opening_balance) * pct(inputs.yield_pct);
    let franked_portion = cash_income * pct(inputs.franked_portion_pct).min(1.0);
    let unfranked_portion = cash_income - franked_portion;

    let retained = 1.0 - COMPANY_TAX_RATE;
    let grossed_up = franked_portion / if retained == 0.0 { 1.0 } else { retained };
    let franking_credit = grossed_up - franked_portion;

    let assessable_income = unfranked_portion + grossed_up;
    let deductible_interest =
        non_negative(inputs.avg_deductible_loan_balance) * pct(inputs.invest_loan_rate_pct);
    let taxable_result = assessable_income - deductible_interest;
    let tax_payable = taxable_result * pct(inputs.marginal_tax_rate_pct).min(1.0);
    let net_tax = tax_payable - franking_credit;

    IncomeSweep {
        cash_income,
        franking_credit,
        assessable_income,
        deductible_interest,
        net_tax,
        after_tax_cash_to_home_loan: cash_income - net_tax,
    }
}

/// Proceeds from selling the whole portfolio today after discounted capital gains tax.
pub fn after_tax_liquidation(current_value: f64, cost_base: f64, marginal_tax_rate_pct: f64) -> f64 {
    let value = non_negative(current_value);
    let gain = value - non_negative(cost_base);
    if gain <= 0.0 {
        return value;
    }

    let taxable_gain = gain * (1.0 - CGT_DISCOUNT);
    let cgt = taxable_gain * pct(marginal_tax_rate_pct).min(1.0);
    (value - cgt).max(0.0)
}

pub fn surplus_if_liquidated(
    current_value: f64,
    cost_base: f64,
    marginal_tax_rate_pct: f64,
    total_outstanding_debt: f64,
) -> f64 {
    after_tax_liquidation(current_value, cost_base, marginal_tax_rate_pct)
        - non_negative(total_outstanding_debt)
}

fn pct(value: f64) -> f64 {
    non_negative(value) / 100.0
}

use tracing::trace;

use super::amortization::{level_payment_for_periods, monthly_rate};
use super::tax::{
    IncomeSweepInputs, after_tax_liquidation, income_sweep, surplus_if_liquidated,
};
use super::types::{SimulationConfig, SimulationResult, SplitKind, YearSnapshot};

const MONTHS_PER_YEAR: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoanSplit {
    pub kind: SplitKind,
    pub balance: f64,
    pub rate_pct: f64,
}

impl LoanSplit {
    fn new(kind: SplitKind, balance: f64, rate_pct: f64) -> Self {
        Self {
            kind,
            balance: balance.max(0.0),
            rate_pct,
        }
    }

    fn interest_for_month(self, offset: OffsetAccount) -> f64 {
        let interest_bearing = match self.kind {
            SplitKind::HomeNonDeductible => offset.effective_balance(self.balance),
            SplitKind::InvestmentDeductible => self.balance,
        };
        interest_bearing * monthly_rate(self.rate_pct)
    }

    /// Applies one month of interest and `payment`; only the part of the payment
    /// above interest reduces the balance.
    fn after_payment(self, payment: f64, offset: OffsetAccount) -> Self {
        let interest = self.interest_for_month(offset);
        let principal = (payment - interest).max(0.0);
        Self {
            balance: (self.balance - principal).max(0.0),
            ..self
        }
    }

    fn fair_share(self, periods_remaining: f64) -> f64 {
        level_payment_for_periods(self.balance, self.rate_pct, periods_remaining)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetAccount {
    pub balance: f64,
}

impl OffsetAccount {
    pub fn effective_balance(self, loan_balance: f64) -> f64 {
        (loan_balance - self.balance).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Portfolio {
    pub balance: f64,
    pub cost_base: f64,
}

/// Strategy A: keep paying the home loan, nothing else.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselineState {
    pub home: LoanSplit,
    pub offset: OffsetAccount,
}

/// Strategy B: home split plus a deductible investment split funding a portfolio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecyclingState {
    pub home: LoanSplit,
    pub invest: LoanSplit,
    pub offset: OffsetAccount,
    pub portfolio: Portfolio,
    /// Last year's after-tax income sweep, spread over this year's months.
    pub monthly_sweep: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearStart {
    pub home_loan_b: f64,
    pub invest_loan_b: f64,
    pub portfolio_b: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationState {
    /// Months simulated so far.
    pub month: u32,
    pub baseline: BaselineState,
    pub recycling: RecyclingState,
    pub year_start: YearStart,
}

/// Sanitised inputs plus the values frozen at the start of the run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationPlan {
    pub config: SimulationConfig,
    pub kickstart_applied: f64,
    pub required_minimum_a: f64,
    pub required_minimum_b: f64,
    pub effective_repayment_a: f64,
    pub effective_repayment_b: f64,
    term_months: f64,
}

impl SimulationPlan {
    pub fn new(config: &SimulationConfig) -> Self {
        let config = config.sanitized();
        let kickstart_applied = config
            .kickstart_from_offset
            .min(config.offset_balance_start)
            .min(config.home_loan_start);
        let term_months = config.remaining_term_years_start * f64::from(MONTHS_PER_YEAR);

        let required_minimum_a =
            level_payment_for_periods(config.home_loan_start, config.home_rate_pct, term_months);

        let home_b = config.home_loan_start - kickstart_applied;
        let invest_b = kickstart_applied;
        let combined = home_b + invest_b;
        let blended_rate = blended_rate_pct(
            home_b,
            config.home_rate_pct,
            invest_b,
            config.invest_loan_rate_pct,
        );
        let required_minimum_b = level_payment_for_periods(combined, blended_rate, term_months);

        Self {
            config,
            kickstart_applied,
            required_minimum_a,
            required_minimum_b,
            effective_repayment_a: config.base_monthly_repayment.max(required_minimum_a),
            effective_repayment_b: config.base_monthly_repayment.max(required_minimum_b),
            term_months,
        }
    }

    pub fn total_months(&self) -> u32 {
        self.config.projection_years * MONTHS_PER_YEAR
    }

    fn periods_remaining(&self, month: u32) -> f64 {
        (self.term_months - f64::from(month)).max(0.0)
    }

    fn house_value(&self, year: u32) -> f64 {
        let growth = 1.0 + self.config.home_value_growth_pct / 100.0;
        self.config.home_value_start * growth.powi(year as i32)
    }

    /// State at month 0, after the kickstart has moved cash from the offset
    /// through the home loan into the investment split and portfolio.
    pub fn initial_state(&self) -> SimulationState {
        let config = &self.config;
        let kick = self.kickstart_applied;

        let baseline = BaselineState {
            home: LoanSplit::new(
                SplitKind::HomeNonDeductible,
                config.home_loan_start,
                config.home_rate_pct,
            ),
            offset: OffsetAccount {
                balance: config.offset_balance_start,
            },
        };
        let recycling = RecyclingState {
            home: LoanSplit::new(
                SplitKind::HomeNonDeductible,
                config.home_loan_start - kick,
                config.home_rate_pct,
            ),
            invest: LoanSplit::new(
                SplitKind::InvestmentDeductible,
                kick,
                config.invest_loan_rate_pct,
            ),
            offset: OffsetAccount {
                balance: config.offset_balance_start - kick,
            },
            portfolio: Portfolio {
                balance: kick,
                cost_base: kick,
            },
            monthly_sweep: 0.0,
        };

        SimulationState {
            month: 0,
            baseline,
            year_start: YearStart {
                home_loan_b: recycling.home.balance,
                invest_loan_b: recycling.invest.balance,
                portfolio_b: recycling.portfolio.balance,
            },
            recycling,
        }
    }
}

fn blended_rate_pct(home_balance: f64, home_rate: f64, invest_balance: f64, invest_rate: f64) -> f64 {
    if invest_balance <= 0.0 {
        return home_rate;
    }
    if home_balance <= 0.0 {
        return invest_rate;
    }
    (home_balance * home_rate + invest_balance * invest_rate) / (home_balance + invest_balance)
}

/// Advances both strategies by one month.
pub fn step_month(state: &SimulationState, plan: &SimulationPlan) -> SimulationState {
    let baseline = BaselineState {
        home: state
            .baseline
            .home
            .after_payment(plan.effective_repayment_a, state.baseline.offset),
        ..state.baseline
    };

    let recycling = &state.recycling;
    let periods = plan.periods_remaining(state.month);
    // Investment split takes its fair share first; everything left, including any
    // surplus over both fair shares, goes to the home split.
    let invest_payment = plan
        .effective_repayment_b
        .min(recycling.invest.fair_share(periods));
    let home_payment =
        (plan.effective_repayment_b - invest_payment + recycling.monthly_sweep).max(0.0);
    let no_offset = OffsetAccount { balance: 0.0 };

    SimulationState {
        month: state.month + 1,
        baseline,
        recycling: RecyclingState {
            home: recycling.home.after_payment(home_payment, recycling.offset),
            invest: recycling.invest.after_payment(invest_payment, no_offset),
            ..*recycling
        },
        year_start: state.year_start,
    }
}

/// Closes the year ending at `state.month`: snapshots both strategies, then
/// redraws the year's home loan reduction into the investment split.
pub fn roll_year(state: &SimulationState, plan: &SimulationPlan) -> (SimulationState, YearSnapshot) {
    let config = &plan.config;
    let year = state.month / MONTHS_PER_YEAR;
    let baseline = &state.baseline;
    let recycling = &state.recycling;
    let opening = state.year_start;

    let sweep = income_sweep(&IncomeSweepInputs {
        portfolio_opening_balance: opening.portfolio_b,
        yield_pct: config.invest_yield_pct,
        franked_portion_pct: config.franked_portion_pct,
        marginal_tax_rate_pct: config.marginal_tax_rate_pct,
        avg_deductible_loan_balance: (opening.invest_loan_b + recycling.invest.balance) / 2.0,
        invest_loan_rate_pct: config.invest_loan_rate_pct,
    });
    let grown_portfolio = opening.portfolio_b * (1.0 + config.invest_growth_pct / 100.0);

    let house_value = plan.house_value(year);
    let home_a = baseline.home.balance;
    let home_b = recycling.home.balance;
    let invest_b = recycling.invest.balance;
    let total_debt_b = home_b + invest_b;
    let after_tax_value = after_tax_liquidation(
        grown_portfolio,
        recycling.portfolio.cost_base,
        config.marginal_tax_rate_pct,
    );
    let redraw = (opening.home_loan_b - home_b).max(0.0);

    let snapshot = YearSnapshot {
        year,
        house_value,
        home_loan_a: home_a,
        offset_balance_a: baseline.offset.balance,
        net_wealth_a: house_value + baseline.offset.balance - home_a,
        home_loan_b: home_b,
        invest_loan_b: invest_b,
        offset_balance_b: recycling.offset.balance,
        portfolio_b: grown_portfolio,
        cost_base: recycling.portfolio.cost_base,
        net_wealth_b: house_value + grown_portfolio + recycling.offset.balance - home_b - invest_b,
        after_tax_liquidation_value: after_tax_value,
        total_debt_b,
        surplus_if_liquidated: surplus_if_liquidated(
            grown_portfolio,
            recycling.portfolio.cost_base,
            config.marginal_tax_rate_pct,
            total_debt_b,
        ),
        monthly_repayment_a: plan.effective_repayment_a,
        monthly_repayment_b: plan.effective_repayment_b,
        monthly_sweep_applied: recycling.monthly_sweep,
        after_tax_income_sweep: sweep.after_tax_cash_to_home_loan,
        redraw_amount: redraw,
    };

    let invest = LoanSplit {
        balance: invest_b + redraw,
        ..recycling.invest
    };
    let portfolio = Portfolio {
        balance: grown_portfolio + redraw,
        cost_base: recycling.portfolio.cost_base + redraw,
    };
    let next = SimulationState {
        month: state.month,
        baseline: *baseline,
        recycling: RecyclingState {
            invest,
            portfolio,
            monthly_sweep: sweep.after_tax_cash_to_home_loan / f64::from(MONTHS_PER_YEAR),
            ..*recycling
        },
        year_start: YearStart {
            home_loan_b: home_b,
            invest_loan_b: invest.balance,
            portfolio_b: portfolio.balance,
        },
    };

    (next, snapshot)
}

pub fn simulate(config: &SimulationConfig) -> SimulationResult {
    let plan = SimulationPlan::new(config);
    let mut state = plan.initial_state();
    let mut years = Vec::with_capacity(plan.config.projection_years as usize);

    for _ in 0..plan.total_months() {
        state = step_month(&state, &plan);
        if state.month % MONTHS_PER_YEAR == 0 {
            let (next, snapshot) = roll_year(&state, &plan);
            years.push(snapshot);
            state = next;
        }
    }

    let debt_free_year = first_debt_free_year(&years);
    trace!(
        years = years.len(),
        ?debt_free_year,
        repayment_b = plan.effective_repayment_b,
        "debt recycling projection finished"
    );

    let net_wealth_advantage = years
        .last()
        .map(|last| last.net_wealth_b - last.net_wealth_a)
        .unwrap_or(0.0);

    SimulationResult {
        years,
        debt_free_year,
        required_minimum_a: plan.required_minimum_a,
        required_minimum_b: plan.required_minimum_b,
        effective_repayment_a: plan.effective_repayment_a,
        effective_repayment_b: plan.effective_repayment_b,
        kickstart_applied: plan.kickstart_applied,
        net_wealth_advantage,
    }
}

pub fn first_debt_free_year(years: &[YearSnapshot]) -> Option<u32> {
    years
        .iter()
        .find(|snapshot| snapshot.surplus_if_liquidated >= 0.0)
        .map(|snapshot| snapshot.year)
}

mod amortization;
mod engine;
mod export;
mod solver;
mod tax;
mod types;

pub use amortization::level_payment;
pub use engine::{
    BaselineState, LoanSplit, OffsetAccount, Portfolio, RecyclingState, SimulationPlan,
    SimulationState, YearStart, first_debt_free_year, roll_year, simulate, step_month,
};
pub use export::{CSV_HEADER, ExportError, write_csv};
pub use solver::{
    MAX_SOLVE_ITERATIONS, RepaymentGoal, RepaymentSolveIteration, RepaymentSolveResult, SolveError, solve_repayment,
};
pub use tax::{
    CGT_DISCOUNT, COMPANY_TAX_RATE, IncomeSweep, IncomeSweepInputs, after_tax_liquidation,
    income_sweep, surplus_if_liquidated,
};
pub use types::{
    MAX_PROJECTION_YEARS, SimulationConfig, SimulationResult, SplitKind, YearSnapshot,
};

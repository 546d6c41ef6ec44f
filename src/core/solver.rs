use serde::Serialize;

use super::{SimulationConfig, simulate};

/// Upper bound on bisection steps; each step is a full projection.
pub const MAX_SOLVE_ITERATIONS: u32 = 200;

/// Find the smallest monthly repayment that reaches a non-negative liquidation
/// surplus by `target_year`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepaymentGoal {
    pub target_year: u32,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepaymentSolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_repayment: f64,
    pub debt_free_year: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepaymentSolveResult {
    pub target_year: u32,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
    pub solved_repayment: Option<f64>,
    pub achieved_debt_free_year: Option<u32>,
    pub iterations: Vec<RepaymentSolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolveError {
    #[error("target year must be between 1 and the projection horizon ({horizon})")]
    TargetYearOutOfRange { horizon: u32 },
    #[error("search bounds must be finite and non-negative")]
    NonFiniteBounds,
    #[error("search max must be greater than search min")]
    EmptySearchRange,
    #[error("tolerance must be > 0")]
    InvalidTolerance,
    #[error("max iterations must be > 0")]
    NoIterations,
    #[error("max iterations must be at most {max}")]
    TooManyIterations { max: u32 },
}

pub fn solve_repayment(
    config: &SimulationConfig,
    goal: RepaymentGoal,
) -> Result<RepaymentSolveResult, SolveError> {
    let config = config.sanitized();
    validate_goal(&config, goal)?;

    let mut iterations =
        Vec::with_capacity(goal.max_iterations.min(MAX_SOLVE_ITERATIONS) as usize);
    let mut solved_repayment = None;
    let mut converged = false;
    let feasible;
    let message;

    if meets_target(evaluate_candidate(&config, goal.search_min), goal) {
        solved_repayment = Some(goal.search_min);
        converged = true;
        feasible = true;
        message = "Already debt free by the target year at the lower repayment bound.".to_string();
    } else if !meets_target(evaluate_candidate(&config, goal.search_max), goal) {
        feasible = false;
        message = "No repayment within the search bounds reaches the target year.".to_string();
    } else {
        let mut lo = goal.search_min;
        let mut hi = goal.search_max;
        let mut it = 0;
        while it < goal.max_iterations {
            let mid = (lo + hi) * 0.5;
            // Bounds are adjacent floats; no further progress is possible.
            if mid <= lo || mid >= hi {
                break;
            }
            it += 1;
            let debt_free_year = evaluate_candidate(&config, mid);
            iterations.push(RepaymentSolveIteration {
                iteration: it,
                lower_bound: lo,
                upper_bound: hi,
                candidate_repayment: mid,
                debt_free_year,
            });

            if meets_target(debt_free_year, goal) {
                hi = mid;
            } else {
                lo = mid;
            }

            if (hi - lo).abs() <= goal.tolerance {
                converged = true;
                break;
            }
        }
        solved_repayment = Some(hi);
        feasible = true;
        message = if converged {
            "Solved minimum repayment for the target year.".to_string()
        } else {
            "Stopped before tolerance was met; returning best estimate.".to_string()
        };
    }

    let achieved_debt_free_year =
        solved_repayment.and_then(|repayment| evaluate_candidate(&config, repayment));

    Ok(RepaymentSolveResult {
        target_year: goal.target_year,
        search_min: goal.search_min,
        search_max: goal.search_max,
        tolerance: goal.tolerance,
        max_iterations: goal.max_iterations,
        solved_repayment,
        achieved_debt_free_year,
        iterations,
        converged,
        feasible,
        message,
    })
}

fn evaluate_candidate(config: &SimulationConfig, repayment: f64) -> Option<u32> {
    let candidate = SimulationConfig {
        base_monthly_repayment: repayment,
        ..*config
    };
    simulate(&candidate).debt_free_year
}

fn meets_target(debt_free_year: Option<u32>, goal: RepaymentGoal) -> bool {
    debt_free_year.is_some_and(|year| year <= goal.target_year)
}

fn validate_goal(config: &SimulationConfig, goal: RepaymentGoal) -> Result<(), SolveError> {
    if goal.target_year == 0 || goal.target_year > config.projection_years {
        return Err(SolveError::TargetYearOutOfRange {
            horizon: config.projection_years,
        });
    }
    if !goal.search_min.is_finite() || !goal.search_max.is_finite() || goal.search_min < 0.0 {
        return Err(SolveError::NonFiniteBounds);
    }
    if goal.search_max <= goal.search_min {
        return Err(SolveError::EmptySearchRange);
    }
    if !goal.tolerance.is_finite() || goal.tolerance <= 0.0 {
        return Err(SolveError::InvalidTolerance);
    }
    if goal.max_iterations == 0 {
        return Err(SolveError::NoIterations);
    }
    if goal.max_iterations > MAX_SOLVE_ITERATIONS {
        return Err(SolveError::TooManyIterations {
            max: MAX_SOLVE_ITERATIONS,
        });
    }
    Ok(())
}

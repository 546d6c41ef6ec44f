use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

mod error;

pub use error::{AppError, AppResult, ConfigError};

use crate::core::{
    MAX_PROJECTION_YEARS, RepaymentGoal, RepaymentSolveResult, SimulationConfig,
    SimulationResult, simulate, solve_repayment, write_csv,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Csv,
    Json,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "debt-recycle",
    about = "Debt recycling projection: baseline home loan vs recycling into a geared portfolio"
)]
pub struct Cli {
    #[arg(long, default_value_t = 900_000.0, help = "Current home value")]
    home_value: f64,
    #[arg(
        long,
        default_value_t = 3.0,
        help = "Annual home value growth in percent"
    )]
    home_value_growth: f64,
    #[arg(long, default_value_t = 600_000.0, help = "Current home loan balance")]
    home_loan: f64,
    #[arg(long, default_value_t = 50_000.0, help = "Cash sitting in the offset account")]
    offset_balance: f64,
    #[arg(
        long,
        default_value_t = 30_000.0,
        help = "One-off amount moved from offset through the home loan into investments"
    )]
    kickstart_from_offset: f64,
    #[arg(long, default_value_t = 25.0, help = "Remaining home loan term in years")]
    remaining_term_years: f64,
    #[arg(long, default_value_t = 5.99, help = "Home loan rate in percent")]
    home_rate: f64,
    #[arg(long, default_value_t = 5.99, help = "Investment loan rate in percent")]
    invest_loan_rate: f64,
    #[arg(
        long,
        default_value_t = 4_000.0,
        help = "Fixed monthly household repayment; raised to the required minimum if lower"
    )]
    monthly_repayment: f64,
    #[arg(
        long,
        default_value_t = 5.0,
        help = "Annual investment capital growth in percent"
    )]
    invest_growth: f64,
    #[arg(long, default_value_t = 3.0, help = "Annual investment cash yield in percent")]
    invest_yield: f64,
    #[arg(
        long,
        default_value_t = 30.0,
        help = "Share of investment income that is franked, in percent"
    )]
    franked_portion: f64,
    #[arg(
        long,
        default_value_t = 39.0,
        help = "Marginal tax rate including levy, in percent"
    )]
    marginal_tax_rate: f64,
    #[arg(long, default_value_t = 20, help = "Years to project")]
    projection_years: u32,
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,
    #[arg(
        long,
        help = "Solve for the smallest monthly repayment that is debt free by this year"
    )]
    solve_target_year: Option<u32>,
    #[arg(long, default_value_t = 0.0)]
    solve_min: f64,
    #[arg(long, default_value_t = 50_000.0)]
    solve_max: f64,
    #[arg(long, default_value_t = 1.0)]
    solve_tolerance: f64,
    #[arg(long, default_value_t = 60, help = "Bisection step limit (at most 200)")]
    solve_max_iterations: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    home_value_start: Option<f64>,
    home_value_growth_pct: Option<f64>,
    home_loan_start: Option<f64>,
    offset_balance_start: Option<f64>,
    kickstart_from_offset: Option<f64>,
    remaining_term_years_start: Option<f64>,
    home_rate_pct: Option<f64>,
    invest_loan_rate_pct: Option<f64>,
    base_monthly_repayment: Option<f64>,
    invest_growth_pct: Option<f64>,
    invest_yield_pct: Option<f64>,
    franked_portion_pct: Option<f64>,
    marginal_tax_rate_pct: Option<f64>,
    projection_years: Option<u32>,

    target_year: Option<u32>,
    search_min: Option<f64>,
    search_max: Option<f64>,
    tolerance: Option<f64>,
    max_iterations: Option<u32>,
}

#[derive(Debug)]
struct ApiRequest {
    config: SimulationConfig,
    cli: Cli,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    projection_years: u32,
    #[serde(flatten)]
    result: SimulationResult,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SolveResponse {
    base_monthly_repayment: f64,
    #[serde(flatten)]
    result: RepaymentSolveResult,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

fn build_config(cli: &Cli) -> Result<SimulationConfig, ConfigError> {
    for (name, value) in [
        ("home-value", cli.home_value),
        ("home-value-growth", cli.home_value_growth),
        ("home-loan", cli.home_loan),
        ("offset-balance", cli.offset_balance),
        ("kickstart-from-offset", cli.kickstart_from_offset),
        ("remaining-term-years", cli.remaining_term_years),
        ("home-rate", cli.home_rate),
        ("invest-loan-rate", cli.invest_loan_rate),
        ("monthly-repayment", cli.monthly_repayment),
        ("invest-growth", cli.invest_growth),
        ("invest-yield", cli.invest_yield),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::NegativeOrNonFinite(name));
        }
    }
    for (name, value) in [
        ("franked-portion", cli.franked_portion),
        ("marginal-tax-rate", cli.marginal_tax_rate),
    ] {
        if !(0.0..=100.0).contains(&value) {
            return Err(ConfigError::PercentOutOfRange(name));
        }
    }
    if cli.remaining_term_years <= 0.0 {
        return Err(ConfigError::ZeroTerm);
    }
    if !(1..=MAX_PROJECTION_YEARS).contains(&cli.projection_years) {
        return Err(ConfigError::HorizonOutOfRange {
            max: MAX_PROJECTION_YEARS,
        });
    }

    Ok(SimulationConfig {
        home_value_start: cli.home_value,
        home_value_growth_pct: cli.home_value_growth,
        home_loan_start: cli.home_loan,
        offset_balance_start: cli.offset_balance,
        kickstart_from_offset: cli.kickstart_from_offset,
        remaining_term_years_start: cli.remaining_term_years,
        home_rate_pct: cli.home_rate,
        invest_loan_rate_pct: cli.invest_loan_rate,
        base_monthly_repayment: cli.monthly_repayment,
        invest_growth_pct: cli.invest_growth,
        invest_yield_pct: cli.invest_yield,
        franked_portion_pct: cli.franked_portion,
        marginal_tax_rate_pct: cli.marginal_tax_rate,
        projection_years: cli.projection_years,
    })
}

fn build_goal(cli: &Cli) -> Result<RepaymentGoal, ConfigError> {
    let target_year = cli.solve_target_year.ok_or(ConfigError::MissingTargetYear)?;
    Ok(RepaymentGoal {
        target_year,
        search_min: cli.solve_min,
        search_max: cli.solve_max,
        tolerance: cli.solve_tolerance,
        max_iterations: cli.solve_max_iterations,
    })
}

/// Runs the command-line projection and returns what should be printed.
pub fn run_cli<I, T>(args: I) -> AppResult<String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let config = build_config(&cli)?;

    if cli.solve_target_year.is_some() {
        let solved = solve_repayment(&config, build_goal(&cli)?)?;
        info!(
            target_year = solved.target_year,
            solved_repayment = ?solved.solved_repayment,
            feasible = solved.feasible,
            "repayment solve finished"
        );
        let response = SolveResponse {
            base_monthly_repayment: config.base_monthly_repayment,
            result: solved,
        };
        return Ok(format!("{}\n", serde_json::to_string_pretty(&response)?));
    }

    let result = simulate(&config);
    match cli.format {
        OutputFormat::Csv => render_csv(&result),
        OutputFormat::Json => Ok(format!(
            "{}\n",
            serde_json::to_string_pretty(&build_simulate_response(&config, result))?
        )),
    }
}

fn render_csv(result: &SimulationResult) -> AppResult<String> {
    let mut out = Vec::new();
    write_csv(&result.years, &mut out)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

pub fn app() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route(
            "/api/simulate.csv",
            get(simulate_csv_get_handler).post(simulate_csv_post_handler),
        )
        .route("/api/solve", get(solve_get_handler).post(solve_post_handler))
        .fallback(not_found_handler)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "debt recycling HTTP API listening");
    info!("Local access: http://127.0.0.1:{port}/api/simulate");

    axum::serve(listener, app()).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> AppError {
    AppError::NotFound
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> AppResult<Response> {
    simulate_handler_impl(payload)
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> AppResult<Response> {
    simulate_handler_impl(payload)
}

async fn simulate_csv_get_handler(Query(payload): Query<SimulatePayload>) -> AppResult<Response> {
    simulate_csv_handler_impl(payload)
}

async fn simulate_csv_post_handler(Json(payload): Json<SimulatePayload>) -> AppResult<Response> {
    simulate_csv_handler_impl(payload)
}

async fn solve_get_handler(Query(payload): Query<SimulatePayload>) -> AppResult<Response> {
    solve_handler_impl(payload)
}

async fn solve_post_handler(Json(payload): Json<SimulatePayload>) -> AppResult<Response> {
    solve_handler_impl(payload)
}

fn simulate_handler_impl(payload: SimulatePayload) -> AppResult<Response> {
    let request = api_request_from_payload(payload)?;
    let result = simulate(&request.config);
    debug!(
        projection_years = request.config.projection_years,
        debt_free_year = ?result.debt_free_year,
        "simulation served"
    );

    Ok(json_response(
        StatusCode::OK,
        build_simulate_response(&request.config, result),
    ))
}

fn simulate_csv_handler_impl(payload: SimulatePayload) -> AppResult<Response> {
    let request = api_request_from_payload(payload)?;
    let body = render_csv(&simulate(&request.config))?;

    Ok(with_cache_control((
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
        body,
    )))
}

fn solve_handler_impl(payload: SimulatePayload) -> AppResult<Response> {
    let request = api_request_from_payload(payload)?;
    let goal = build_goal(&request.cli)?;
    let result = solve_repayment(&request.config, goal)?;
    debug!(
        target_year = goal.target_year,
        iterations = result.iterations.len(),
        "repayment solve served"
    );

    Ok(json_response(
        StatusCode::OK,
        SolveResponse {
            base_monthly_repayment: request.config.base_monthly_repayment,
            result,
        },
    ))
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    (
        [(header::CACHE_CONTROL, "no-store")],
        response.into_response(),
    )
        .into_response()
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn build_simulate_response(config: &SimulationConfig, result: SimulationResult) -> SimulateResponse {
    SimulateResponse {
        projection_years: config.projection_years,
        result,
    }
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> AppResult<ApiRequest> {
    let payload = serde_json::from_str::<SimulatePayload>(json)?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: SimulatePayload) -> AppResult<ApiRequest> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.home_value_start {
        cli.home_value = v;
    }
    if let Some(v) = payload.home_value_growth_pct {
        cli.home_value_growth = v;
    }
    if let Some(v) = payload.home_loan_start {
        cli.home_loan = v;
    }
    if let Some(v) = payload.offset_balance_start {
        cli.offset_balance = v;
    }
    if let Some(v) = payload.kickstart_from_offset {
        cli.kickstart_from_offset = v;
    }
    if let Some(v) = payload.remaining_term_years_start {
        cli.remaining_term_years = v;
    }
    if let Some(v) = payload.home_rate_pct {
        cli.home_rate = v;
    }
    if let Some(v) = payload.invest_loan_rate_pct {
        cli.invest_loan_rate = v;
    }
    if let Some(v) = payload.base_monthly_repayment {
        cli.monthly_repayment = v;
    }
    if let Some(v) = payload.invest_growth_pct {
        cli.invest_growth = v;
    }
    if let Some(v) = payload.invest_yield_pct {
        cli.invest_yield = v;
    }
    if let Some(v) = payload.franked_portion_pct {
        cli.franked_portion = v;
    }
    if let Some(v) = payload.marginal_tax_rate_pct {
        cli.marginal_tax_rate = v;
    }
    if let Some(v) = payload.projection_years {
        cli.projection_years = v;
    }
    cli.solve_target_year = payload.target_year;
    if let Some(v) = payload.search_min {
        cli.solve_min = v;
    }
    if let Some(v) = payload.search_max {
        cli.solve_max = v;
    }
    if let Some(v) = payload.tolerance {
        cli.solve_tolerance = v;
    }
    if let Some(v) = payload.max_iterations {
        cli.solve_max_iterations = v;
    }

    let config = build_config(&cli)?;
    Ok(ApiRequest { config, cli })
}

fn default_cli_for_api() -> Cli {
    let defaults = SimulationConfig::default();
    Cli {
        home_value: defaults.home_value_start,
        home_value_growth: defaults.home_value_growth_pct,
        home_loan: defaults.home_loan_start,
        offset_balance: defaults.offset_balance_start,
        kickstart_from_offset: defaults.kickstart_from_offset,
        remaining_term_years: defaults.remaining_term_years_start,
        home_rate: defaults.home_rate_pct,
        invest_loan_rate: defaults.invest_loan_rate_pct,
        monthly_repayment: defaults.base_monthly_repayment,
        invest_growth: defaults.invest_growth_pct,
        invest_yield: defaults.invest_yield_pct,
        franked_portion: defaults.franked_portion_pct,
        marginal_tax_rate: defaults.marginal_tax_rate_pct,
        projection_years: defaults.projection_years,
        format: OutputFormat::Json,
        solve_target_year: None,
        solve_min: 0.0,
        solve_max: 50_000.0,
        solve_tolerance: 1.0,
        solve_max_iterations: 60,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SolveError;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_cli() -> Cli {
        default_cli_for_api()
    }

    #[test]
    fn clap_defaults_match_engine_defaults() {
        let cli = Cli::parse_from(["debt-recycle"]);
        let config = build_config(&cli).expect("defaults are valid");
        assert_eq!(config, SimulationConfig::default());
        assert_eq!(cli.format, OutputFormat::Csv);
        assert_eq!(cli.solve_max_iterations, sample_cli().solve_max_iterations);
    }

    #[test]
    fn build_config_rejects_out_of_range_percentages() {
        let mut cli = sample_cli();
        cli.marginal_tax_rate = 101.0;
        let err = build_config(&cli).expect_err("must reject tax rate above 100");
        assert!(err.to_string().contains("--marginal-tax-rate"));

        let mut cli = sample_cli();
        cli.franked_portion = -1.0;
        assert_eq!(
            build_config(&cli),
            Err(ConfigError::PercentOutOfRange("franked-portion"))
        );
    }

    #[test]
    fn build_config_rejects_negative_and_non_finite_amounts() {
        let mut cli = sample_cli();
        cli.home_loan = -5.0;
        assert_eq!(
            build_config(&cli),
            Err(ConfigError::NegativeOrNonFinite("home-loan"))
        );

        let mut cli = sample_cli();
        cli.invest_yield = f64::NAN;
        assert_eq!(
            build_config(&cli),
            Err(ConfigError::NegativeOrNonFinite("invest-yield"))
        );
    }

    #[test]
    fn build_config_rejects_zero_term_and_bad_horizon() {
        let mut cli = sample_cli();
        cli.remaining_term_years = 0.0;
        assert_eq!(build_config(&cli), Err(ConfigError::ZeroTerm));

        let mut cli = sample_cli();
        cli.projection_years = 0;
        assert!(matches!(
            build_config(&cli),
            Err(ConfigError::HorizonOutOfRange { .. })
        ));
        cli.projection_years = MAX_PROJECTION_YEARS + 1;
        assert!(matches!(
            build_config(&cli),
            Err(ConfigError::HorizonOutOfRange { .. })
        ));
    }

    #[test]
    fn api_request_from_json_parses_web_keys() {
        let json = r#"{
          "homeValueStart": 1000000,
          "homeValueGrowthPct": 4,
          "homeLoanStart": 700000,
          "offsetBalanceStart": 80000,
          "kickstartFromOffset": 50000,
          "remainingTermYearsStart": 28,
          "homeRatePct": 6.2,
          "investLoanRatePct": 6.5,
          "baseMonthlyRepayment": 5200,
          "investGrowthPct": 6,
          "investYieldPct": 4,
          "frankedPortionPct": 70,
          "marginalTaxRatePct": 47,
          "projectionYears": 30
        }"#;
        let config = api_request_from_json(json).expect("json should parse").config;

        assert_approx(config.home_value_start, 1_000_000.0);
        assert_approx(config.home_value_growth_pct, 4.0);
        assert_approx(config.home_loan_start, 700_000.0);
        assert_approx(config.offset_balance_start, 80_000.0);
        assert_approx(config.kickstart_from_offset, 50_000.0);
        assert_approx(config.remaining_term_years_start, 28.0);
        assert_approx(config.home_rate_pct, 6.2);
        assert_approx(config.invest_loan_rate_pct, 6.5);
        assert_approx(config.base_monthly_repayment, 5_200.0);
        assert_approx(config.invest_growth_pct, 6.0);
        assert_approx(config.invest_yield_pct, 4.0);
        assert_approx(config.franked_portion_pct, 70.0);
        assert_approx(config.marginal_tax_rate_pct, 47.0);
        assert_eq!(config.projection_years, 30);
    }

    #[test]
    fn api_request_from_empty_json_uses_defaults() {
        let request = api_request_from_json("{}").expect("json should parse");
        assert_eq!(request.config, SimulationConfig::default());
        assert_eq!(request.cli.solve_target_year, None);
    }

    #[test]
    fn api_request_rejects_invalid_fields() {
        let err = api_request_from_json(r#"{"projectionYears": 0}"#).expect_err("must reject");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = api_request_from_json(r#"{"homeLoanStart": "lots"}"#).expect_err("must reject");
        assert!(matches!(err, AppError::Json(_)));
    }

    #[test]
    fn simulate_response_serialization_contains_expected_fields() {
        let config = SimulationConfig {
            projection_years: 2,
            ..SimulationConfig::default()
        };
        let response = build_simulate_response(&config, simulate(&config));
        let json = serde_json::to_string(&response).expect("response should serialize");

        for key in [
            "\"projectionYears\"",
            "\"years\"",
            "\"debtFreeYear\"",
            "\"requiredMinimumB\"",
            "\"kickstartApplied\"",
            "\"netWealthAdvantage\"",
            "\"homeLoanA\"",
            "\"investLoanB\"",
            "\"portfolioB\"",
            "\"surplusIfLiquidated\"",
            "\"afterTaxIncomeSweep\"",
        ] {
            assert!(json.contains(key), "missing {key} in {json}");
        }
    }

    #[test]
    fn simulate_handler_returns_json_without_caching() {
        let response = simulate_handler_impl(SimulatePayload::default()).expect("valid payload");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CACHE_CONTROL)
                .and_then(|v| v.to_str().ok()),
            Some("no-store")
        );
    }

    #[test]
    fn csv_handler_sets_content_type() {
        let response =
            simulate_csv_handler_impl(SimulatePayload::default()).expect("valid payload");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            Some("text/csv; charset=utf-8")
        );
    }

    #[test]
    fn solve_handler_requires_target_year() {
        let err = solve_handler_impl(SimulatePayload::default()).expect_err("must reject");
        assert!(matches!(
            err,
            AppError::Config(ConfigError::MissingTargetYear)
        ));

        let payload = SimulatePayload {
            target_year: Some(15),
            ..SimulatePayload::default()
        };
        let response = solve_handler_impl(payload).expect("solvable goal");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn solve_handler_rejects_oversized_iteration_budget() {
        let payload = SimulatePayload {
            target_year: Some(15),
            max_iterations: Some(u32::MAX),
            ..SimulatePayload::default()
        };
        let err = solve_handler_impl(payload).expect_err("must reject");
        assert!(matches!(
            err,
            AppError::Solve(SolveError::TooManyIterations { .. })
        ));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn run_cli_prints_csv_by_default() {
        let output = run_cli(["debt-recycle", "--projection-years", "3"]).expect("cli run");
        let lines = output.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Year,HomeLoanA,NetWealthA"));
    }

    #[test]
    fn run_cli_json_matches_direct_simulation() {
        let output = run_cli(["debt-recycle", "--format", "json", "--kickstart-from-offset", "0"])
            .expect("cli run");
        let value: serde_json::Value = serde_json::from_str(&output).expect("valid json");

        let config = SimulationConfig {
            kickstart_from_offset: 0.0,
            ..SimulationConfig::default()
        };
        let expected = simulate(&config);
        assert_eq!(value["projectionYears"], 20);
        assert_eq!(value["years"].as_array().map(Vec::len), Some(20));
        assert_eq!(value["kickstartApplied"], 0.0);
        assert_eq!(
            value["debtFreeYear"].as_u64().map(|y| y as u32),
            expected.debt_free_year
        );
    }

    #[test]
    fn run_cli_solver_reports_json() {
        let output = run_cli(["debt-recycle", "--solve-target-year", "15"]).expect("cli run");
        let value: serde_json::Value = serde_json::from_str(&output).expect("valid json");
        assert_eq!(value["feasible"], true);
        assert_eq!(value["targetYear"], 15);
        assert!(value["solvedRepayment"].as_f64().is_some());
    }

    #[test]
    fn run_cli_propagates_validation_errors() {
        let err = run_cli(["debt-recycle", "--marginal-tax-rate", "120"]).expect_err("invalid");
        assert!(matches!(
            err,
            AppError::Config(ConfigError::PercentOutOfRange("marginal-tax-rate"))
        ));
    }
}

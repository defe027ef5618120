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
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    Breakdown, CompoundingOrder, ContributionMode, DisplayUnit, Ledger, SimError,
    SimulationOutcome, SimulationParameters, SummaryAggregates, SummaryRow, breakdown,
    format_amount, render_summary_table, simulate, summary_rows,
};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Simulation(#[from] SimError),
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliCompoundingOrder {
    ContributeThenCompound,
    CompoundThenContribute,
    WithdrawThenCompound,
}

impl From<CliCompoundingOrder> for CompoundingOrder {
    fn from(value: CliCompoundingOrder) -> Self {
        match value {
            CliCompoundingOrder::ContributeThenCompound => CompoundingOrder::ContributeThenCompound,
            CliCompoundingOrder::CompoundThenContribute => CompoundingOrder::CompoundThenContribute,
            CliCompoundingOrder::WithdrawThenCompound => CompoundingOrder::WithdrawThenCompound,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliContributionMode {
    Throughout,
    StopAtWithdrawalStart,
}

impl From<CliContributionMode> for ContributionMode {
    fn from(value: CliContributionMode) -> Self {
        match value {
            CliContributionMode::Throughout => ContributionMode::Throughout,
            CliContributionMode::StopAtWithdrawalStart => ContributionMode::StopAtWithdrawalStart,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiCompoundingOrder {
    #[serde(alias = "contributeThenCompound", alias = "contribute_then_compound")]
    ContributeThenCompound,
    #[serde(alias = "compoundThenContribute", alias = "compound_then_contribute")]
    CompoundThenContribute,
    #[serde(alias = "withdrawThenCompound", alias = "withdraw_then_compound")]
    WithdrawThenCompound,
}

impl From<ApiCompoundingOrder> for CliCompoundingOrder {
    fn from(value: ApiCompoundingOrder) -> Self {
        match value {
            ApiCompoundingOrder::ContributeThenCompound => {
                CliCompoundingOrder::ContributeThenCompound
            }
            ApiCompoundingOrder::CompoundThenContribute => {
                CliCompoundingOrder::CompoundThenContribute
            }
            ApiCompoundingOrder::WithdrawThenCompound => CliCompoundingOrder::WithdrawThenCompound,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiContributionMode {
    #[serde(alias = "continue")]
    Throughout,
    #[serde(
        alias = "stopAtWithdrawalStart",
        alias = "stop_at_withdrawal_start",
        alias = "stop"
    )]
    StopAtWithdrawalStart,
}

impl From<ApiContributionMode> for CliContributionMode {
    fn from(value: ApiContributionMode) -> Self {
        match value {
            ApiContributionMode::Throughout => CliContributionMode::Throughout,
            ApiContributionMode::StopAtWithdrawalStart => {
                CliContributionMode::StopAtWithdrawalStart
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    monthly_contribution: Option<f64>,
    sip_rate: Option<f64>,
    contribution_months: Option<u32>,
    initial_balance: Option<f64>,
    contribution_mode: Option<ApiContributionMode>,

    monthly_withdrawal: Option<f64>,
    swp_rate: Option<f64>,
    swp_start_month: Option<u32>,
    swp_months: Option<u32>,

    inflation_rate: Option<f64>,
    adjust_for_inflation: Option<bool>,
    compounding_order: Option<ApiCompoundingOrder>,

    unit: Option<String>,
    include_ledger: Option<bool>,
}

#[derive(Parser, Debug)]
#[command(
    name = "sipswp",
    about = "Month-by-month SIP + SWP portfolio simulator",
    after_help = "Run `sipswp serve [port]` to start the HTTP API instead."
)]
struct Cli {
    #[arg(long, default_value_t = 5000.0, help = "Monthly SIP contribution")]
    monthly_contribution: f64,
    #[arg(
        long,
        default_value_t = 8.0,
        help = "Expected annual return during contribution months, in percent"
    )]
    sip_rate: f64,
    #[arg(
        long,
        default_value_t = 240,
        help = "Contribution horizon in months; also the number of months simulated"
    )]
    contribution_months: u32,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Lump sum deposited in month 1 on top of the regular contribution"
    )]
    initial_balance: f64,
    #[arg(long, value_enum, default_value_t = CliContributionMode::Throughout)]
    contribution_mode: CliContributionMode,
    #[arg(long, default_value_t = 5000.0, help = "Monthly SWP withdrawal")]
    monthly_withdrawal: f64,
    #[arg(
        long,
        default_value_t = 7.0,
        help = "Expected annual return during withdrawal months, in percent"
    )]
    swp_rate: f64,
    #[arg(
        long,
        default_value_t = 60,
        help = "Months elapsed before the first withdrawal (0 withdraws in month 1)"
    )]
    swp_start_month: u32,
    #[arg(long, default_value_t = 120, help = "Length of the withdrawal window")]
    swp_months: u32,
    #[arg(
        long,
        default_value_t = 6.0,
        help = "Expected annual inflation in percent"
    )]
    inflation_rate: f64,
    #[arg(long, help = "Report the final balance in today's money")]
    adjust_for_inflation: bool,
    #[arg(long, value_enum, default_value_t = CliCompoundingOrder::ContributeThenCompound)]
    compounding_order: CliCompoundingOrder,
    #[arg(
        long,
        default_value = "rupees",
        help = "Divisor applied to displayed amounts: rupees, lakhs, crores, millions or billions"
    )]
    unit: DisplayUnit,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
    #[arg(long, help = "Print every month of the ledger after the summary")]
    show_ledger: bool,
}

#[derive(Debug)]
struct ApiRequest {
    params: SimulationParameters,
    unit: DisplayUnit,
    include_ledger: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    parameters: SimulationParameters,
    final_balance: f64,
    inflation_adjusted: bool,
    exhausted_at_month: Option<u32>,
    unit: DisplayUnit,
    summary: SummaryAggregates,
    summary_table: Vec<SummaryRow>,
    breakdown: Breakdown,
    #[serde(skip_serializing_if = "Option::is_none")]
    ledger: Option<Ledger>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_params(cli: &Cli) -> Result<SimulationParameters, SimError> {
    let params = SimulationParameters {
        monthly_contribution: cli.monthly_contribution,
        sip_rate_pct: cli.sip_rate,
        swp_rate_pct: cli.swp_rate,
        monthly_withdrawal: cli.monthly_withdrawal,
        contribution_months: cli.contribution_months,
        swp_start_month: cli.swp_start_month,
        swp_months: cli.swp_months,
        inflation_rate_pct: cli.inflation_rate,
        adjust_for_inflation: cli.adjust_for_inflation,
        initial_balance: cli.initial_balance,
        contribution_mode: cli.contribution_mode.into(),
        compounding_order: cli.compounding_order.into(),
    };
    params.validate()?;
    Ok(params)
}

/// Parse process arguments, run one simulation and render it for stdout.
pub fn run_cli() -> Result<String, ApiError> {
    render_cli(Cli::parse())
}

fn render_cli(cli: Cli) -> Result<String, ApiError> {
    let params = build_params(&cli)?;
    let unit = cli.unit;
    let outcome = simulate(&params)?;

    match cli.format {
        OutputFormat::Json => {
            let response = build_simulate_response(params, unit, outcome, true);
            Ok(format!("{}\n", serde_json::to_string_pretty(&response)?))
        }
        OutputFormat::Table => {
            let mut out = render_summary_table(&outcome.summary, unit);
            if outcome.inflation_adjusted {
                out.push_str(&format!(
                    "Final balance in today's money: {}\n",
                    format_amount(outcome.final_balance, unit)
                ));
            }
            if cli.show_ledger {
                out.push_str(&render_ledger(&outcome.ledger, unit));
            }
            Ok(out)
        }
    }
}

fn render_ledger(ledger: &Ledger, unit: DisplayUnit) -> String {
    let mut out = format!(
        "\n{:>5}  {:>16}  {:>16}  {:>16}  {:>16}  {:>18}\n",
        "Month", "Contribution", "Withdrawal", "Interest", "Credited", "Balance"
    );
    for record in ledger {
        out.push_str(&format!(
            "{:>5}  {:>16}  {:>16}  {:>16}  {:>16}  {:>18}\n",
            record.month,
            format_amount(record.contribution, unit),
            format_amount(record.withdrawal, unit),
            format_amount(record.interest, unit),
            format_amount(record.interest_credited, unit),
            format_amount(record.balance, unit),
        ));
    }
    out
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "SIP + SWP HTTP API listening");
    info!("local access: http://127.0.0.1:{port}/api/simulate");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload)
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload)
}

fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "rejected simulate request");
            return error_response(StatusCode::BAD_REQUEST, &err.to_string());
        }
    };

    let outcome = match simulate(&request.params) {
        Ok(outcome) => outcome,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    };

    let response = build_simulate_response(
        request.params,
        request.unit,
        outcome,
        request.include_ledger,
    );
    json_response(StatusCode::OK, response)
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload).map_err(|e| e.to_string())
}

fn api_request_from_payload(payload: SimulatePayload) -> Result<ApiRequest, SimError> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.monthly_contribution {
        cli.monthly_contribution = v;
    }
    if let Some(v) = payload.sip_rate {
        cli.sip_rate = v;
    }
    if let Some(v) = payload.contribution_months {
        cli.contribution_months = v;
    }
    if let Some(v) = payload.initial_balance {
        cli.initial_balance = v;
    }
    if let Some(v) = payload.contribution_mode {
        cli.contribution_mode = v.into();
    }

    if let Some(v) = payload.monthly_withdrawal {
        cli.monthly_withdrawal = v;
    }
    if let Some(v) = payload.swp_rate {
        cli.swp_rate = v;
    }
    if let Some(v) = payload.swp_start_month {
        cli.swp_start_month = v;
    }
    if let Some(v) = payload.swp_months {
        cli.swp_months = v;
    }

    if let Some(v) = payload.inflation_rate {
        cli.inflation_rate = v;
    }
    if let Some(v) = payload.adjust_for_inflation {
        cli.adjust_for_inflation = v;
    }
    if let Some(v) = payload.compounding_order {
        cli.compounding_order = v.into();
    }
    if let Some(v) = payload.unit {
        cli.unit = v
            .parse::<DisplayUnit>()
            .map_err(|reason| SimError::invalid("unit", reason))?;
    }

    let params = build_params(&cli)?;
    Ok(ApiRequest {
        params,
        unit: cli.unit,
        include_ledger: payload.include_ledger.unwrap_or(true),
    })
}

fn default_cli_for_api() -> Cli {
    Cli {
        monthly_contribution: 5_000.0,
        sip_rate: 8.0,
        contribution_months: 240,
        initial_balance: 0.0,
        contribution_mode: CliContributionMode::Throughout,
        monthly_withdrawal: 5_000.0,
        swp_rate: 7.0,
        swp_start_month: 60,
        swp_months: 120,
        inflation_rate: 6.0,
        adjust_for_inflation: false,
        compounding_order: CliCompoundingOrder::ContributeThenCompound,
        unit: DisplayUnit::Rupees,
        format: OutputFormat::Json,
        show_ledger: false,
    }
}

fn build_simulate_response(
    params: SimulationParameters,
    unit: DisplayUnit,
    outcome: SimulationOutcome,
    include_ledger: bool,
) -> SimulateResponse {
    SimulateResponse {
        parameters: params,
        final_balance: outcome.final_balance,
        inflation_adjusted: outcome.inflation_adjusted,
        exhausted_at_month: outcome.summary.exhausted_at_month,
        unit,
        summary: outcome.summary,
        summary_table: summary_rows(&outcome.summary, unit),
        breakdown: breakdown(&outcome.summary),
        ledger: include_ledger.then_some(outcome.ledger),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

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
    fn build_params_copies_percent_rates_unchanged() {
        let params = build_params(&sample_cli()).expect("valid params");
        assert_approx(params.sip_rate_pct, 8.0);
        assert_approx(params.swp_rate_pct, 7.0);
        assert_eq!(params.contribution_months, 240);
        assert_eq!(params.swp_start_month, 60);
        assert_eq!(params.compounding_order, CompoundingOrder::ContributeThenCompound);
    }

    #[test]
    fn build_params_rejects_negative_withdrawal() {
        let mut cli = sample_cli();
        cli.monthly_withdrawal = -1.0;
        let err = build_params(&cli).expect_err("must reject negative withdrawal");
        assert!(err.to_string().contains("monthly_withdrawal"));
    }

    #[test]
    fn build_params_rejects_rate_above_hundred() {
        let mut cli = sample_cli();
        cli.swp_rate = 101.0;
        let err = build_params(&cli).expect_err("must reject out-of-range rate");
        assert!(err.to_string().contains("swp_rate_pct"));
    }

    #[test]
    fn build_params_rejects_inflation_above_twenty() {
        let mut cli = sample_cli();
        cli.inflation_rate = 25.0;
        let err = build_params(&cli).expect_err("must reject inflation above 20%");
        assert!(err.to_string().contains("inflation_rate_pct"));
    }

    #[test]
    fn cli_parses_flags_and_defaults() {
        let cli = Cli::try_parse_from([
            "sipswp",
            "--monthly-contribution",
            "10000",
            "--swp-start-month",
            "0",
            "--compounding-order",
            "withdraw-then-compound",
            "--contribution-mode",
            "stop-at-withdrawal-start",
            "--unit",
            "lakhs",
            "--adjust-for-inflation",
        ])
        .expect("flags should parse");

        assert_approx(cli.monthly_contribution, 10_000.0);
        assert_approx(cli.sip_rate, 8.0);
        assert_eq!(cli.swp_start_month, 0);
        assert_eq!(cli.compounding_order, CliCompoundingOrder::WithdrawThenCompound);
        assert_eq!(
            cli.contribution_mode,
            CliContributionMode::StopAtWithdrawalStart
        );
        assert_eq!(cli.unit, DisplayUnit::Lakhs);
        assert_eq!(cli.format, OutputFormat::Table);
        assert!(cli.adjust_for_inflation);
    }

    #[test]
    fn api_request_from_json_parses_web_keys() {
        let json = r#"{
          "monthlyContribution": 2500,
          "sipRate": 12,
          "contributionMonths": 180,
          "initialBalance": 100000,
          "contributionMode": "stop",
          "monthlyWithdrawal": 8000,
          "swpRate": 6.5,
          "swpStartMonth": 120,
          "swpMonths": 60,
          "inflationRate": 5,
          "adjustForInflation": true,
          "compoundingOrder": "compoundThenContribute",
          "unit": "crore",
          "includeLedger": false
        }"#;
        let request = api_request_from_json(json).expect("json should parse");
        let params = request.params;

        assert_approx(params.monthly_contribution, 2_500.0);
        assert_approx(params.sip_rate_pct, 12.0);
        assert_eq!(params.contribution_months, 180);
        assert_approx(params.initial_balance, 100_000.0);
        assert_eq!(
            params.contribution_mode,
            ContributionMode::StopAtWithdrawalStart
        );
        assert_approx(params.monthly_withdrawal, 8_000.0);
        assert_approx(params.swp_rate_pct, 6.5);
        assert_eq!(params.swp_start_month, 120);
        assert_eq!(params.swp_months, 60);
        assert_approx(params.inflation_rate_pct, 5.0);
        assert!(params.adjust_for_inflation);
        assert_eq!(
            params.compounding_order,
            CompoundingOrder::CompoundThenContribute
        );
        assert_eq!(request.unit, DisplayUnit::Crores);
        assert!(!request.include_ledger);
    }

    #[test]
    fn api_request_from_empty_json_uses_defaults() {
        let request = api_request_from_json("{}").expect("json should parse");
        let expected = build_params(&default_cli_for_api()).expect("valid params");
        assert_eq!(request.params, expected);
        assert_eq!(request.unit, DisplayUnit::Rupees);
        assert!(request.include_ledger);
    }

    #[test]
    fn api_request_from_json_rejects_zero_horizon() {
        let err = api_request_from_json(r#"{"contributionMonths": 0}"#)
            .expect_err("must reject zero horizon");
        assert!(err.contains("contribution_months"));
    }

    #[test]
    fn api_request_from_json_rejects_unknown_unit() {
        let err = api_request_from_json(r#"{"unit": "furlongs"}"#)
            .expect_err("must reject unknown unit");
        assert!(err.contains("`unit`"), "{err}");
        assert!(err.contains("furlongs"), "{err}");
    }

    #[test]
    fn cli_and_api_accept_the_same_unit_names() {
        for (name, expected) in [
            ("none", DisplayUnit::Rupees),
            ("inr", DisplayUnit::Rupees),
            ("lakh", DisplayUnit::Lakhs),
            ("Crores", DisplayUnit::Crores),
            ("million", DisplayUnit::Millions),
            ("billions", DisplayUnit::Billions),
        ] {
            let cli = Cli::try_parse_from(["sipswp", "--unit", name]).expect("unit should parse");
            assert_eq!(cli.unit, expected, "cli unit {name}");

            let json = format!(r#"{{"unit": "{name}"}}"#);
            let request = api_request_from_json(&json).expect("json should parse");
            assert_eq!(request.unit, expected, "api unit {name}");
        }
        assert!(Cli::try_parse_from(["sipswp", "--unit", "furlongs"]).is_err());
    }

    #[test]
    fn simulate_response_serialization_contains_expected_fields() {
        let params = build_params(&sample_cli()).expect("valid params");
        let outcome = simulate(&params).expect("simulation runs");
        let response = build_simulate_response(params, DisplayUnit::Lakhs, outcome, true);
        let json = serde_json::to_string(&response).expect("response should serialize");

        assert!(json.contains("\"parameters\""));
        assert!(json.contains("\"finalBalance\""));
        assert!(json.contains("\"exhaustedAtMonth\":null"));
        assert!(json.contains("\"summaryTable\""));
        assert!(json.contains("\"totalInterest\""));
        assert!(json.contains("\"totalInterestCredited\""));
        assert!(json.contains("\"interestCredited\""));
        assert!(json.contains("\"breakdown\""));
        assert!(json.contains("\"openingBalance\""));
        assert!(json.contains("\"unit\":\"lakhs\""));
        assert!(json.contains("\"compoundingOrder\":\"contribute-then-compound\""));
    }

    #[test]
    fn simulate_response_omits_ledger_when_not_requested() {
        let params = build_params(&sample_cli()).expect("valid params");
        let outcome = simulate(&params).expect("simulation runs");
        let response = build_simulate_response(params, DisplayUnit::Rupees, outcome, false);
        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(!json.contains("\"ledger\""));
    }

    #[test]
    fn render_cli_table_reports_exhaustion_month() {
        let mut cli = sample_cli();
        cli.format = OutputFormat::Table;
        cli.monthly_contribution = 0.0;
        cli.initial_balance = 1_000_000.0;
        cli.monthly_withdrawal = 10_000.0;
        cli.swp_rate = 7.0;
        cli.swp_start_month = 0;
        cli.swp_months = 1_200;
        cli.contribution_months = 1_200;

        let out = render_cli(cli).expect("renders");
        assert!(out.contains("Funds exhausted at month 151"), "{out}");
        assert!(out.contains("Total Withdrawn"));
    }

    #[test]
    fn render_cli_json_round_trips_through_serde_value() {
        let mut cli = sample_cli();
        cli.format = OutputFormat::Json;
        cli.contribution_months = 12;
        cli.swp_months = 0;

        let out = render_cli(cli).expect("renders");
        let value: serde_json::Value = serde_json::from_str(&out).expect("valid json");
        assert_eq!(value["ledger"].as_array().map(Vec::len), Some(12));
        assert_eq!(value["summary"]["monthsSimulated"], 12);
    }

    #[test]
    fn render_cli_table_includes_ledger_and_real_balance() {
        let mut cli = sample_cli();
        cli.format = OutputFormat::Table;
        cli.contribution_months = 3;
        cli.sip_rate = 0.0;
        cli.monthly_contribution = 1_000.0;
        cli.swp_months = 0;
        cli.adjust_for_inflation = true;
        cli.show_ledger = true;

        let out = render_cli(cli).expect("renders");
        assert!(out.contains("Final balance in today's money"));
        assert!(out.contains("3,000.00"));
        assert!(out.contains("Month"));
        assert!(out.contains("Credited"));
    }

    #[test]
    fn render_cli_reports_invalid_parameters_as_simulation_errors() {
        let mut cli = sample_cli();
        cli.contribution_months = 0;
        let err = render_cli(cli).expect_err("must reject zero horizon");
        assert!(matches!(err, ApiError::Simulation(_)));
        assert!(err.to_string().contains("contribution_months"), "{err}");
    }
}

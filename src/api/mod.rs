use axum::{
    Router,
    extract::{
        Json, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    ConfigError, DeclarantInputs, SimulationResult, Situation, TaxInputs, TaxYearConfig,
    compute_tax,
};

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },
    #[error("{field} must be >= 0, got {value}")]
    Negative { field: &'static str, value: f64 },
    #[error("invalid request payload: {0}")]
    Payload(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Usage(#[from] clap::Error),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to serialize result: {0}")]
    Output(#[from] serde_json::Error),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliSituation {
    #[value(alias = "celibataire")]
    Single,
    #[value(alias = "couple")]
    Married,
    #[value(alias = "veuf")]
    Widowed,
}

impl From<CliSituation> for Situation {
    fn from(value: CliSituation) -> Self {
        match value {
            CliSituation::Single => Situation::Single,
            CliSituation::Married => Situation::Married,
            CliSituation::Widowed => Situation::Widowed,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiSituation {
    #[serde(alias = "Single", alias = "celibataire", alias = "Célibataire")]
    Single,
    #[serde(alias = "Married", alias = "couple", alias = "Couple")]
    Married,
    #[serde(alias = "Widowed", alias = "veuf", alias = "Veuf")]
    Widowed,
}

impl From<ApiSituation> for CliSituation {
    fn from(value: ApiSituation) -> Self {
        match value {
            ApiSituation::Single => CliSituation::Single,
            ApiSituation::Married => CliSituation::Married,
            ApiSituation::Widowed => CliSituation::Widowed,
        }
    }
}

/// Form fields as posted by the simulator front end. The aliases accept the
/// short field names the form has historically used.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    situation: Option<ApiSituation>,
    #[serde(alias = "children")]
    dependents: Option<u32>,

    salary1: Option<f64>,
    #[serde(alias = "realExpenses1")]
    professional_expenses1: Option<f64>,
    #[serde(alias = "treatAsRNI1")]
    treat_as_taxable1: Option<bool>,
    #[serde(alias = "per1")]
    retirement_contribution1: Option<f64>,
    #[serde(alias = "perCeiling1")]
    retirement_ceiling1: Option<f64>,

    salary2: Option<f64>,
    #[serde(alias = "realExpenses2")]
    professional_expenses2: Option<f64>,
    #[serde(alias = "treatAsRNI2")]
    treat_as_taxable2: Option<bool>,
    #[serde(alias = "per2")]
    retirement_contribution2: Option<f64>,
    #[serde(alias = "perCeiling2")]
    retirement_ceiling2: Option<f64>,

    common_charges: Option<f64>,
    #[serde(alias = "reduction")]
    tax_credits: Option<f64>,
}

#[derive(Parser, Debug)]
#[command(
    name = "impot",
    about = "Household income tax simulator (family quotient, decote, surtax, withholding split)"
)]
struct Cli {
    #[arg(long, value_enum, default_value_t = CliSituation::Single)]
    situation: CliSituation,
    #[arg(long, default_value_t = 0, help = "Number of dependent children")]
    dependents: u32,
    #[arg(long, default_value_t = 0.0, help = "Declarant 1 gross salary")]
    salary1: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Declarant 1 actual professional expenses; 0 uses the standard deduction"
    )]
    professional_expenses1: f64,
    #[arg(long, help = "Declarant 1 salary is already net taxable income")]
    treat_as_taxable1: bool,
    #[arg(long, default_value_t = 0.0)]
    retirement_contribution1: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Deductible ceiling for declarant 1 retirement contributions"
    )]
    retirement_ceiling1: f64,
    #[arg(long, default_value_t = 0.0, help = "Declarant 2 gross salary (married only)")]
    salary2: f64,
    #[arg(long, default_value_t = 0.0)]
    professional_expenses2: f64,
    #[arg(long)]
    treat_as_taxable2: bool,
    #[arg(long, default_value_t = 0.0)]
    retirement_contribution2: f64,
    #[arg(long, default_value_t = 0.0)]
    retirement_ceiling2: f64,
    #[arg(long, default_value_t = 0.0, help = "Household deductible charges")]
    common_charges: f64,
    #[arg(long, default_value_t = 0.0, help = "Declared tax reductions and credits")]
    tax_credits: f64,
    #[arg(long, help = "Tax-year table as JSON; defaults to the built-in current year")]
    config: Option<PathBuf>,
    #[arg(long, help = "Indent the JSON output")]
    pretty: bool,
}

#[derive(Clone)]
struct AppState {
    config: Arc<TaxYearConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse<'a> {
    income_year: u16,
    assessment_year: u16,
    #[serde(flatten)]
    result: &'a SimulationResult,
}

impl<'a> SimulateResponse<'a> {
    fn new(config: &TaxYearConfig, result: &'a SimulationResult) -> Self {
        Self {
            income_year: config.income_year,
            assessment_year: config.assessment_year,
            result,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

fn non_negative(field: &'static str, value: f64) -> Result<f64, InputError> {
    if !value.is_finite() {
        return Err(InputError::NotFinite { field });
    }
    if value < 0.0 {
        return Err(InputError::Negative { field, value });
    }
    Ok(value)
}

fn build_inputs(cli: Cli) -> Result<TaxInputs, InputError> {
    let declarant1 = DeclarantInputs {
        gross_salary: non_negative("salary1", cli.salary1)?,
        professional_expenses: non_negative(
            "professionalExpenses1",
            cli.professional_expenses1,
        )?,
        treat_gross_as_taxable: cli.treat_as_taxable1,
        retirement_contribution: non_negative(
            "retirementContribution1",
            cli.retirement_contribution1,
        )?,
        retirement_ceiling: non_negative("retirementCeiling1", cli.retirement_ceiling1)?,
    };
    let declarant2 = DeclarantInputs {
        gross_salary: non_negative("salary2", cli.salary2)?,
        professional_expenses: non_negative(
            "professionalExpenses2",
            cli.professional_expenses2,
        )?,
        treat_gross_as_taxable: cli.treat_as_taxable2,
        retirement_contribution: non_negative(
            "retirementContribution2",
            cli.retirement_contribution2,
        )?,
        retirement_ceiling: non_negative("retirementCeiling2", cli.retirement_ceiling2)?,
    };

    Ok(TaxInputs {
        situation: cli.situation.into(),
        dependents: cli.dependents,
        declarant1,
        declarant2,
        common_charges: non_negative("commonCharges", cli.common_charges)?,
        tax_credits: non_negative("taxCredits", cli.tax_credits)?,
    })
}

/// Parses simulation flags from `args` and returns the result as JSON.
pub fn run_cli<I, T>(args: I) -> Result<String, CliError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::try_parse_from(args)?;
    let config = TaxYearConfig::load(cli.config.as_deref())?;
    let pretty = cli.pretty;
    let inputs = build_inputs(cli)?;
    let result = compute_tax(&inputs, &config);
    let response = SimulateResponse::new(&config, &result);

    let json = if pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    Ok(json)
}

pub async fn run_http_server(port: u16, config: TaxYearConfig) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(
        income_year = config.income_year,
        assessment_year = config.assessment_year,
        "loaded tax-year table"
    );
    let app = router(AppState {
        config: Arc::new(config),
    });

    let listener = TcpListener::bind(addr).await?;
    info!("tax simulator API listening on http://{addr}");
    info!("local access: http://127.0.0.1:{port}/api/simulate");

    axum::serve(listener, app).await
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/config", get(config_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .fallback(not_found_handler)
        .with_state(state)
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn config_handler(State(state): State<AppState>) -> Response {
    json_response(StatusCode::OK, state.config.as_ref())
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(
    State(state): State<AppState>,
    payload: Result<Query<SimulatePayload>, QueryRejection>,
) -> Response {
    match payload {
        Ok(Query(payload)) => simulate_handler_impl(&state, payload).await,
        Err(rejection) => reject_request(InputError::Payload(rejection.body_text())),
    }
}

async fn simulate_post_handler(
    State(state): State<AppState>,
    payload: Result<Json<SimulatePayload>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(payload)) => simulate_handler_impl(&state, payload).await,
        Err(rejection) => reject_request(InputError::Payload(rejection.body_text())),
    }
}

async fn simulate_handler_impl(state: &AppState, payload: SimulatePayload) -> Response {
    let inputs = match api_request_from_payload(payload) {
        Ok(inputs) => inputs,
        Err(err) => return reject_request(err),
    };

    let result = compute_tax(&inputs, &state.config);
    json_response(StatusCode::OK, SimulateResponse::new(&state.config, &result))
}

fn reject_request(err: InputError) -> Response {
    warn!(error = %err, "rejected simulation request");
    error_response(StatusCode::BAD_REQUEST, &err.to_string())
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
fn api_request_from_json(json: &str) -> Result<TaxInputs, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload).map_err(|e| e.to_string())
}

fn api_request_from_payload(payload: SimulatePayload) -> Result<TaxInputs, InputError> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.situation {
        cli.situation = v.into();
    }
    if let Some(v) = payload.dependents {
        cli.dependents = v;
    }

    if let Some(v) = payload.salary1 {
        cli.salary1 = v;
    }
    if let Some(v) = payload.professional_expenses1 {
        cli.professional_expenses1 = v;
    }
    if let Some(v) = payload.treat_as_taxable1 {
        cli.treat_as_taxable1 = v;
    }
    if let Some(v) = payload.retirement_contribution1 {
        cli.retirement_contribution1 = v;
    }
    if let Some(v) = payload.retirement_ceiling1 {
        cli.retirement_ceiling1 = v;
    }

    if let Some(v) = payload.salary2 {
        cli.salary2 = v;
    }
    if let Some(v) = payload.professional_expenses2 {
        cli.professional_expenses2 = v;
    }
    if let Some(v) = payload.treat_as_taxable2 {
        cli.treat_as_taxable2 = v;
    }
    if let Some(v) = payload.retirement_contribution2 {
        cli.retirement_contribution2 = v;
    }
    if let Some(v) = payload.retirement_ceiling2 {
        cli.retirement_ceiling2 = v;
    }

    if let Some(v) = payload.common_charges {
        cli.common_charges = v;
    }
    if let Some(v) = payload.tax_credits {
        cli.tax_credits = v;
    }

    build_inputs(cli)
}

/// Missing form fields count as zero.
fn default_cli_for_api() -> Cli {
    Cli {
        situation: CliSituation::Single,
        dependents: 0,
        salary1: 0.0,
        professional_expenses1: 0.0,
        treat_as_taxable1: false,
        retirement_contribution1: 0.0,
        retirement_ceiling1: 0.0,
        salary2: 0.0,
        professional_expenses2: 0.0,
        treat_as_taxable2: false,
        retirement_contribution2: 0.0,
        retirement_ceiling2: 0.0,
        common_charges: 0.0,
        tax_credits: 0.0,
        config: None,
        pretty: false,
    }
}

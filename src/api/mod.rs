use std::net::SocketAddr;
use std::num::NonZeroUsize;

use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::core::{
    DEFAULT_CURVE_POINTS, DEFAULT_HISTOGRAM_BINS, DEFAULT_INITIAL_VALUE, DEFAULT_NUM_SIMULATIONS,
    DEFAULT_TIME_HORIZON, Execution, Histogram, Industry, IndustryFit, IndustryPreset,
    ReferenceCurve, SimulationParameters, ValuationMetrics, ValuationRun, histogram,
    reference_curve, run_valuation,
};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SEED: u64 = 42;
const MAX_SAMPLE_PATHS: usize = 100;
/// Largest batch the HTTP API will allocate for a single request.
const MAX_API_CELLS: usize = 10_000_000;

#[derive(Parser, Debug)]
#[command(
    name = "valuation",
    about = "Monte Carlo company valuation (geometric growth with noise)"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the JSON API.
    Serve {
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Run one simulation and print the result as JSON.
    Run(SimulateArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default, ValueEnum)]
pub enum CliIndustry {
    #[default]
    Technology,
    Healthcare,
    Finance,
    Retail,
    Manufacturing,
}

impl From<CliIndustry> for Industry {
    fn from(value: CliIndustry) -> Self {
        match value {
            CliIndustry::Technology => Industry::Technology,
            CliIndustry::Healthcare => Industry::Healthcare,
            CliIndustry::Finance => Industry::Finance,
            CliIndustry::Retail => Industry::Retail,
            CliIndustry::Manufacturing => Industry::Manufacturing,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiIndustry {
    #[serde(alias = "Technology")]
    Technology,
    #[serde(alias = "Healthcare")]
    Healthcare,
    #[serde(alias = "Finance")]
    Finance,
    #[serde(alias = "Retail")]
    Retail,
    #[serde(alias = "Manufacturing")]
    Manufacturing,
}

impl From<ApiIndustry> for CliIndustry {
    fn from(value: ApiIndustry) -> Self {
        match value {
            ApiIndustry::Technology => CliIndustry::Technology,
            ApiIndustry::Healthcare => CliIndustry::Healthcare,
            ApiIndustry::Finance => CliIndustry::Finance,
            ApiIndustry::Retail => CliIndustry::Retail,
            ApiIndustry::Manufacturing => CliIndustry::Manufacturing,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    #[arg(long, value_enum, default_value_t = CliIndustry::Technology)]
    pub industry: CliIndustry,
    #[arg(long, default_value_t = DEFAULT_INITIAL_VALUE, help = "Initial valuation")]
    pub initial_value: f64,
    #[arg(
        long,
        help = "Expected annual growth rate in percent, defaults to the industry midpoint"
    )]
    pub growth_rate: Option<f64>,
    #[arg(
        long,
        help = "Annual volatility in percent, defaults to the industry midpoint"
    )]
    pub volatility: Option<f64>,
    #[arg(long, default_value_t = DEFAULT_TIME_HORIZON, help = "Time horizon in years")]
    pub time_horizon: usize,
    #[arg(long, default_value_t = DEFAULT_NUM_SIMULATIONS)]
    pub simulations: usize,
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,
    #[arg(long, help = "Dedicated worker threads; defaults to the global pool")]
    pub workers: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    industry: Option<ApiIndustry>,
    initial_value: Option<f64>,
    growth_rate: Option<f64>,
    volatility: Option<f64>,
    time_horizon: Option<usize>,
    simulations: Option<usize>,
    seed: Option<u64>,
    workers: Option<usize>,
}

#[derive(Copy, Clone, Debug)]
struct SimulationRequest {
    industry: Industry,
    params: SimulationParameters,
    seed: u64,
    execution: Execution,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    industry: Industry,
    seed: u64,
    parameters: SimulationParameters,
    metrics: ValuationMetrics,
    elapsed_ms: f64,
    mean_path: Vec<f64>,
    sample_paths: Vec<Vec<f64>>,
    terminal_values: Vec<f64>,
    histogram: Histogram,
    reference_curve: Option<ReferenceCurve>,
    industry_fit: IndustryFit,
    warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
struct IndustriesResponse {
    industries: Vec<IndustryPreset>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_request(args: SimulateArgs) -> Result<SimulationRequest, String> {
    let industry: Industry = args.industry.into();
    let preset = industry.preset();

    let growth_rate = match args.growth_rate {
        Some(v) if !v.is_finite() => return Err("--growth-rate must be finite".to_string()),
        Some(v) => v / 100.0,
        None => preset.default_growth_rate(),
    };
    let volatility = match args.volatility {
        Some(v) if !v.is_finite() || v < 0.0 => {
            return Err("--volatility must be >= 0".to_string());
        }
        Some(v) => v / 100.0,
        None => preset.default_volatility(),
    };
    let execution = match args.workers {
        None => Execution::Parallel,
        Some(n) => {
            let workers =
                NonZeroUsize::new(n).ok_or_else(|| "--workers must be > 0".to_string())?;
            let available = max_workers();
            if workers > available {
                return Err(format!(
                    "--workers must be <= {available} (available parallelism)"
                ));
            }
            Execution::Workers(workers)
        }
    };

    let params = SimulationParameters::new(
        args.initial_value,
        growth_rate,
        volatility,
        args.time_horizon,
        args.simulations,
    )?;

    Ok(SimulationRequest {
        industry,
        params,
        seed: args.seed,
        execution,
    })
}

fn max_workers() -> NonZeroUsize {
    std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}

/// Runs the `run` subcommand and returns the pretty-printed response.
pub fn run_cli(args: SimulateArgs) -> Result<String, String> {
    let request = build_request(args)?;
    let response = execute_request(&request)?;
    serde_json::to_string_pretty(&response).map_err(|e| format!("Failed to encode response: {e}"))
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router();

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Valuation HTTP API listening");
    info!("Local access: http://127.0.0.1:{port}/api/simulate");

    axum::serve(listener, app).await
}

fn router() -> Router {
    Router::new()
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route("/api/industries", get(industries_handler))
        .fallback(not_found_handler)
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn industries_handler() -> Response {
    json_response(
        StatusCode::OK,
        IndustriesResponse {
            industries: Industry::ALL.iter().map(|i| i.preset()).collect(),
        },
    )
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let request = match request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    match tokio::task::spawn_blocking(move || execute_request(&request)).await {
        Ok(Ok(response)) => json_response(StatusCode::OK, response),
        Ok(Err(msg)) => error_response(StatusCode::BAD_REQUEST, &msg),
        Err(e) => {
            error!(error = %e, "Simulation task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Simulation task failed")
        }
    }
}

fn execute_request(request: &SimulationRequest) -> Result<SimulateResponse, String> {
    let run = run_valuation(&request.params, request.seed, request.execution)?;
    build_simulate_response(request, &run)
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

fn request_from_payload(payload: SimulatePayload) -> Result<SimulationRequest, String> {
    let mut args = default_args_for_api();

    if let Some(v) = payload.industry {
        args.industry = v.into();
    }
    if let Some(v) = payload.initial_value {
        args.initial_value = v;
    }
    if let Some(v) = payload.growth_rate {
        args.growth_rate = Some(v);
    }
    if let Some(v) = payload.volatility {
        args.volatility = Some(v);
    }
    if let Some(v) = payload.time_horizon {
        args.time_horizon = v;
    }
    if let Some(v) = payload.simulations {
        args.simulations = v;
    }
    if let Some(v) = payload.seed {
        args.seed = v;
    }
    if let Some(v) = payload.workers {
        args.workers = Some(v);
    }

    let request = build_request(args)?;
    if request.params.cell_count() > MAX_API_CELLS {
        return Err(format!(
            "simulations * timeHorizon must be <= {MAX_API_CELLS}, got {} x {}",
            request.params.num_simulations, request.params.time_horizon
        ));
    }
    Ok(request)
}

fn default_args_for_api() -> SimulateArgs {
    SimulateArgs {
        industry: CliIndustry::Technology,
        initial_value: DEFAULT_INITIAL_VALUE,
        growth_rate: None,
        volatility: None,
        time_horizon: DEFAULT_TIME_HORIZON,
        simulations: DEFAULT_NUM_SIMULATIONS,
        seed: DEFAULT_SEED,
        workers: None,
    }
}

fn build_simulate_response(
    request: &SimulationRequest,
    run: &ValuationRun,
) -> Result<SimulateResponse, String> {
    Ok(SimulateResponse {
        industry: request.industry,
        seed: request.seed,
        parameters: request.params,
        metrics: run.metrics,
        elapsed_ms: run.elapsed.as_secs_f64() * 1_000.0,
        mean_path: run.batch.mean_path(),
        sample_paths: run
            .batch
            .rows()
            .take(MAX_SAMPLE_PATHS)
            .map(<[f64]>::to_vec)
            .collect(),
        terminal_values: run.terminal_values.clone(),
        histogram: histogram(&run.terminal_values, DEFAULT_HISTOGRAM_BINS)?,
        reference_curve: reference_curve(&run.terminal_values, DEFAULT_CURVE_POINTS)?,
        industry_fit: request.industry.preset().assess(&request.params),
        warnings: request.params.soft_bound_warnings(),
    })
}

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::error::Result;
use super::stats::summarize;
use super::types::{SimulationParameters, TrajectoryBatch, ValuationMetrics};

/// Hands out one independent generator per trajectory index.
///
/// The generator for index `i` must not depend on which worker asks for it or
/// in what order, so a batch is identical however the rows are scheduled.
pub trait StreamSource: Sync {
    type Stream: Rng;

    fn stream(&self, trajectory: usize) -> Self::Stream;
}

impl<F, R> StreamSource for F
where
    F: Fn(usize) -> R + Sync,
    R: Rng,
{
    type Stream = R;

    fn stream(&self, trajectory: usize) -> R {
        self(trajectory)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeededStreams {
    seed: u64,
}

impl SeededStreams {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl StreamSource for SeededStreams {
    type Stream = StdRng;

    fn stream(&self, trajectory: usize) -> StdRng {
        StdRng::seed_from_u64(derive_seed(self.seed, trajectory))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Execution {
    Sequential,
    /// Rayon's global pool.
    #[default]
    Parallel,
    /// Dedicated pool with a fixed number of threads.
    Workers(NonZeroUsize),
}

#[derive(Debug, Clone)]
pub struct ValuationRun {
    pub batch: TrajectoryBatch,
    pub terminal_values: Vec<f64>,
    pub metrics: ValuationMetrics,
    pub elapsed: Duration,
}

pub fn simulate(params: &SimulationParameters, seed: u64) -> Result<TrajectoryBatch> {
    simulate_with(params, &SeededStreams::new(seed), Execution::default())
}

pub fn simulate_with<S: StreamSource>(
    params: &SimulationParameters,
    streams: &S,
    execution: Execution,
) -> Result<TrajectoryBatch> {
    params.validate()?;

    let horizon = params.time_horizon;
    let mut values = vec![0.0; params.cell_count()];

    match execution {
        Execution::Sequential => {
            for (i, row) in values.chunks_mut(horizon).enumerate() {
                fill_trajectory(params, &mut streams.stream(i), row);
            }
        }
        Execution::Parallel => fill_parallel(params, streams, &mut values),
        Execution::Workers(workers) => {
            let pool = ThreadPoolBuilder::new()
                .num_threads(workers.get())
                .thread_name(|i| format!("valuation-worker-{i}"))
                .build();
            match pool {
                Ok(pool) => pool.install(|| fill_parallel(params, streams, &mut values)),
                Err(e) => {
                    warn!(
                        error = %e,
                        workers = workers.get(),
                        "Worker pool unavailable, using global pool"
                    );
                    fill_parallel(params, streams, &mut values);
                }
            }
        }
    }

    Ok(TrajectoryBatch::from_raw(
        params.num_simulations,
        horizon,
        values,
    ))
}

/// Simulates, then reduces the terminal column into summary metrics.
pub fn run_valuation(
    params: &SimulationParameters,
    seed: u64,
    execution: Execution,
) -> Result<ValuationRun> {
    params.validate()?;
    for warning in params.soft_bound_warnings() {
        warn!(%warning, "Parameter outside recommended range");
    }

    info!(
        initial_value = params.initial_value,
        growth_rate = params.growth_rate,
        volatility = params.volatility,
        time_horizon = params.time_horizon,
        num_simulations = params.num_simulations,
        seed,
        ?execution,
        "Running valuation simulation"
    );

    let started = Instant::now();
    let batch = simulate_with(params, &SeededStreams::new(seed), execution)?;
    let elapsed = started.elapsed();

    let terminal_values = batch.terminal_values();
    let metrics = summarize(&terminal_values)?;

    info!(
        elapsed_ms = elapsed.as_secs_f64() * 1_000.0,
        mean = metrics.mean,
        median = metrics.median,
        "Simulation completed"
    );

    Ok(ValuationRun {
        batch,
        terminal_values,
        metrics,
        elapsed,
    })
}

fn fill_parallel<S: StreamSource>(params: &SimulationParameters, streams: &S, values: &mut [f64]) {
    debug!(
        threads = rayon::current_num_threads(),
        "Filling trajectories in parallel"
    );
    values
        .par_chunks_mut(params.time_horizon)
        .enumerate()
        .for_each(|(i, row)| fill_trajectory(params, &mut streams.stream(i), row));
}

// Euler step with additive noise; no floor, so values may cross zero.
fn fill_trajectory<R: Rng>(params: &SimulationParameters, rng: &mut R, row: &mut [f64]) {
    let mut current = params.initial_value;
    for slot in row.iter_mut() {
        let z: f64 = rng.sample(StandardNormal);
        let drift = params.growth_rate * current;
        let shock = params.volatility * current * z;
        current = current + drift + shock;
        *slot = current;
    }
}

fn derive_seed(base_seed: u64, trajectory: usize) -> u64 {
    splitmix64(base_seed ^ splitmix64(trajectory as u64))
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

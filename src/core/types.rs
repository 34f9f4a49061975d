use serde::Serialize;

use super::error::{EngineError, Result};

pub const RECOMMENDED_MIN_INITIAL_VALUE: f64 = 100_000.0;
pub const RECOMMENDED_RATE_RANGE: (f64, f64) = (0.05, 0.50);
pub const RECOMMENDED_HORIZON_RANGE: (usize, usize) = (1, 10);
pub const RECOMMENDED_SIMULATION_RANGE: (usize, usize) = (100, 10_000);

/// Inputs for one valuation run.
///
/// Only the hard constraints checked by [`SimulationParameters::validate`] reject
/// a run; the recommended UI ranges are surfaced through
/// [`SimulationParameters::soft_bound_warnings`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationParameters {
    pub initial_value: f64,
    pub growth_rate: f64,
    pub volatility: f64,
    pub time_horizon: usize,
    pub num_simulations: usize,
}

impl SimulationParameters {
    pub fn new(
        initial_value: f64,
        growth_rate: f64,
        volatility: f64,
        time_horizon: usize,
        num_simulations: usize,
    ) -> Result<Self> {
        let params = Self {
            initial_value,
            growth_rate,
            volatility,
            time_horizon,
            num_simulations,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.initial_value.is_finite() || self.initial_value <= 0.0 {
            return Err(EngineError::InvalidParameter(format!(
                "initial_value must be a finite value > 0, got {}",
                self.initial_value
            )));
        }
        if !self.growth_rate.is_finite() {
            return Err(EngineError::InvalidParameter(format!(
                "growth_rate must be finite, got {}",
                self.growth_rate
            )));
        }
        if !self.volatility.is_finite() || self.volatility < 0.0 {
            return Err(EngineError::InvalidParameter(format!(
                "volatility must be a finite value >= 0, got {}",
                self.volatility
            )));
        }
        if self.time_horizon < 1 {
            return Err(EngineError::InvalidParameter(
                "time_horizon must be >= 1".to_string(),
            ));
        }
        if self.num_simulations < 1 {
            return Err(EngineError::InvalidParameter(
                "num_simulations must be >= 1".to_string(),
            ));
        }
        let max_cells = isize::MAX as usize / std::mem::size_of::<f64>();
        match self.num_simulations.checked_mul(self.time_horizon) {
            Some(cells) if cells <= max_cells => Ok(()),
            _ => Err(EngineError::InvalidParameter(format!(
                "num_simulations * time_horizon must fit in one batch, got {} x {}",
                self.num_simulations, self.time_horizon
            ))),
        }
    }

    /// Number of values in the batch; only meaningful once `validate` passed.
    pub fn cell_count(&self) -> usize {
        self.num_simulations * self.time_horizon
    }

    pub fn soft_bound_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let (rate_lo, rate_hi) = RECOMMENDED_RATE_RANGE;
        let (horizon_lo, horizon_hi) = RECOMMENDED_HORIZON_RANGE;
        let (sims_lo, sims_hi) = RECOMMENDED_SIMULATION_RANGE;

        if self.initial_value < RECOMMENDED_MIN_INITIAL_VALUE {
            warnings.push(format!(
                "initial_value {} is below the recommended minimum of {RECOMMENDED_MIN_INITIAL_VALUE}",
                self.initial_value
            ));
        }
        if !(rate_lo..=rate_hi).contains(&self.growth_rate) {
            warnings.push(format!(
                "growth_rate {} is outside the recommended range [{rate_lo}, {rate_hi}]",
                self.growth_rate
            ));
        }
        if !(rate_lo..=rate_hi).contains(&self.volatility) {
            warnings.push(format!(
                "volatility {} is outside the recommended range [{rate_lo}, {rate_hi}]",
                self.volatility
            ));
        }
        if !(horizon_lo..=horizon_hi).contains(&self.time_horizon) {
            warnings.push(format!(
                "time_horizon {} is outside the recommended range [{horizon_lo}, {horizon_hi}]",
                self.time_horizon
            ));
        }
        if !(sims_lo..=sims_hi).contains(&self.num_simulations) {
            warnings.push(format!(
                "num_simulations {} is outside the recommended range [{sims_lo}, {sims_hi}]",
                self.num_simulations
            ));
        }
        warnings
    }
}

/// Dense row-major matrix of simulated values, one row per trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryBatch {
    num_simulations: usize,
    time_horizon: usize,
    values: Vec<f64>,
}

impl TrajectoryBatch {
    pub(crate) fn from_raw(num_simulations: usize, time_horizon: usize, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), num_simulations * time_horizon);
        Self {
            num_simulations,
            time_horizon,
            values,
        }
    }

    pub fn num_simulations(&self) -> usize {
        self.num_simulations
    }

    pub fn time_horizon(&self) -> usize {
        self.time_horizon
    }

    pub fn row(&self, index: usize) -> Option<&[f64]> {
        if index >= self.num_simulations {
            return None;
        }
        let start = index * self.time_horizon;
        Some(&self.values[start..start + self.time_horizon])
    }

    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[f64]> {
        self.values.chunks_exact(self.time_horizon)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Values at the last time step, in simulation index order.
    pub fn terminal_values(&self) -> Vec<f64> {
        self.rows().map(|row| row[self.time_horizon - 1]).collect()
    }

    /// Average value across all trajectories at each time step.
    pub fn mean_path(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.time_horizon];
        for row in self.rows() {
            for (sum, value) in sums.iter_mut().zip(row) {
                *sum += value;
            }
        }
        let n = self.num_simulations as f64;
        sums.into_iter().map(|sum| sum / n).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuationMetrics {
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub p95: f64,
    pub p5: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Histogram {
    /// `bins + 1` boundaries from the smallest to the largest finite value.
    pub edges: Vec<f64>,
    /// Share of the whole sample falling into each bin.
    pub probabilities: Vec<f64>,
    /// Share of values that overflowed to negative infinity.
    pub negative_overflow: f64,
    /// Share of values that overflowed to positive infinity.
    pub positive_overflow: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceCurve {
    pub mu: f64,
    pub sigma: f64,
    pub x: Vec<f64>,
    pub density: Vec<f64>,
}

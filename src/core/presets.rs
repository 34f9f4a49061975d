use serde::Serialize;

use super::types::SimulationParameters;

pub const DEFAULT_INITIAL_VALUE: f64 = 1_000_000.0;
pub const DEFAULT_TIME_HORIZON: usize = 5;
pub const DEFAULT_NUM_SIMULATIONS: usize = 1_000;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default, Serialize)]
pub enum Industry {
    #[default]
    Technology,
    Healthcare,
    Finance,
    Retail,
    Manufacturing,
}

impl Industry {
    pub const ALL: [Industry; 5] = [
        Industry::Technology,
        Industry::Healthcare,
        Industry::Finance,
        Industry::Retail,
        Industry::Manufacturing,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Industry::Technology => "Technology",
            Industry::Healthcare => "Healthcare",
            Industry::Finance => "Finance",
            Industry::Retail => "Retail",
            Industry::Manufacturing => "Manufacturing",
        }
    }

    pub fn preset(self) -> IndustryPreset {
        let (growth_range, volatility_range) = match self {
            Industry::Technology => ((0.15, 0.40), (0.25, 0.50)),
            Industry::Healthcare => ((0.10, 0.30), (0.20, 0.40)),
            Industry::Finance => ((0.12, 0.35), (0.22, 0.45)),
            Industry::Retail => ((0.08, 0.25), (0.15, 0.35)),
            Industry::Manufacturing => ((0.05, 0.20), (0.10, 0.30)),
        };
        IndustryPreset {
            industry: self,
            growth_range,
            volatility_range,
        }
    }
}

/// Typical annual growth and volatility for an industry, as fractions.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndustryPreset {
    pub industry: Industry,
    pub growth_range: (f64, f64),
    pub volatility_range: (f64, f64),
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndustryFit {
    pub industry: Industry,
    pub typical_growth_range: (f64, f64),
    pub typical_volatility_range: (f64, f64),
    pub growth_within_range: bool,
    pub volatility_within_range: bool,
}

impl IndustryPreset {
    pub fn default_growth_rate(&self) -> f64 {
        midpoint(self.growth_range)
    }

    pub fn default_volatility(&self) -> f64 {
        midpoint(self.volatility_range)
    }

    pub fn default_parameters(&self) -> SimulationParameters {
        SimulationParameters {
            initial_value: DEFAULT_INITIAL_VALUE,
            growth_rate: self.default_growth_rate(),
            volatility: self.default_volatility(),
            time_horizon: DEFAULT_TIME_HORIZON,
            num_simulations: DEFAULT_NUM_SIMULATIONS,
        }
    }

    pub fn assess(&self, params: &SimulationParameters) -> IndustryFit {
        IndustryFit {
            industry: self.industry,
            typical_growth_range: self.growth_range,
            typical_volatility_range: self.volatility_range,
            growth_within_range: within(self.growth_range, params.growth_rate),
            volatility_within_range: within(self.volatility_range, params.volatility),
        }
    }
}

fn midpoint((lo, hi): (f64, f64)) -> f64 {
    (lo + hi) / 2.0
}

fn within((lo, hi): (f64, f64), value: f64) -> bool {
    (lo..=hi).contains(&value)
}

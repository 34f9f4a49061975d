mod engine;
mod error;
mod presets;
mod stats;
mod types;

pub use engine::{
    Execution, SeededStreams, StreamSource, ValuationRun, run_valuation, simulate, simulate_with,
};
pub use error::{EngineError, Result};
pub use presets::{
    DEFAULT_INITIAL_VALUE, DEFAULT_NUM_SIMULATIONS, DEFAULT_TIME_HORIZON, Industry, IndustryFit,
    IndustryPreset,
};
pub use stats::{
    DEFAULT_CURVE_POINTS, DEFAULT_HISTOGRAM_BINS, histogram, reference_curve, summarize,
};
pub use types::{
    Histogram, RECOMMENDED_HORIZON_RANGE, RECOMMENDED_MIN_INITIAL_VALUE, RECOMMENDED_RATE_RANGE,
    RECOMMENDED_SIMULATION_RANGE, ReferenceCurve, SimulationParameters, TrajectoryBatch,
    ValuationMetrics,
};

use statrs::distribution::{Continuous, Normal};

use super::error::{EngineError, Result};
use super::types::{Histogram, ReferenceCurve, ValuationMetrics};

pub const DEFAULT_HISTOGRAM_BINS: usize = 50;
pub const DEFAULT_CURVE_POINTS: usize = 100;

/// Reduces a terminal-value sample to mean, median, population standard
/// deviation and the interpolated 5th/95th percentiles.
pub fn summarize(terminal_values: &[f64]) -> Result<ValuationMetrics> {
    let sorted = sorted_sample(terminal_values)?;
    let mean = mean(&sorted);

    Ok(ValuationMetrics {
        mean,
        median: percentile(&sorted, 50.0),
        std_dev: population_std_dev(&sorted, mean),
        p95: percentile(&sorted, 95.0),
        p5: percentile(&sorted, 5.0),
    })
}

/// Equal-width bins over the range of the finite values.
///
/// Infinite values are not binned; their shares are reported in
/// `negative_overflow` and `positive_overflow`, so bins and overflow shares
/// together sum to 1. A sample whose finite values are all equal gets a single
/// bin, and a sample with no finite values gets none.
pub fn histogram(sample: &[f64], bins: usize) -> Result<Histogram> {
    if bins == 0 {
        return Err(EngineError::InvalidInput(
            "histogram needs at least one bin".to_string(),
        ));
    }
    let sorted = sorted_sample(sample)?;
    let n = sorted.len() as f64;

    // Sorted, so the finite values sit between the two infinite tails.
    let start = sorted.iter().take_while(|v| **v == f64::NEG_INFINITY).count();
    let end = sorted.len() - sorted.iter().rev().take_while(|v| **v == f64::INFINITY).count();
    let negative_overflow = start as f64 / n;
    let positive_overflow = (sorted.len() - end) as f64 / n;
    let finite = &sorted[start..end];

    let (Some(&min), Some(&max)) = (finite.first(), finite.last()) else {
        return Ok(Histogram {
            edges: Vec::new(),
            probabilities: Vec::new(),
            negative_overflow,
            positive_overflow,
        });
    };

    let width = (max - min) / bins as f64;
    if !(width.is_finite() && width > 0.0) {
        return Ok(Histogram {
            edges: vec![min, max],
            probabilities: vec![finite.len() as f64 / n],
            negative_overflow,
            positive_overflow,
        });
    }

    let mut counts = vec![0_usize; bins];
    for value in finite {
        // The last bin is closed on the right so the maximum lands in it.
        let idx = (((value - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    Ok(Histogram {
        edges: (0..=bins).map(|i| min + width * i as f64).collect(),
        probabilities: counts.into_iter().map(|c| c as f64 / n).collect(),
        negative_overflow,
        positive_overflow,
    })
}

/// Normal density fitted to the sample (population sigma), evaluated on an
/// even grid from the sample minimum to its maximum.
///
/// Returns `Ok(None)` when the sample has no spread to fit.
pub fn reference_curve(sample: &[f64], points: usize) -> Result<Option<ReferenceCurve>> {
    if points < 2 {
        return Err(EngineError::InvalidInput(
            "reference curve needs at least two points".to_string(),
        ));
    }
    let sorted = sorted_sample(sample)?;
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    if min == max {
        return Ok(None);
    }

    let mu = mean(&sorted);
    let sigma = population_std_dev(&sorted, mu);
    if !(sigma.is_finite() && sigma > 0.0) {
        return Ok(None);
    }
    let Ok(normal) = Normal::new(mu, sigma) else {
        return Ok(None);
    };

    let step = (max - min) / (points - 1) as f64;
    let x: Vec<f64> = (0..points).map(|i| min + step * i as f64).collect();
    let density = x.iter().map(|&xi| normal.pdf(xi)).collect();

    Ok(Some(ReferenceCurve {
        mu,
        sigma,
        x,
        density,
    }))
}

fn sorted_sample(sample: &[f64]) -> Result<Vec<f64>> {
    if sample.is_empty() {
        return Err(EngineError::InvalidInput(
            "terminal value sample is empty".to_string(),
        ));
    }
    if let Some(idx) = sample.iter().position(|v| v.is_nan()) {
        return Err(EngineError::InvalidInput(format!(
            "terminal value sample contains NaN at index {idx}"
        )));
    }

    let mut sorted = sample.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Ok(sorted)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    let sum_sq: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    (sum_sq / values.len() as f64).sqrt()
}

// Expects a sorted, non-empty slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }

    let rank = (p / 100.0) * (n as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        sorted[lower]
    } else {
        let w = rank - lower as f64;
        sorted[lower] * (1.0 - w) + sorted[upper] * w
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest};
    use proptest::collection::vec;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn known_sample_matches_reference_values() {
        let metrics = summarize(&[10.0, 20.0, 30.0, 40.0, 50.0]).expect("non-empty sample");
        assert_approx(metrics.mean, 30.0);
        assert_approx(metrics.median, 30.0);
        assert_approx(metrics.std_dev, 200.0_f64.sqrt());
        assert_approx(metrics.p5, 12.0);
        assert_approx(metrics.p95, 48.0);
    }

    #[test]
    fn input_order_does_not_matter() {
        let a = summarize(&[50.0, 10.0, 40.0, 30.0, 20.0]).expect("non-empty sample");
        let b = summarize(&[10.0, 20.0, 30.0, 40.0, 50.0]).expect("non-empty sample");
        assert_eq!(a, b);
    }

    #[test]
    fn even_sample_median_averages_middle_pair() {
        let metrics = summarize(&[4.0, 1.0, 3.0, 2.0]).expect("non-empty sample");
        assert_approx(metrics.median, 2.5);
        assert_approx(metrics.mean, 2.5);
        assert_approx(metrics.std_dev, 1.25_f64.sqrt());
        // rank 0.15 and 2.85
        assert_approx(metrics.p5, 1.15);
        assert_approx(metrics.p95, 3.85);
    }

    #[test]
    fn single_value_collapses_every_statistic() {
        let metrics = summarize(&[-7.5]).expect("non-empty sample");
        assert_approx(metrics.mean, -7.5);
        assert_approx(metrics.median, -7.5);
        assert_approx(metrics.std_dev, 0.0);
        assert_approx(metrics.p5, -7.5);
        assert_approx(metrics.p95, -7.5);
    }

    #[test]
    fn empty_sample_is_rejected() {
        assert!(matches!(summarize(&[]), Err(EngineError::InvalidInput(_))));
        assert!(matches!(histogram(&[], 10), Err(EngineError::InvalidInput(_))));
        assert!(matches!(
            reference_curve(&[], 10),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn nan_sample_is_rejected() {
        let err = summarize(&[1.0, f64::NAN, 3.0]).expect_err("NaN is malformed");
        assert!(err.to_string().contains("index 1"));
    }

    #[test]
    fn negative_values_are_summarized_as_is() {
        let metrics = summarize(&[-100.0, 0.0, 100.0]).expect("non-empty sample");
        assert_approx(metrics.mean, 0.0);
        assert_approx(metrics.median, 0.0);
        assert!(metrics.p5 < 0.0);
    }

    #[test]
    fn histogram_probabilities_sum_to_one() {
        let sample: Vec<f64> = (0..1_000).map(|i| i as f64).collect();
        let hist = histogram(&sample, DEFAULT_HISTOGRAM_BINS).expect("non-empty sample");
        assert_eq!(hist.edges.len(), DEFAULT_HISTOGRAM_BINS + 1);
        assert_eq!(hist.probabilities.len(), DEFAULT_HISTOGRAM_BINS);
        assert_approx(hist.probabilities.iter().sum(), 1.0);
        assert_approx(hist.edges[0], 0.0);
        assert_approx(hist.edges[DEFAULT_HISTOGRAM_BINS], 999.0);
        for p in &hist.probabilities {
            assert!((p - 0.02).abs() < 0.002, "uneven bin share {p}");
        }
    }

    #[test]
    fn histogram_places_maximum_in_last_bin() {
        let hist = histogram(&[0.0, 1.0, 2.0, 3.0], 3).expect("non-empty sample");
        assert_eq!(hist.probabilities, vec![0.25, 0.25, 0.5]);
    }

    #[test]
    fn histogram_of_constant_sample_is_single_bin() {
        let hist = histogram(&[5.0; 8], 50).expect("non-empty sample");
        assert_eq!(hist.edges, vec![5.0, 5.0]);
        assert_eq!(hist.probabilities, vec![1.0]);
        assert!(matches!(histogram(&[1.0], 0), Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn histogram_bins_finite_values_and_reports_overflow() {
        let hist = histogram(&[1.0, 2.0, f64::INFINITY, 3.0], 2).expect("non-empty sample");
        assert_eq!(hist.edges, vec![1.0, 2.0, 3.0]);
        assert_eq!(hist.probabilities, vec![0.25, 0.5]);
        assert_eq!(hist.negative_overflow, 0.0);
        assert_eq!(hist.positive_overflow, 0.25);

        let hist = histogram(&[f64::NEG_INFINITY, 4.0, 4.0, f64::INFINITY], 10)
            .expect("non-empty sample");
        assert_eq!(hist.edges, vec![4.0, 4.0]);
        assert_eq!(hist.probabilities, vec![0.5]);
        assert_eq!(hist.negative_overflow, 0.25);
        assert_eq!(hist.positive_overflow, 0.25);
    }

    #[test]
    fn histogram_of_only_overflowed_values_has_no_bins() {
        let hist = histogram(&[f64::INFINITY, f64::INFINITY], 5).expect("non-empty sample");
        assert!(hist.edges.is_empty());
        assert!(hist.probabilities.is_empty());
        assert_eq!(hist.positive_overflow, 1.0);
    }

    #[test]
    fn reference_curve_peaks_at_mean() {
        let sample = [10.0, 20.0, 30.0, 40.0, 50.0];
        let curve = reference_curve(&sample, 5)
            .expect("non-empty sample")
            .expect("sample has spread");
        assert_approx(curve.mu, 30.0);
        assert_approx(curve.sigma, 200.0_f64.sqrt());
        assert_eq!(curve.x, vec![10.0, 20.0, 30.0, 40.0, 50.0]);

        let peak = 1.0 / (curve.sigma * (2.0 * std::f64::consts::PI).sqrt());
        assert_approx(curve.density[2], peak);
        assert_approx(curve.density[0], curve.density[4]);
        assert!(curve.density[1] < curve.density[2]);
    }

    #[test]
    fn reference_curve_skips_degenerate_sample() {
        assert_eq!(reference_curve(&[3.0; 4], 100).expect("non-empty sample"), None);
        assert!(matches!(
            reference_curve(&[1.0, 2.0], 1),
            Err(EngineError::InvalidInput(_))
        ));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_percentiles_are_ordered_within_range(
            sample in vec(-1.0e9f64..1.0e9, 1..200),
        ) {
            let metrics = summarize(&sample).expect("non-empty sample");
            let min = sample.iter().copied().fold(f64::INFINITY, f64::min);
            let max = sample.iter().copied().fold(f64::NEG_INFINITY, f64::max);

            let tol = 1e-9 * min.abs().max(max.abs()).max(1.0);

            prop_assert!(min <= metrics.p5 + tol);
            prop_assert!(metrics.p5 <= metrics.median + tol);
            prop_assert!(metrics.median <= metrics.p95 + tol);
            prop_assert!(metrics.p95 <= max + tol);
            prop_assert!(metrics.std_dev >= 0.0);
            prop_assert!(metrics.mean >= min - tol && metrics.mean <= max + tol);
        }
    }
}

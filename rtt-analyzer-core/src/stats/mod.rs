//! Latency statistics: mean, percentiles and the empirical CDF.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use thiserror::Error;

mod percentile;
pub use percentile::{percentile, PERCENTILES};

/// Errors raised by the statistics engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatsError {
    /// The sample has no values to summarize.
    #[error("Cannot summarize an empty sample")]
    EmptySample,
}

/// Descriptive statistics of one RTT sample. All values are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p99_ms: f64,
    pub p999_ms: f64,
    pub p9999_ms: f64,
    /// Sample standard deviation (n-1 denominator), zero for a single value.
    pub std_dev_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    /// Number of values the statistics were computed from.
    pub samples_ok: usize,
}

/// Empirical CDF of a sample, ready for plotting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    /// Sample values sorted ascending.
    pub x: Vec<f64>,
    /// Fraction of samples at or below `x[i]`, i.e. `(i + 1) / n`.
    pub y: Vec<f64>,
    /// Largest sample value, for axis scaling.
    pub x_max: f64,
}

impl ChartSeries {
    /// Number of points in the series.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Whether the series has no points.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Summarize a sample into its statistics and CDF series.
///
/// Values are sorted once; every percentile is read from the sorted copy with
/// [`percentile`], so the reported percentiles are non-decreasing in rank.
/// Nothing is rounded here.
///
/// # Errors
///
/// Returns [`StatsError::EmptySample`] if `values` is empty.
pub fn summarize(values: &[f64]) -> Result<(StatsSummary, ChartSeries), StatsError> {
    if values.is_empty() {
        return Err(StatsError::EmptySample);
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let mean = sorted.iter().mean();
    let std_dev = if n < 2 { 0.0 } else { sorted.iter().std_dev() };

    let [p50, p90, p99, p999, p9999] = PERCENTILES;
    let at = |q: f64| percentile(&sorted, q).ok_or(StatsError::EmptySample);

    let min = sorted[0];
    let max = sorted[n - 1];

    let summary = StatsSummary {
        mean_ms: mean,
        p50_ms: at(p50)?,
        p90_ms: at(p90)?,
        p99_ms: at(p99)?,
        p999_ms: at(p999)?,
        p9999_ms: at(p9999)?,
        std_dev_ms: std_dev,
        min_ms: min,
        max_ms: max,
        samples_ok: n,
    };

    let y = (1..=n).map(|rank| rank as f64 / n as f64).collect();
    let chart = ChartSeries {
        x: sorted,
        y,
        x_max: max,
    };

    Ok((summary, chart))
}

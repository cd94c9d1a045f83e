//! Comparison-history rows and the arithmetic performed on them.
//!
//! A history row is the persisted summary of one analysis. Consecutive rows
//! are compared by percent change; selected rows can be merged into one by
//! averaging their numeric columns.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::stats::StatsSummary;

/// Column names of the history table, in storage order.
pub const COLUMNS: [&str; 8] = [
    "timestamp",
    "source_file",
    "mean_ms",
    "p50_ms",
    "p90_ms",
    "p99_ms",
    "p999_ms",
    "p9999_ms",
];

/// Suffix appended to the source name of a merged row.
pub const MERGED_MARKER: &str = " (merged)";

/// One persisted analysis summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub timestamp: String,
    pub source_file: String,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p99_ms: f64,
    pub p999_ms: f64,
    pub p9999_ms: f64,
}

impl ComparisonRow {
    /// Build a history row from a freshly computed summary.
    pub fn from_summary(
        source_file: impl Into<String>,
        timestamp: impl Into<String>,
        stats: &StatsSummary,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            source_file: source_file.into(),
            mean_ms: stats.mean_ms,
            p50_ms: stats.p50_ms,
            p90_ms: stats.p90_ms,
            p99_ms: stats.p99_ms,
            p999_ms: stats.p999_ms,
            p9999_ms: stats.p9999_ms,
        }
    }

    /// Numeric columns in storage order.
    pub fn metrics(&self) -> [f64; 6] {
        [
            self.mean_ms,
            self.p50_ms,
            self.p90_ms,
            self.p99_ms,
            self.p999_ms,
            self.p9999_ms,
        ]
    }

    fn with_metrics(timestamp: String, source_file: String, metrics: [f64; 6]) -> Self {
        let [mean_ms, p50_ms, p90_ms, p99_ms, p999_ms, p9999_ms] = metrics;
        Self {
            timestamp,
            source_file,
            mean_ms,
            p50_ms,
            p90_ms,
            p99_ms,
            p999_ms,
            p9999_ms,
        }
    }
}

/// A previous value and the percent change of the current value against it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricDelta {
    pub value: f64,
    pub change: f64,
}

impl MetricDelta {
    fn new(current: f64, previous: f64) -> Self {
        Self {
            value: previous,
            change: percent_change(current, previous),
        }
    }
}

/// Change of every statistic against the previous history row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparisonDelta {
    pub mean_ms: MetricDelta,
    pub p50_ms: MetricDelta,
    pub p90_ms: MetricDelta,
    pub p99_ms: MetricDelta,
    pub p999_ms: MetricDelta,
    pub p9999_ms: MetricDelta,
}

impl ComparisonDelta {
    /// Compare a new summary against the row that preceded it.
    pub fn between(previous: &ComparisonRow, current: &StatsSummary) -> Self {
        Self {
            mean_ms: MetricDelta::new(current.mean_ms, previous.mean_ms),
            p50_ms: MetricDelta::new(current.p50_ms, previous.p50_ms),
            p90_ms: MetricDelta::new(current.p90_ms, previous.p90_ms),
            p99_ms: MetricDelta::new(current.p99_ms, previous.p99_ms),
            p999_ms: MetricDelta::new(current.p999_ms, previous.p999_ms),
            p9999_ms: MetricDelta::new(current.p9999_ms, previous.p9999_ms),
        }
    }

    /// Deltas paired with their column names, in storage order.
    pub fn entries(&self) -> [(&'static str, MetricDelta); 6] {
        [
            ("mean_ms", self.mean_ms),
            ("p50_ms", self.p50_ms),
            ("p90_ms", self.p90_ms),
            ("p99_ms", self.p99_ms),
            ("p999_ms", self.p999_ms),
            ("p9999_ms", self.p9999_ms),
        ]
    }
}

/// Percent change from `previous` to `current`.
///
/// Zero when `previous` is zero or either input is not finite.
pub fn percent_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return 0.0;
    }
    let change = (current - previous) / previous * 100.0;
    if change.is_finite() {
        change
    } else {
        0.0
    }
}

/// Merge rows into one by averaging every numeric column.
///
/// Identity fields come from the first row, whose source name gets
/// [`MERGED_MARKER`] appended unless it already ends with it. Returns `None`
/// for an empty slice.
pub fn merge_rows(rows: &[&ComparisonRow]) -> Option<ComparisonRow> {
    let first = rows.first()?;

    let mut metrics = [0.0; 6];
    for (column, slot) in metrics.iter_mut().enumerate() {
        *slot = rows.iter().map(|row| row.metrics()[column]).mean();
    }

    let source_file = if first.source_file.ends_with(MERGED_MARKER) {
        first.source_file.clone()
    } else {
        format!("{}{}", first.source_file, MERGED_MARKER)
    };

    Some(ComparisonRow::with_metrics(
        first.timestamp.clone(),
        source_file,
        metrics,
    ))
}

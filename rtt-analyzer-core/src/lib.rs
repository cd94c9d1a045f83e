//! Core types and utilities for rtt-analyzer.
//!
//! This crate provides the pieces shared by the rtt-analyzer service and the
//! command-line client: the HTTP wire protocol, CSV sample loading, latency
//! statistics and the comparison-history arithmetic.

pub mod comparison;
pub mod protocol;
pub mod report;
pub mod sample;
pub mod stats;

// Re-export main types for convenience
pub use comparison::{
    merge_rows, percent_change, ComparisonDelta, ComparisonRow, MetricDelta, COLUMNS,
    MERGED_MARKER,
};
pub use protocol::{
    AnalysisResult, ComparisonsView, Config, DataResponse, DeleteRowsRequest, DeleteRowsResponse,
    ErrorResponse, HealthResponse, MergeRowsRequest, MergeRowsResponse, ProcessFileRequest,
    SaveConfigRequest, StatusResponse,
};
pub use report::{ReportError, Reporter, TerminalReporter};
pub use sample::{FormatError, RttUnit, Sample, SampleLoader};
pub use stats::{percentile, summarize, ChartSeries, StatsError, StatsSummary, PERCENTILES};

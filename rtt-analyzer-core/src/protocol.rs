//! Request and response bodies of the rtt-analyzer HTTP API.
//!
//! Shared by the service and its clients so both sides agree on the wire
//! format.

use serde::{Deserialize, Serialize};

use crate::comparison::{ComparisonDelta, ComparisonRow};
use crate::stats::{ChartSeries, StatsSummary};

const SUCCESS: &str = "success";

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

impl HealthResponse {
    /// Create a ready response.
    pub fn ready() -> Self {
        Self {
            status: "ok".to_string(),
            message: "Backend is ready".to_string(),
        }
    }

    /// Whether the service reported itself ready.
    pub fn is_ready(&self) -> bool {
        self.status == "ok"
    }
}

/// Plain acknowledgement of a mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

impl StatusResponse {
    /// Create a success acknowledgement.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: SUCCESS.to_string(),
            message: message.into(),
        }
    }
}

/// Successful response carrying a payload under `data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

impl<T> DataResponse<T> {
    /// Wrap a payload.
    pub fn new(data: T) -> Self {
        Self {
            status: SUCCESS.to_string(),
            message: None,
            data,
        }
    }

    /// Wrap a payload with a human-readable message.
    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            status: SUCCESS.to_string(),
            message: Some(message.into()),
            data,
        }
    }
}

/// Error body returned with every non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl ErrorResponse {
    /// Create an error body.
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// User directories and the location of the comparison history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input_dir: String,
    pub output_base_dir: String,
    /// Filled in by the service; never taken from a client.
    pub comparisons_file: String,
}

/// Body of `POST /save-config`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveConfigRequest {
    pub input_dir: String,
    pub output_base_dir: String,
}

/// Body of `POST /process-file`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessFileRequest {
    pub file_path: String,
    #[serde(default)]
    pub output_base_dir: Option<String>,
}

impl ProcessFileRequest {
    /// Create a request for `file_path` with no output override.
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            output_base_dir: None,
        }
    }

    /// Set the directory under which the results directory is created.
    pub fn with_output_base_dir(mut self, dir: impl Into<String>) -> Self {
        self.output_base_dir = Some(dir.into());
        self
    }
}

/// Result of analyzing one capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub stats: StatsSummary,
    pub chart_data: ChartSeries,
    /// Change against the previous history row; `None` for the first row.
    pub comparison: Option<ComparisonDelta>,
    /// Input file name without its extension.
    pub base_name: String,
    /// Directory the capture was copied into.
    pub output_dir: String,
    /// Location of the comparison history.
    pub comparison_file: String,
    /// Input rows that did not yield a measurement.
    pub skipped_rows: usize,
}

/// Body of `GET /get-comparisons`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComparisonsView {
    /// The most recent rows, for the history table.
    pub rows: Vec<ComparisonRow>,
    /// Column names; empty until the history file exists.
    pub columns: Vec<String>,
    /// Every row, for trend plotting. Row indices refer to this list.
    pub all_rows: Vec<ComparisonRow>,
}

impl ComparisonsView {
    /// Index in `all_rows` of the first entry of `rows`.
    pub fn rows_offset(&self) -> usize {
        self.all_rows.len().saturating_sub(self.rows.len())
    }
}

/// Body of `POST /merge-rows`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRowsRequest {
    pub row_indices: Vec<i64>,
    /// Accepted for compatibility with older clients; the service always
    /// recomputes the merged row itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_data: Option<serde_json::Value>,
}

impl MergeRowsRequest {
    /// Create a merge request for the given history indices.
    pub fn new(row_indices: Vec<i64>) -> Self {
        Self {
            row_indices,
            merged_data: None,
        }
    }
}

/// Response of `POST /merge-rows`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRowsResponse {
    pub status: String,
    pub message: String,
    pub rows_merged: usize,
}

impl MergeRowsResponse {
    /// Acknowledge a merge of `count` rows.
    pub fn merged(count: usize) -> Self {
        Self {
            status: SUCCESS.to_string(),
            message: format!("Successfully merged {count} rows"),
            rows_merged: count,
        }
    }
}

/// Body of `DELETE /delete-rows`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRowsRequest {
    pub row_indices: Vec<i64>,
}

impl DeleteRowsRequest {
    /// Create a delete request for the given history indices.
    pub fn new(row_indices: Vec<i64>) -> Self {
        Self { row_indices }
    }
}

/// Response of `DELETE /delete-rows`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRowsResponse {
    pub status: String,
    pub message: String,
    pub rows_deleted: usize,
}

impl DeleteRowsResponse {
    /// Acknowledge a deletion of `count` rows.
    pub fn deleted(count: usize) -> Self {
        Self {
            status: SUCCESS.to_string(),
            message: format!("Successfully deleted {count} rows"),
            rows_deleted: count,
        }
    }
}

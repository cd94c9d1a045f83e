//! Analysis of a single capture: load, summarize, compare against the
//! previous history row and record the result.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use rtt_analyzer_core::comparison::{ComparisonDelta, ComparisonRow};
use rtt_analyzer_core::protocol::AnalysisResult;
use rtt_analyzer_core::sample::{FormatError, SampleLoader};
use rtt_analyzer_core::stats::{summarize, StatsError};
use thiserror::Error;
use tracing::{debug, info};

use crate::store::{ComparisonStore, StoreError};

/// Format of the timestamp recorded in the history.
pub const TIMESTAMP_FORMAT: &str = "%m/%d %H:%M";

/// Steps of an analysis, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStage {
    Loading,
    Summarizing,
    Diffing,
    Persisting,
    Done,
}

impl fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnalysisStage::Loading => "loading",
            AnalysisStage::Summarizing => "summarizing",
            AnalysisStage::Diffing => "diffing",
            AnalysisStage::Persisting => "persisting",
            AnalysisStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Errors that abort an analysis. The history is never modified when one is
/// returned.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("{0}")]
    EmptySample(#[from] StatsError),

    #[error("Failed to prepare results directory '{}': {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AnalysisError {
    /// The stage the analysis failed in.
    pub fn stage(&self) -> AnalysisStage {
        match self {
            AnalysisError::Format(_) => AnalysisStage::Loading,
            AnalysisError::EmptySample(_) => AnalysisStage::Summarizing,
            AnalysisError::OutputDir { .. } | AnalysisError::Store(_) => {
                AnalysisStage::Persisting
            }
        }
    }
}

/// Runs analyses against a comparison history.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    loader: SampleLoader,
}

impl Analyzer {
    /// Create an analyzer that reads captures with `loader`.
    pub fn new(loader: SampleLoader) -> Self {
        Self { loader }
    }

    /// The loader used for captures.
    pub fn loader(&self) -> &SampleLoader {
        &self.loader
    }

    /// Analyze `file_path` and append the result to `store`, stamped with the
    /// current local time.
    ///
    /// See [`process_at`](Self::process_at).
    pub fn process(
        &self,
        store: &mut ComparisonStore,
        file_path: &Path,
        output_base_dir: Option<&str>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        self.process_at(store, file_path, output_base_dir, timestamp)
    }

    /// Analyze `file_path` and append the result to `store` under `timestamp`.
    ///
    /// The results directory is `<base>/<name>_results`, where `<base>` is
    /// `output_base_dir` when it names an existing directory and the
    /// capture's own directory otherwise. The capture is copied into it unless
    /// a file of that name is already there.
    ///
    /// # Errors
    ///
    /// Returns an [`AnalysisError`] tagged with the failing stage. Nothing is
    /// appended to the history on error.
    pub fn process_at(
        &self,
        store: &mut ComparisonStore,
        file_path: &Path,
        output_base_dir: Option<&str>,
        timestamp: String,
    ) -> Result<AnalysisResult, AnalysisError> {
        let base_name = file_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        debug!("[{}] {}", AnalysisStage::Loading, file_path.display());
        let sample = self.loader.load(file_path)?;

        debug!("[{}] {} values", AnalysisStage::Summarizing, sample.len());
        let (stats, chart_data) = summarize(&sample.values)?;

        debug!("[{}] against {} rows", AnalysisStage::Diffing, store.len());
        let comparison = store
            .last()
            .map(|previous| ComparisonDelta::between(previous, &stats));

        debug!("[{}] {}", AnalysisStage::Persisting, store.path().display());
        let output_dir = prepare_output_dir(file_path, &base_name, output_base_dir)?;
        store.append(ComparisonRow::from_summary(&base_name, timestamp, &stats))?;

        info!(
            "Processed '{}': {} samples ({} skipped), mean {:.3} ms",
            base_name,
            stats.samples_ok,
            sample.skipped_rows,
            stats.mean_ms
        );

        Ok(AnalysisResult {
            stats,
            chart_data,
            comparison,
            base_name,
            output_dir: output_dir.display().to_string(),
            comparison_file: store.path().display().to_string(),
            skipped_rows: sample.skipped_rows,
        })
    }
}

/// Create the results directory for a capture and copy the capture into it.
fn prepare_output_dir(
    file_path: &Path,
    base_name: &str,
    output_base_dir: Option<&str>,
) -> Result<PathBuf, AnalysisError> {
    let base = match output_base_dir.map(str::trim) {
        Some(dir) if !dir.is_empty() && Path::new(dir).is_dir() => PathBuf::from(dir),
        _ => match file_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        },
    };
    let output_dir = base.join(format!("{base_name}_results"));

    let io_error = |source| AnalysisError::OutputDir {
        path: output_dir.clone(),
        source,
    };
    fs::create_dir_all(&output_dir).map_err(io_error)?;

    if let Some(file_name) = file_path.file_name() {
        let dest = output_dir.join(file_name);
        if !dest.exists() {
            fs::copy(file_path, &dest).map_err(io_error)?;
        }
    }

    Ok(output_dir)
}

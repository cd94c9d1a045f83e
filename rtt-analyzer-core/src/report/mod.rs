use crate::comparison::ComparisonRow;
use crate::protocol::AnalysisResult;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Renders analysis results and comparison history for a human reader.
pub trait Reporter: Send + Sync {
    /// Report the outcome of analyzing one capture.
    fn report(&self, result: &AnalysisResult) -> Result<(), ReportError>;

    /// Report history rows. `first_index` is the history index of `rows[0]`.
    fn report_history(&self, rows: &[ComparisonRow], first_index: usize)
        -> Result<(), ReportError>;
}

mod terminal;
pub use terminal::TerminalReporter;

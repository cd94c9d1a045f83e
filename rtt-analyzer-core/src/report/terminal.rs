use std::io::{self, Write};

use colored::Colorize;

use super::{ReportError, Reporter};
use crate::comparison::{ComparisonRow, MetricDelta};
use crate::protocol::AnalysisResult;

const METRIC_LABELS: [&str; 6] = ["mean", "P50", "P90", "P99", "P99.9", "P99.99"];

/// A reporter that writes analysis results and history tables to the terminal.
#[derive(Debug, Clone, Default)]
pub struct TerminalReporter {
    /// Whether to use colors in output (defaults to true).
    use_colors: bool,
}

impl TerminalReporter {
    /// Create a new terminal reporter with default settings.
    pub fn new() -> Self {
        Self { use_colors: true }
    }

    /// Create a terminal reporter with color output disabled.
    pub fn without_colors() -> Self {
        Self { use_colors: false }
    }

    /// Format a latency in milliseconds, rounded for display.
    fn format_ms(ms: f64) -> String {
        format!("{:.2} ms", ms)
    }

    /// Format a percent change with an explicit sign.
    fn format_change(change: f64) -> String {
        if change > 0.0 {
            format!("+{:.2}%", change)
        } else if change < 0.0 {
            format!("-{:.2}%", change.abs())
        } else {
            "0.00%".to_string()
        }
    }

    /// Color a change: higher latency is a regression.
    fn format_change_colored(&self, change: f64) -> String {
        let text = Self::format_change(change);
        if !self.use_colors {
            return text;
        }
        if change > 0.0 {
            text.red().to_string()
        } else if change < 0.0 {
            text.green().to_string()
        } else {
            text
        }
    }

    fn bold(&self, text: &str) -> String {
        if self.use_colors {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    /// Print the statistics of one analysis, with deltas when available.
    fn print_analysis(&self, writer: &mut impl Write, result: &AnalysisResult) -> io::Result<()> {
        writeln!(writer)?;
        writeln!(
            writer,
            "{} ({} samples, {} skipped rows)",
            self.bold(&result.base_name),
            result.stats.samples_ok,
            result.skipped_rows
        )?;

        let header = format!(
            "{:<10} {:>14} {:>14} {:>10}",
            "Metric", "Current", "Previous", "Change"
        );
        writeln!(writer, "{}", self.bold(&header))?;
        writeln!(writer, "{}", "-".repeat(51))?;

        let stats = &result.stats;
        let current = [
            stats.mean_ms,
            stats.p50_ms,
            stats.p90_ms,
            stats.p99_ms,
            stats.p999_ms,
            stats.p9999_ms,
        ];
        let previous: Option<Vec<MetricDelta>> = result
            .comparison
            .map(|delta| delta.entries().iter().map(|(_, d)| *d).collect());

        for (i, label) in METRIC_LABELS.iter().enumerate() {
            let (prev, change) = match &previous {
                Some(deltas) => {
                    let delta = deltas[i];
                    let plain_len = Self::format_change(delta.change).len();
                    let padding = 10_usize.saturating_sub(plain_len);
                    (
                        Self::format_ms(delta.value),
                        format!("{:>padding$}{}", "", self.format_change_colored(delta.change)),
                    )
                }
                None => ("-".to_string(), format!("{:>10}", "-")),
            };
            writeln!(
                writer,
                "{:<10} {:>14} {:>14} {}",
                label,
                Self::format_ms(current[i]),
                prev,
                change
            )?;
        }

        writeln!(
            writer,
            "{:<10} {:>14}    std dev {}",
            "range",
            format!("{:.2}-{:.2}", stats.min_ms, stats.max_ms),
            Self::format_ms(stats.std_dev_ms)
        )?;
        writeln!(writer, "Results directory: {}", result.output_dir)?;
        Ok(())
    }

    /// Print the history table header.
    fn print_history_header(&self, writer: &mut impl Write) -> io::Result<()> {
        writeln!(writer)?;
        let header = format!(
            "{:>4}  {:<12} {:<32} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
            "#", "Timestamp", "Source", "mean", "P50", "P90", "P99", "P99.9", "P99.99"
        );
        writeln!(writer, "{}", self.bold(&header))?;
        writeln!(writer, "{}", "-".repeat(124))?;
        Ok(())
    }

    /// Print a single history row.
    fn print_history_row(
        &self,
        writer: &mut impl Write,
        index: usize,
        row: &ComparisonRow,
    ) -> io::Result<()> {
        let source = if row.source_file.chars().count() > 30 {
            let truncated: String = row.source_file.chars().take(27).collect();
            format!("{}...", truncated)
        } else {
            row.source_file.clone()
        };

        let [mean, p50, p90, p99, p999, p9999] = row.metrics();
        writeln!(
            writer,
            "{:>4}  {:<12} {:<32} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>10.2}",
            index, row.timestamp, source, mean, p50, p90, p99, p999, p9999
        )?;
        Ok(())
    }
}

impl Reporter for TerminalReporter {
    fn report(&self, result: &AnalysisResult) -> Result<(), ReportError> {
        let stdout = io::stdout();
        let mut writer = stdout.lock();

        self.print_analysis(&mut writer, result)?;

        Ok(())
    }

    fn report_history(
        &self,
        rows: &[ComparisonRow],
        first_index: usize,
    ) -> Result<(), ReportError> {
        let stdout = io::stdout();
        let mut writer = stdout.lock();

        if rows.is_empty() {
            writeln!(writer, "No comparison history.")?;
            return Ok(());
        }

        self.print_history_header(&mut writer)?;
        for (offset, row) in rows.iter().enumerate() {
            self.print_history_row(&mut writer, first_index + offset, row)?;
        }
        writeln!(writer)?;

        Ok(())
    }
}

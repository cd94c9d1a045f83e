//! Durable comparison history.
//!
//! The history is a CSV table with one row per analysis, in the order the
//! analyses happened. The store keeps the table in memory and rewrites the
//! whole file on every mutation; the in-memory copy only changes once the new
//! file is in place, so a failed mutation leaves both untouched.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rtt_analyzer_core::comparison::{merge_rows, ComparisonRow, COLUMNS};
use rtt_analyzer_core::protocol::ComparisonsView;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::persist::write_atomically;

/// Errors returned by [`ComparisonStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// A merge was requested with fewer than two distinct rows.
    #[error("{0}")]
    InvalidMerge(String),

    /// A row index does not exist in the table.
    #[error("Invalid row index: {index} (history has {len} rows)")]
    InvalidIndex { index: i64, len: usize },

    /// A deletion was requested without any row.
    #[error("At least 1 row required for deletion")]
    EmptySelection,

    /// Reading or writing the history file failed.
    #[error("Comparison history I/O failed for '{}': {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Row as found on disk. Files written by older versions may lack the
/// `p9999_ms` column or hold blank cells.
#[derive(Debug, Deserialize)]
struct StoredRow {
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    source_file: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    mean_ms: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    p50_ms: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    p90_ms: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    p99_ms: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    p999_ms: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    p9999_ms: Option<f64>,
}

impl StoredRow {
    /// Convert to a history row, or `None` when no statistic is present.
    fn into_row(self) -> Option<ComparisonRow> {
        let metrics = [
            self.mean_ms,
            self.p50_ms,
            self.p90_ms,
            self.p99_ms,
            self.p999_ms,
            self.p9999_ms,
        ];
        if metrics.iter().all(Option::is_none) {
            return None;
        }

        let [mean_ms, p50_ms, p90_ms, p99_ms, p999_ms, p9999_ms] =
            metrics.map(|value| value.unwrap_or(0.0));
        Some(ComparisonRow {
            timestamp: self.timestamp,
            source_file: self.source_file,
            mean_ms,
            p50_ms,
            p90_ms,
            p99_ms,
            p999_ms,
            p9999_ms,
        })
    }
}

/// The comparison history table.
#[derive(Debug)]
pub struct ComparisonStore {
    path: PathBuf,
    rows: Vec<ComparisonRow>,
    /// Whether the history file currently exists on disk.
    exists: bool,
    /// Number of trailing rows in the `rows` view of [`list`](Self::list);
    /// zero shows every row.
    rows_view_limit: usize,
}

impl ComparisonStore {
    /// Open the history stored at `path`, which need not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] if the file exists but cannot be
    /// read or parsed.
    pub fn open(path: impl Into<PathBuf>, rows_view_limit: usize) -> Result<Self, StoreError> {
        let path = path.into();
        let (rows, exists) = match read_table(&path) {
            Ok(rows) => (rows, true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => (Vec::new(), false),
            Err(source) => return Err(StoreError::Persistence { path, source }),
        };

        info!(
            "Comparison history at {} ({} rows)",
            path.display(),
            rows.len()
        );

        Ok(Self {
            path,
            rows,
            exists,
            rows_view_limit,
        })
    }

    /// Location of the history file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All rows in insertion order.
    pub fn rows(&self) -> &[ComparisonRow] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The most recently appended row.
    pub fn last(&self) -> Option<&ComparisonRow> {
        self.rows.last()
    }

    /// Snapshot of the table for clients.
    pub fn list(&self) -> ComparisonsView {
        let columns = if self.exists {
            COLUMNS.iter().map(|c| c.to_string()).collect()
        } else {
            Vec::new()
        };

        let start = match self.rows_view_limit {
            0 => 0,
            limit => self.rows.len().saturating_sub(limit),
        };

        ComparisonsView {
            rows: self.rows[start..].to_vec(),
            columns,
            all_rows: self.rows.clone(),
        }
    }

    /// Append a row at the end of the history.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] if the file cannot be written; the
    /// history is unchanged in that case.
    pub fn append(&mut self, row: ComparisonRow) -> Result<(), StoreError> {
        self.rows.push(row);
        if let Err(e) = self.write(&self.rows) {
            self.rows.pop();
            return Err(e);
        }
        self.exists = true;
        Ok(())
    }

    /// Convert client-supplied indices into positions in this table.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidIndex`] for the first index that is
    /// negative or past the end.
    pub fn resolve_indices(&self, indices: &[i64]) -> Result<Vec<usize>, StoreError> {
        indices
            .iter()
            .map(|&index| {
                usize::try_from(index)
                    .ok()
                    .filter(|&i| i < self.rows.len())
                    .ok_or(StoreError::InvalidIndex {
                        index,
                        len: self.rows.len(),
                    })
            })
            .collect()
    }

    /// Replace the rows at `indices` with a single row holding their averages.
    ///
    /// The merged row takes its identity from the lowest selected index and is
    /// appended at the end of the table. Returns the merged row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidMerge`] for fewer than two indices or
    /// repeated indices, [`StoreError::InvalidIndex`] for out-of-range indices
    /// and [`StoreError::Persistence`] if the file cannot be written.
    pub fn merge(&mut self, indices: &[usize]) -> Result<ComparisonRow, StoreError> {
        if indices.len() < 2 {
            return Err(StoreError::InvalidMerge(
                "At least 2 rows required for merging".to_string(),
            ));
        }

        let selected: BTreeSet<usize> = indices.iter().copied().collect();
        if selected.len() != indices.len() {
            return Err(StoreError::InvalidMerge(
                "Each row may only be selected once for merging".to_string(),
            ));
        }
        self.check_bounds(&selected)?;

        let sources: Vec<&ComparisonRow> = selected.iter().map(|&i| &self.rows[i]).collect();
        let merged = merge_rows(&sources).ok_or_else(|| {
            StoreError::InvalidMerge("At least 2 rows required for merging".to_string())
        })?;

        let mut updated = self.without(&selected);
        updated.push(merged.clone());
        self.write(&updated)?;
        self.rows = updated;

        info!("Merged {} rows into '{}'", selected.len(), merged.source_file);
        Ok(merged)
    }

    /// Remove the rows at `indices`. Repeated indices count once.
    ///
    /// Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EmptySelection`] when `indices` is empty,
    /// [`StoreError::InvalidIndex`] if any index is out of range (nothing is
    /// removed) and [`StoreError::Persistence`] if the file cannot be written.
    pub fn delete(&mut self, indices: &[usize]) -> Result<usize, StoreError> {
        if indices.is_empty() {
            return Err(StoreError::EmptySelection);
        }

        let selected: BTreeSet<usize> = indices.iter().copied().collect();
        self.check_bounds(&selected)?;

        let updated = self.without(&selected);
        self.write(&updated)?;
        self.rows = updated;

        info!("Deleted {} rows from comparison history", selected.len());
        Ok(selected.len())
    }

    /// Remove the whole history. Clearing an empty history is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persistence`] if the file cannot be removed.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => info!("Cleared comparison history {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Comparison history already empty");
            }
            Err(source) => {
                return Err(StoreError::Persistence {
                    path: self.path.clone(),
                    source,
                })
            }
        }

        self.rows.clear();
        self.exists = false;
        Ok(())
    }

    fn check_bounds(&self, selected: &BTreeSet<usize>) -> Result<(), StoreError> {
        match selected.iter().find(|&&i| i >= self.rows.len()) {
            Some(&index) => Err(StoreError::InvalidIndex {
                index: i64::try_from(index).unwrap_or(i64::MAX),
                len: self.rows.len(),
            }),
            None => Ok(()),
        }
    }

    fn without(&self, selected: &BTreeSet<usize>) -> Vec<ComparisonRow> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(i, _)| !selected.contains(i))
            .map(|(_, row)| row.clone())
            .collect()
    }

    fn write(&self, rows: &[ComparisonRow]) -> Result<(), StoreError> {
        write_table(&self.path, rows).map_err(|source| StoreError::Persistence {
            path: self.path.clone(),
            source,
        })
    }
}

fn read_table(path: &Path) -> io::Result<Vec<ComparisonRow>> {
    // Opened separately so a missing file keeps its NotFound kind.
    let file = fs::File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut rows = Vec::new();
    for (line, record) in reader.deserialize::<StoredRow>().enumerate() {
        match record?.into_row() {
            Some(row) => rows.push(row),
            None => warn!(
                "Dropping history row {} of {}: no statistics",
                line + 1,
                path.display()
            ),
        }
    }
    Ok(rows)
}

fn write_table(path: &Path, rows: &[ComparisonRow]) -> io::Result<()> {
    write_atomically(path, |file| -> io::Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(COLUMNS)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()
    })
}

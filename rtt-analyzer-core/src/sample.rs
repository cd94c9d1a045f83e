//! Loading RTT samples from CSV captures.
//!
//! A capture is a CSV file with one RTT measurement per row. The loader picks
//! one column, converts every parseable value to milliseconds and skips (but
//! counts) rows that do not hold a usable measurement.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Column the loader looks for in a header row.
pub const DEFAULT_RTT_COLUMN: &str = "RTT";

/// Errors that make an input file unusable.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The input file does not exist.
    #[error("The file was not found at path: {}", .0.display())]
    NotFound(PathBuf),

    /// The input file exists but could not be read.
    #[error("Failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The input is not well-formed CSV.
    #[error("File '{name}' is not valid CSV: {source}")]
    Csv {
        name: String,
        #[source]
        source: csv::Error,
    },

    /// Not a single row yielded a usable measurement.
    #[error("File '{name}' contains no valid RTT data.")]
    NoValidValues { name: String },
}

/// Unit the measurements in a capture are recorded in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RttUnit {
    #[default]
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "ms")]
    Milliseconds,
    #[serde(rename = "us")]
    Microseconds,
}

impl RttUnit {
    /// Multiplier that converts a value in this unit to milliseconds.
    pub fn to_millis_factor(self) -> f64 {
        match self {
            RttUnit::Seconds => 1e3,
            RttUnit::Milliseconds => 1.0,
            RttUnit::Microseconds => 1e-3,
        }
    }
}

impl fmt::Display for RttUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self {
            RttUnit::Seconds => "s",
            RttUnit::Milliseconds => "ms",
            RttUnit::Microseconds => "us",
        };
        f.write_str(unit)
    }
}

impl FromStr for RttUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s" | "sec" | "seconds" => Ok(RttUnit::Seconds),
            "ms" | "millis" | "milliseconds" => Ok(RttUnit::Milliseconds),
            "us" | "micros" | "microseconds" => Ok(RttUnit::Microseconds),
            other => Err(format!("unknown RTT unit '{other}' (expected s, ms or us)")),
        }
    }
}

/// Measurements parsed from one capture, in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Parsed values in file order. Never empty.
    pub values: Vec<f64>,
    /// Rows that were skipped because the selected cell was missing, not a
    /// number, negative or not finite.
    pub skipped_rows: usize,
}

impl Sample {
    /// Number of measurements.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the sample has no values. Never true for a loaded sample.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Reads RTT captures from CSV.
///
/// The first record decides the layout. If one of its cells matches the
/// configured column name (ignoring ASCII case) it is a header and that column
/// is read. Otherwise the first column is read, and the first record is treated
/// as a header only when its first cell is not numeric.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleLoader {
    column: String,
    unit: RttUnit,
}

impl Default for SampleLoader {
    fn default() -> Self {
        Self::new(DEFAULT_RTT_COLUMN, RttUnit::default())
    }
}

impl SampleLoader {
    /// Create a loader that reads `column` and interprets values in `unit`.
    pub fn new(column: impl Into<String>, unit: RttUnit) -> Self {
        Self {
            column: column.into(),
            unit,
        }
    }

    /// Name of the column looked up in a header row.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Unit the raw values are interpreted in.
    pub fn unit(&self) -> RttUnit {
        self.unit
    }

    /// Load a capture from disk.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::NotFound`] if the file does not exist, and the
    /// other [`FormatError`] variants if it cannot be read, is not CSV, or has
    /// no usable measurement.
    pub fn load(&self, path: &Path) -> Result<Sample, FormatError> {
        let file = File::open(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => FormatError::NotFound(path.to_path_buf()),
            _ => FormatError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        self.read(&name, file)
    }

    /// Parse a capture from any reader. `name` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::Csv`] for malformed input and
    /// [`FormatError::NoValidValues`] when no row holds a usable measurement.
    pub fn read<R: Read>(&self, name: &str, reader: R) -> Result<Sample, FormatError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut column = 0;
        let mut values = Vec::new();
        let mut skipped_rows = 0;

        for (row, record) in csv_reader.records().enumerate() {
            let record = record.map_err(|source| FormatError::Csv {
                name: name.to_string(),
                source,
            })?;

            if row == 0 {
                if let Some(idx) = record
                    .iter()
                    .position(|cell| cell.eq_ignore_ascii_case(&self.column))
                {
                    column = idx;
                    continue;
                }
                if record.get(0).is_some_and(|cell| cell.parse::<f64>().is_err()) {
                    continue;
                }
            }

            match record.get(column).and_then(|cell| self.parse_cell(cell)) {
                Some(value) => values.push(value),
                None => skipped_rows += 1,
            }
        }

        if values.is_empty() {
            return Err(FormatError::NoValidValues {
                name: name.to_string(),
            });
        }

        Ok(Sample {
            values,
            skipped_rows,
        })
    }

    fn parse_cell(&self, cell: &str) -> Option<f64> {
        let raw: f64 = cell.parse().ok()?;
        let millis = raw * self.unit.to_millis_factor();
        if !millis.is_finite() || millis < 0.0 {
            return None;
        }
        Some(millis)
    }
}

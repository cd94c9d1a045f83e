//! Settings loading for rtt-analyzer.
//!
//! Supports loading settings from TOML files, with sensible defaults
//! for all settings.

use anyhow::{Context, Result};
use rtt_analyzer_core::sample::{RttUnit, SampleLoader, DEFAULT_RTT_COLUMN};
use rtt_analyzer_service::{ServiceOptions, DEFAULT_ROWS_VIEW_LIMIT};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

/// Top-level settings for rtt-analyzer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where the service listens.
    pub server: ServerConfig,
    /// Where the service keeps its files.
    pub storage: StorageConfig,
    /// How captures are read.
    pub input: InputConfig,
    /// History presentation.
    pub history: HistoryConfig,
    /// How the CLI reaches the service.
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for `comparisons.csv` and `config.json`. Defaults to
    /// `%APPDATA%/RTT_Analyzer` on Windows and `~/.rtt_analyzer` elsewhere.
    pub data_dir: Option<PathBuf>,
    /// Overrides the history location inside `data_dir`.
    pub comparisons_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Column holding the RTT values.
    pub rtt_column: String,
    /// Unit the values are recorded in.
    pub unit: RttUnit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Rows in the short history view; 0 shows all.
    pub rows_view_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the service.
    pub url: String,
    /// Timeout in milliseconds for each request.
    pub timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8000,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            rtt_column: DEFAULT_RTT_COLUMN.to_string(),
            unit: RttUnit::Seconds,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            rows_view_limit: DEFAULT_ROWS_VIEW_LIMIT,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8000".to_string(),
            timeout_ms: 30_000, // 30 seconds
        }
    }
}

/// Default settings file name.
pub const DEFAULT_SETTINGS_FILE: &str = ".rtt-analyzer.toml";

impl Settings {
    /// Load settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Settings> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;

        Ok(settings)
    }

    /// Load settings from the default file (`.rtt-analyzer.toml`) or use defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file exists but cannot be parsed.
    pub fn load_or_default() -> Result<Settings> {
        let path = Path::new(DEFAULT_SETTINGS_FILE);

        if path.exists() {
            Self::load(path)
        } else {
            Ok(Settings::default())
        }
    }

    /// Load settings from the specified path, or try the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the specified file cannot be read or parsed.
    pub fn load_from(path: Option<&Path>) -> Result<Settings> {
        match path {
            Some(p) => Self::load(p),
            None => Self::load_or_default(),
        }
    }

    /// Address the service binds to.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.bind, self.server.port)
    }

    /// Directory holding the service's files.
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(default_data_dir)
    }

    /// Everything the service needs to start, derived from these settings.
    pub fn service_options(&self) -> ServiceOptions {
        let mut options = ServiceOptions::in_data_dir(&self.data_dir());
        if let Some(file) = &self.storage.comparisons_file {
            options.comparisons_file = file.clone();
        }
        options.rows_view_limit = self.history.rows_view_limit;
        options.loader = SampleLoader::new(&self.input.rtt_column, self.input.unit);
        options
    }
}

/// Per-user data directory.
fn default_data_dir() -> PathBuf {
    if let Some(appdata) = std::env::var_os("APPDATA") {
        return PathBuf::from(appdata).join("RTT_Analyzer");
    }
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".rtt_analyzer")
}

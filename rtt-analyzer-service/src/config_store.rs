//! Persisted user directories.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rtt_analyzer_core::protocol::{Config, SaveConfigRequest};
use thiserror::Error;
use tracing::info;

use crate::persist::write_atomically;

/// Errors returned by [`ConfigStore`].
#[derive(Debug, Error)]
pub enum ConfigStoreError {
    #[error("Failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write config file '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Saved input and output directories, cached in memory.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    config: Config,
}

impl ConfigStore {
    /// Load the config at `path`, or start from defaults if it does not exist.
    ///
    /// `comparisons_file` is the history location reported back to clients.
    pub fn open(
        path: impl Into<PathBuf>,
        comparisons_file: impl Into<String>,
    ) -> Result<Self, ConfigStoreError> {
        let path = path.into();
        let mut config = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str::<Config>(&content).map_err(|source| {
                ConfigStoreError::Parse {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Config::default(),
            Err(source) => return Err(ConfigStoreError::Read { path, source }),
        };
        config.comparisons_file = comparisons_file.into();

        Ok(Self { path, config })
    }

    /// Location of the config file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current configuration.
    pub fn get(&self) -> &Config {
        &self.config
    }

    /// Persist new directories. The cache changes only once the file is written.
    pub fn save(&mut self, request: SaveConfigRequest) -> Result<(), ConfigStoreError> {
        let updated = Config {
            input_dir: request.input_dir,
            output_base_dir: request.output_base_dir,
            comparisons_file: self.config.comparisons_file.clone(),
        };

        let write = |file: &mut fs::File| -> io::Result<()> {
            serde_json::to_writer_pretty(&mut *file, &updated)?;
            file.write_all(b"\n")
        };
        write_atomically(&self.path, write).map_err(|source| ConfigStoreError::Write {
            path: self.path.clone(),
            source,
        })?;

        info!("Saved config to {}", self.path.display());
        self.config = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_missing() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::open(dir.path().join("config.json"), "/data/c.csv").unwrap();

        assert_eq!(store.get().input_dir, "");
        assert_eq!(store.get().output_base_dir, "");
        assert_eq!(store.get().comparisons_file, "/data/c.csv");
    }

    #[test]
    fn test_save_then_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut store = ConfigStore::open(&path, "/data/c.csv").unwrap();
        store
            .save(SaveConfigRequest {
                input_dir: "/captures".to_string(),
                output_base_dir: "/results".to_string(),
            })
            .unwrap();
        assert_eq!(store.get().input_dir, "/captures");

        let reopened = ConfigStore::open(&path, "/other/c.csv").unwrap();
        assert_eq!(reopened.get().input_dir, "/captures");
        assert_eq!(reopened.get().output_base_dir, "/results");
        // Always the service's own location, not the stored one.
        assert_eq!(reopened.get().comparisons_file, "/other/c.csv");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"input_dir": "/in"}"#).unwrap();

        let store = ConfigStore::open(&path, "c.csv").unwrap();
        assert_eq!(store.get().input_dir, "/in");
        assert_eq!(store.get().output_base_dir, "");
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();

        let result = ConfigStore::open(&path, "c.csv");
        assert!(matches!(result, Err(ConfigStoreError::Parse { .. })));
    }
}

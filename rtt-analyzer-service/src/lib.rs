//! Local HTTP service for rtt-analyzer.
//!
//! The service analyzes RTT captures on request and keeps the comparison
//! history between runs. Clients (the desktop UI or the `rtt-analyzer` CLI)
//! only talk to it over HTTP.

mod analysis;
mod config_store;
mod error;
mod persist;
mod server;
mod store;

pub use analysis::{AnalysisError, AnalysisStage, Analyzer, TIMESTAMP_FORMAT};
pub use config_store::{ConfigStore, ConfigStoreError};
pub use error::ApiError;
pub use server::{serve, serve_with_listener, ServiceOptions, DEFAULT_ROWS_VIEW_LIMIT};
pub use store::{ComparisonStore, StoreError};

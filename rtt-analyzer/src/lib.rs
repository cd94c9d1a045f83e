//! rtt-analyzer: RTT latency analysis with a persistent comparison history
//!
//! This library provides the command-line front end of the RTT analyzer: the
//! settings file, the argument parser and an HTTP client for the service.

pub mod cli;
pub mod client;
pub mod config;

// Re-export core types for convenience
pub use rtt_analyzer_core::protocol;
pub use rtt_analyzer_core::report::{ReportError, Reporter, TerminalReporter};
pub use rtt_analyzer_service::{serve, serve_with_listener, ServiceOptions};

// Re-export main types from this crate
pub use cli::{Cli, Command};
pub use client::{wait_for_health, ClientError, ServiceClient};
pub use config::Settings;

//! Command-line interface for rtt-analyzer.

use crate::config::Settings;
use clap::{Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "rtt-analyzer")]
#[command(about = "Analyze RTT latency captures and track their history across runs")]
#[command(version)]
pub struct Cli {
    /// Path to settings file (defaults to .rtt-analyzer.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the analysis service
    Serve {
        /// Address to bind
        #[arg(long)]
        bind: Option<IpAddr>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// Directory for the comparison history and saved config
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Analyze capture files through a running service
    Analyze {
        /// CSV captures to analyze, in order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Directory under which results directories are created
        #[arg(long)]
        output_dir: Option<String>,

        /// Service URL
        #[arg(long)]
        url: Option<String>,
    },

    /// Show the comparison history
    History {
        /// Show every row instead of the most recent ones
        #[arg(long)]
        all: bool,

        /// Service URL
        #[arg(long)]
        url: Option<String>,
    },

    /// Merge history rows into one averaged row
    Merge {
        /// Row indices as shown by `history`
        #[arg(required = true, num_args = 2.., allow_negative_numbers = true)]
        indices: Vec<i64>,

        /// Service URL
        #[arg(long)]
        url: Option<String>,
    },

    /// Delete history rows
    Delete {
        /// Row indices as shown by `history`
        #[arg(required = true, allow_negative_numbers = true)]
        indices: Vec<i64>,

        /// Service URL
        #[arg(long)]
        url: Option<String>,
    },

    /// Remove the whole comparison history
    Clear {
        /// Service URL
        #[arg(long)]
        url: Option<String>,
    },
}

impl Cli {
    /// Apply CLI overrides to the settings.
    ///
    /// CLI arguments take precedence over settings file values.
    /// Only non-None optional values will override the settings.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        match &self.command {
            Command::Serve {
                bind,
                port,
                data_dir,
            } => {
                if let Some(bind) = bind {
                    settings.server.bind = *bind;
                }
                if let Some(port) = port {
                    settings.server.port = *port;
                }
                if let Some(data_dir) = data_dir {
                    settings.storage.data_dir = Some(data_dir.clone());
                }
            }
            Command::Analyze { url, .. }
            | Command::History { url, .. }
            | Command::Merge { url, .. }
            | Command::Delete { url, .. }
            | Command::Clear { url } => {
                if let Some(url) = url {
                    settings.client.url = url.clone();
                }
            }
        }
    }
}

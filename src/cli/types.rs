//! CLI type definitions
//!
//! Clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mender")]
#[command(about = "Mender - Autonomous CI repair agent", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (run-agent endpoint plus SSE streaming)
    Serve {
        /// Override the configured listen port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one fix-and-verify job to completion and print the result
    Run {
        /// Repository URL to repair (positional argument)
        repository_url: String,

        /// Team name used to derive the fix branch
        #[arg(short, long)]
        team: String,

        /// Leader name used to derive the fix branch
        #[arg(short, long)]
        leader: String,

        /// Retry budget (clamped to 1..=10)
        #[arg(short, long)]
        retries: Option<u32>,
    },
}

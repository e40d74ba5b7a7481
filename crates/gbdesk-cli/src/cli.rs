//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Data directory for the message store
    #[arg(short, long)]
    pub data_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bridge until interrupted
    Serve {
        /// Advertise under this name instead of the configured one
        #[arg(short, long)]
        name: Option<String>,
        /// Keep messages in memory only
        #[arg(long)]
        in_memory: bool,
    },
    /// Print the most recent stored messages
    Messages {
        /// Number of messages to print
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Print the effective configuration as TOML
    Config,
}

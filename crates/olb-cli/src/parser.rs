//! Root CLI structure with global options.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Supervise local Office tool-servers and expose them over HTTP.
#[derive(Parser)]
#[command(name = "olb")]
#[command(about = "Office local bridge: supervise and dispatch to local tool-servers")]
#[command(version)]
pub struct Cli {
    /// Override the config directory for this invocation
    #[arg(long = "config-dir", global = true, env = "OLB_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

//! Available subcommands.

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Start the bridge: auto-start servers and serve the HTTP control surface
    Serve {
        /// Address to bind (defaults to the `host` setting)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (defaults to the `port` setting)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List configured tool-servers
    Servers,

    /// Validate settings and every stored server config
    Check,

    /// Show resolved config paths
    Paths,
}

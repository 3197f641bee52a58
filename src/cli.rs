//! CLI definitions for relayhub.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// relayhub CLI.
#[derive(Parser)]
#[command(name = "relayhub")]
#[command(about = "WebSocket message relay server")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/relayhub.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the relay server in foreground (default)
    Serve {
        /// Server id, overrides `server.id`
        #[arg(short = 'i', long)]
        server_id: Option<String>,

        /// Listen address as host:port, overrides `server.host` and `server.port`
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Validate the configuration and print the effective settings
    CheckConfig,
}

//! relayhub - WebSocket message relay server
//!
//! Main entry point for the relayhub CLI and server.

mod cli;
mod server;

use clap::Parser;
use tracing::{error, warn};

use relayhub_config::{ConfigLoader, ConfigValidator};

use cli::{Cli, Commands};
use server::{check_config, init_tracing, run_server, server_options};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = ConfigLoader::load_or_default(&cli.config)?;

    match cli.command {
        Some(Commands::CheckConfig) => {
            if !check_config(&config)? {
                std::process::exit(1);
            }
            Ok(())
        }
        command => {
            let (server_id, listen) = match command {
                Some(Commands::Serve { server_id, listen }) => (server_id, listen),
                _ => (None, None),
            };

            init_tracing(&config.logging)?;

            let validation = ConfigValidator::validate(&config);
            for warning in &validation.warnings {
                warn!("Config {}: {}", warning.path, warning.message);
            }
            if !validation.is_valid() {
                for e in &validation.errors {
                    error!("Config {}: {}", e.path, e.message);
                }
                std::process::exit(1);
            }

            let options = server_options(&config, server_id, listen);
            if let Err(e) = run_server(options).await {
                error!("Fatal: {}", e);
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

//! Server initialization and startup logic for relayhub.

use std::path::PathBuf;

use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use relayhub_config::{Config, ConfigLoader, ConfigValidator, LoggingConfig};
use relayhub_core::{ServerCore, ServerOptions};

/// Initialize tracing with console and file output.
///
/// Log files are written to `logging.dir` with daily rotation. `RUST_LOG`
/// overrides the configured level.
pub(crate) fn init_tracing(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = PathBuf::from(ConfigLoader::expand_path(&logging.dir));
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(&logging.file_prefix)
        .filename_suffix(&logging.file_suffix)
        .max_log_files(logging.max_files)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The worker flushes on drop, so the guard lives for the whole process.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .try_init()?;

    Ok(())
}

/// Apply command line overrides on top of the loaded configuration.
pub(crate) fn server_options(
    config: &Config,
    server_id: Option<String>,
    listen: Option<String>,
) -> ServerOptions {
    let mut options = ServerOptions::from(&config.server);
    if let Some(id) = server_id {
        options.id = id;
    }
    if let Some(listen) = listen {
        options.listen = listen;
    }
    options
}

/// Run the relay server in foreground until Ctrl-C or SIGTERM.
pub(crate) async fn run_server(options: ServerOptions) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting relayhub v{}", env!("CARGO_PKG_VERSION"));

    let core = ServerCore::new(options);
    let listener = core.bind().await?;

    let server = tokio::spawn({
        let core = core.clone();
        async move { core.serve(listener).await }
    });

    wait_for_signal().await;
    let closed = core.shutdown().await;
    info!(closed, "Shutdown complete");

    server.await??;
    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C"),
                    _ = terminate.recv() => info!("Received SIGTERM"),
                }
                return;
            }
            Err(e) => warn!("Failed to install SIGTERM handler: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
    }
    info!("Received Ctrl-C");
}

/// Validate the configuration and print the outcome.
///
/// Returns whether the configuration is usable.
pub(crate) fn check_config(config: &Config) -> Result<bool, Box<dyn std::error::Error>> {
    let result = ConfigValidator::validate(config);

    println!("{}", toml::to_string_pretty(config)?);
    for warning in &result.warnings {
        println!("warning: {}: {}", warning.path, warning.message);
    }
    for error in &result.errors {
        println!("error: {}: {}", error.path, error.message);
    }

    if result.is_valid() {
        println!("Configuration OK");
    }
    Ok(result.is_valid())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_options_without_overrides() {
        let config = Config::default();
        let options = server_options(&config, None, None);
        assert_eq!(options.id, "demo");
        assert_eq!(options.listen, "0.0.0.0:8088");
    }

    #[test]
    fn test_server_options_with_overrides() {
        let config = Config::default();
        let options = server_options(
            &config,
            Some("edge-7".to_string()),
            Some("127.0.0.1:9999".to_string()),
        );
        assert_eq!(options.id, "edge-7");
        assert_eq!(options.listen, "127.0.0.1:9999");
        assert_eq!(options.read_timeout, config.server.read_timeout());
    }

    #[test]
    fn test_check_config_defaults_are_valid() {
        assert!(check_config(&Config::default()).unwrap());
    }

    #[test]
    fn test_check_config_reports_invalid() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(!check_config(&config).unwrap());
    }
}

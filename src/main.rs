//! Vigil: liveness server and background worker supervisor.
//!
//! This is the application entry point. It initializes tracing, loads
//! configuration from TOML, and runs one of the two components:
//! `serve` starts the HTTP liveness server, `supervise` launches the worker
//! and idles until signalled.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vigil::config::{AppConfig, LoggingConfig, DEFAULT_LOG_FILTER};
use vigil::http::{shutdown_signal, start_server};
use vigil::routes::create_router;
use vigil::state::AppState;
use vigil::supervisor::Supervisor;

/// Vigil: keeps a background bot worker alive behind a liveness server
#[derive(Parser, Debug)]
#[command(name = "vigil", version, about)]
struct Args {
    /// Path to configuration file (default: config/default.toml if present)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log level filter (e.g., "vigil=debug,tower_http=info")
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP liveness server (the platform-managed foreground process)
    Serve,
    /// Launch the worker in the background and idle forever
    Supervise,
}

fn init_tracing(log_filter: &str, logging: &LoggingConfig) {
    // Diagnostics go to stderr; stdout is reserved for the supervisor's confirmation line
    let registry =
        tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(log_filter));

    if logging.is_json() {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Configuration is loaded first since it selects the log format
    let config = AppConfig::resolve(args.config.as_deref())?;

    // Initialize tracing with priority: CLI > env > default
    let log_filter = args
        .log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    init_tracing(&log_filter, &config.logging);

    tracing::info!(command = ?args.command, "Loaded configuration");

    match args.command {
        Command::Serve => {
            let http = config.http.clone();
            let app = create_router(AppState::new(config));
            start_server(app, &http).await?;
        }
        Command::Supervise => {
            tracing::info!(
                command = %config.worker.command_line(),
                log_file = %config.worker.log_file.display(),
                heartbeat = config.worker.heartbeat_file.is_some(),
                "Supervising worker"
            );
            Supervisor::new(&config).run(shutdown_signal()).await?;
        }
    }

    Ok(())
}

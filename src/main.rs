use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use questgate::config::{LoggingConfig, QuestgateConfig};
use questgate::http::ReqwestClient;
use questgate::resources::ResourceSync;

#[derive(Parser)]
#[command(name = "questgate", version, about)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download missing or outdated resource files
    SyncResources,
    /// Print the effective configuration as YAML
    ShowConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = QuestgateConfig::load(cli.config.as_deref())?;

    init_tracing(&config.logging);

    match cli.command {
        Command::ShowConfig => {
            print!("{}", config.to_yaml()?);
        }
        Command::SyncResources => {
            info!("Questgate {}", env!("CARGO_PKG_VERSION"));

            let http = Arc::new(ReqwestClient::new(&config.http)?);
            let sync = ResourceSync::new(http, config.resources.clone());

            tokio::select! {
                report = sync.check_resources() => {
                    if !report.is_complete() {
                        warn!(
                            failed = report.failed.len(),
                            manifest_failed = report.manifest_failed,
                            "Some resources are still missing"
                        );
                    }
                }
                _ = shutdown_signal() => {
                    info!("Resource sync interrupted");
                }
            }
        }
    }

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping");
        }
        _ = terminate => {
            info!("Received SIGTERM, stopping");
        }
    }
}

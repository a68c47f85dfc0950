//! Enterprise Integration Hub entry point

use clap::{Parser, Subcommand};
use integration_hub::engine::RefreshEngine;
use integration_hub::handler::{create_router, AppState};
use integration_hub::{CollaboratorClient, HubConfig, HubMetricsRegistry};
use integration_hub_core::{IntegrationHub, IntegrationStatus, StoreConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "integration-hub")]
#[command(about = "Enterprise Integration Hub - collaborator health and workflow dashboard")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the dashboard server and the background refresh loop
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080", env = "PORT")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0", env = "HOST")]
        host: String,
    },

    /// Bootstrap and poll every collaborator once, then print the metrics
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let cli = Cli::parse();
    let config = HubConfig::from_env();

    let hub = Arc::new(IntegrationHub::new(StoreConfig::default()));
    let client = Arc::new(CollaboratorClient::new(config)?);
    let metrics = Arc::new(HubMetricsRegistry::new()?);

    match cli.command {
        Commands::Serve { port, host } => {
            let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
            let listener = tokio::net::TcpListener::bind(addr).await?;

            let engine = Arc::new(RefreshEngine::new(
                Arc::clone(&hub),
                Arc::clone(&client),
                Arc::clone(&metrics),
            ));
            let state = Arc::new(AppState::with_engine(
                hub,
                client,
                metrics,
                Arc::clone(&engine),
            ));
            let router = create_router(Arc::clone(&state));

            let report = engine.initialize().await;
            tracing::info!(
                connected = report.connected,
                total = report.total,
                "Integrations initialized"
            );

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let refresh = tokio::spawn(engine.run(shutdown_rx));

            tracing::info!("Starting Enterprise Integration Hub on {}", addr);

            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!(error = %e, "Failed to listen for shutdown signal");
                    }
                })
                .await;

            // Stop the refresh loop on every exit path, then release the
            // shared client with the last state reference.
            let _ = shutdown_tx.send(true);
            if let Err(e) = refresh.await {
                tracing::error!(error = %e, "Refresh task failed");
            }
            drop(state);

            served?;
            tracing::info!("Enterprise Integration Hub stopped");
        }

        Commands::Check => {
            let engine = RefreshEngine::new(Arc::clone(&hub), client, metrics);
            let report = engine.initialize().await;

            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "connected": report.connected,
                    "total": report.total,
                    "integrations": hub.registry().list_all(),
                }))?
            );

            if report
                .statuses
                .values()
                .any(|status| *status == IntegrationStatus::Error)
            {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

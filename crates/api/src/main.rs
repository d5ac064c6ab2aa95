use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use geohub_core::scripting::ScriptCatalog;
use geohub_events::{EventBus, WebhookNotifier};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use geohub_api::config::ServerConfig;
use geohub_api::jobs::JobRegistry;
use geohub_api::router::build_app_router;
use geohub_api::state::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "geohub_api=debug,geohub_events=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        scripts_dir = %config.scripts_dir.display(),
        "Loaded server configuration",
    );

    // --- Scripts ---
    let catalog = Arc::new(ScriptCatalog::new(
        config.scripts_dir.clone(),
        config.python_bin.clone(),
    ));

    // --- Event bus & callbacks ---
    let event_bus = Arc::new(EventBus::default());
    let notifier = Arc::new(WebhookNotifier::new(config.callback_timeout())?);

    // --- Job registry ---
    let registry = Arc::new(
        JobRegistry::new(Arc::clone(&catalog), notifier, event_bus)
            .with_log_batch_size(config.log_batch_size),
    );

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        registry: Arc::clone(&registry),
        catalog,
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(config.host.parse()?, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // --- Post-shutdown cleanup ---
    registry.clear();
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use linkify::app::Services;
use linkify::config::Config;
use linkify::server::create_router;

#[derive(Parser)]
#[command(name = "linkify")]
#[command(about = "Country aware link redirection service", long_about = None)]
struct Cli {
    /// Settings file (TOML, JSON or YAML)
    #[arg(long, env = "LINKIFY_SETTINGS")]
    settings: Option<PathBuf>,
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // JSON lines for log collectors, plain text otherwise
    if std::env::var_os("LINKIFY_JSON_LOGS").is_some() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    warn!("Terminating the service now...");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Invalid settings are fatal, nothing is served
    let config = Config::load(cli.settings.as_deref()).context("failed to load settings")?;
    init_tracing(config.server.debug);
    info!("PID {}", std::process::id());

    let services = Services::start(config).await?;
    let reloader = services.loader.spawn_reloader();
    if reloader.is_some() {
        info!("Hot reload of link files enabled");
    }

    let router = create_router(services.app_state());

    let addr = format!(
        "{}:{}",
        services.config.server.host, services.config.server.port
    );
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("🚀 Listening on http://{}", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some(reloader) = reloader {
        reloader.abort();
    }
    let closed = services.loader.close_watchers().await;
    info!(watchers = closed, "Shutdown complete");

    Ok(())
}

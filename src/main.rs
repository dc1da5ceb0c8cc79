use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use artilink::config::Config;
use artilink::AppState;

#[derive(Parser, Debug)]
#[command(name = "artilink")]
#[command(author, version, about = "Durable download links for GitHub Actions artifacts", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "artilink.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;

    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Artilink v{}", env!("CARGO_PKG_VERSION"));

    std::fs::create_dir_all(&config.server.data_dir)?;
    let db = artilink::db::init(&config.server.data_dir).await?;

    let state = Arc::new(AppState::new(config.clone(), db));

    // Populate the installation directory in the background. Requests that
    // arrive before it finishes get a 503 instead of a false miss.
    {
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = state
                .directory
                .bootstrap(state.authority.as_ref(), state.github.as_ref())
                .await
            {
                tracing::error!(error = %e, "installation directory bootstrap failed");
            }
        });
    }

    let app = artilink::api::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

//! hepascreen: liver-disease screening web service.
//!
//! Main entry point: logging, configuration, model load, HTTP server.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hepascreen::adapters::model::LogisticModel;
use hepascreen::adapters::sanitize::SanitizingMakeWriter;
use hepascreen::adapters::sqlite::SqliteStore;
use hepascreen::application::{AccountService, ScreeningService, SessionManager};
use hepascreen::web::{router, AppState};
use hepascreen::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Log destination:
    // - stdout (default)
    // - file: HEPASCREEN_LOG_FILE, appended
    let log_mode = std::env::var("HEPASCREEN_LOG_MODE").unwrap_or_else(|_| "stdout".to_string());

    let (writer, _guard) = if log_mode == "file" {
        let log_file = std::env::var("HEPASCREEN_LOG_FILE")
            .unwrap_or_else(|_| "hepascreen.log".to_string());

        if let Some(parent) = std::path::Path::new(&log_file).parent() {
            // Best-effort: don't fail startup just because the directory is missing.
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .with_context(|| format!("Failed to open log file {log_file}"))?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stdout())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
        .init();

    tracing::info!("Starting hepascreen...");

    let config = Config::from_env().context("Invalid configuration")?;
    let store = Arc::new(SqliteStore::in_memory().context("Failed to open in-memory store")?);

    // A bad artifact degrades screening; every other route keeps serving.
    let screening = match LogisticModel::load(&config.model_path, &config.model) {
        Ok(model) => ScreeningService::new(Arc::new(model), Arc::clone(&store)),
        Err(e) => {
            tracing::error!(
                "Failed to load model from {:?}: {}. Predictions are disabled.",
                config.model_path,
                e
            );
            ScreeningService::degraded(Arc::clone(&store), e.to_string())
        }
    };

    let state = Arc::new(AppState {
        accounts: AccountService::new(Arc::clone(&store), config.admin.clone()),
        screening,
        sessions: SessionManager::new(),
    });

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("hepascreen shutdown complete.");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

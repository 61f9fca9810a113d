mod routes;

use std::sync::Arc;

use anyhow::{Context, Result};
use decipher::{logging, Config, GeminiClient, Session};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::routes::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load();
    let _log_guard = logging::init_tracing(&config.logging);
    info!(api = ?config.api, server = ?config.server, "Starting Image Text Decipher");

    if config.api.key.is_empty() {
        warn!("No API key configured; every analysis will fail until GEMINI_API_KEY is set");
    }

    let spool_dir = match &config.server.spool_dir {
        Some(dir) => {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating spool directory {}", dir.display()))?;
            Some(Arc::new(dir.clone()))
        }
        None => None,
    };

    let state = AppState {
        session: Session::new(Arc::new(GeminiClient::new(&config.api))),
        spool_dir,
    };
    let app = routes::router(state, config.server.max_upload_bytes);

    let listener = TcpListener::bind(config.server.bind)
        .await
        .with_context(|| format!("binding {}", config.server.bind))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

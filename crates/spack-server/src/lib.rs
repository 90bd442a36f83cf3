//! Development server for spack.
//!
//! Serves the latest template-merged document of every entry and pushes a
//! reload signal to connected pages when an entry is rebuilt:
//! - `GET /` lists the configured entries
//! - `GET /<entry>` serves the entry page with the live-reload client appended
//! - `/api/...` answers a JSON 404
//! - any request asking for a WebSocket upgrade joins the live-reload channel
//!
//! The WebSocket side is a deliberately small subset (single unfragmented
//! frames under 126 bytes) implemented directly on the upgraded connection.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use spack_server::{ArtifactStore, ServerConfig, run_server};
//!
//! let store = Arc::new(ArtifactStore::new(vec!["home".to_owned()]));
//! store.update(output.artifacts);
//! run_server(ServerConfig::default(), store).await?;
//! ```

mod app;
mod error;
mod handlers;
mod live_reload;
mod middleware;
mod state;
mod store;

use std::sync::Arc;

pub use error::ServerError;
pub use live_reload::FrameError;
pub use store::ArtifactStore;

use state::AppState;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to (also used by the injected client script).
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 9081,
        }
    }
}

/// Run the server until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or serving fails.
pub async fn run_server(config: ServerConfig, store: Arc<ArtifactStore>) -> Result<(), ServerError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;

    let state = Arc::new(AppState {
        store,
        host: config.host,
        port: config.port,
    });
    let app = app::create_router(state);

    tracing::info!(address = %addr, "Starting server");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}

//! HTTP front for the recipe webhook.
//!
//! Validates wizard requests, forwards them upstream with retries, and maps
//! failures to a JSON error envelope.

use anyhow::Context;
use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

pub mod error;
pub mod forward;
pub mod routes;

pub use error::{ErrorEnvelope, ProxyError};
pub use forward::{Forwarder, Unconfigured, WebhookForwarder};
use routes::{AppState, create_recipe, health};

pub fn router(forwarder: Arc<dyn Forwarder>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/api/create-recipe", post(create_recipe))
        .route("/api/recipe-wizard", post(create_recipe))
        .route("/api/health", get(health))
        .layer(cors)
        .with_state(AppState { forwarder })
}

/// Bind `address` and serve until Ctrl+C or SIGTERM.
pub async fn serve(address: &str, forwarder: Arc<dyn Forwarder>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    let local = listener.local_addr().context("listener has no address")?;
    info!(%local, "essence proxy listening");

    axum::serve(listener, router(forwarder))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server terminated with error")?;

    info!("essence proxy stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

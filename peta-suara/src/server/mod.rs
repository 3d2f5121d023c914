//! Serveur HTTP des cartes

pub mod error;
pub mod routes;
pub mod state;

use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use error::AppError;
pub use state::{AppState, SharedState};

use routes::{
    contest_geo_data_handler, desa_handler, geo_data_handler, health_handler, kecamatan_handler,
};

/// Routes de l'API
pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/geo-data", get(geo_data_handler))
        .route("/api/wilayah/kecamatan", get(kecamatan_handler))
        .route("/api/wilayah/desa", get(desa_handler))
        .route("/api/:mode/geo-data", get(contest_geo_data_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Écoute sur `bind` jusqu'à Ctrl+C ou SIGTERM
pub async fn serve(state: SharedState, bind: &str) -> Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .context(format!("Failed to bind {}", bind))?;
    info!(address = bind, schema = %state.schema, "Server running");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!(%e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(%e, "Failed to install signal handler");
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
}

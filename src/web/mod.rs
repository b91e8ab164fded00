pub mod error;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    auth::{HttpIdentityVerifier, IdentityVerifier},
    config::Config,
    error::Result,
    import::Importer,
    storage::{RecordStore, SqliteStore},
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub importer: Arc<Importer>,
    pub store: Arc<dyn RecordStore>,
    pub verifier: Arc<dyn IdentityVerifier>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RecordStore>,
        verifier: Arc<dyn IdentityVerifier>,
        batch_size: usize,
    ) -> Self {
        Self {
            importer: Arc::new(Importer::new(store.clone(), batch_size)),
            store,
            verifier,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/import",
            post(handlers::import_records)
                .options(handlers::preflight)
                .fallback(handlers::method_not_allowed),
        )
        .route(
            "/certifications/expiring",
            get(handlers::expiring_certifications)
                .options(handlers::preflight)
                .fallback(handlers::method_not_allowed),
        )
        .route("/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server until Ctrl-C.
pub async fn serve(config: &Config) -> Result<()> {
    let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::new(&config.database.path)?);
    let verifier: Arc<dyn IdentityVerifier> = Arc::new(HttpIdentityVerifier::new(&config.auth)?);
    let state = AppState::new(store, verifier, config.import.batch_size);

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, database = %config.database.path, "Import service listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Import service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}

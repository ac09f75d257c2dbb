//! Gateway server setup
//!
//! Routes, state construction and the listener.

mod auth;
mod error;
mod handler;
mod state;

pub use auth::{authenticate, AuthUser};
pub use error::{ErrorBody, GatewayError};
pub use handler::{gateway_handler, ConnectParams};
pub use state::GatewayState;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chat_common::{AppConfig, AppError};
use chat_core::{UserDirectory, UserId};
use chat_db::{InMemoryUserDirectory, PgUserDirectory, PoolSettings};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Create the gateway router
pub fn create_router() -> Router<GatewayState> {
    Router::new()
        .route("/ws", get(gateway_handler))
        .route("/health", get(health_check))
        .route("/presence/:user_id", get(presence_handler))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceResponse {
    pub user_id: UserId,
    pub online: bool,
}

/// Whether a user currently has a live session
async fn presence_handler(
    State(state): State<GatewayState>,
    _auth: AuthUser,
    Path(user_id): Path<String>,
) -> Json<PresenceResponse> {
    let user_id = UserId::new(user_id);
    let online = state.publisher().is_online(&user_id);
    Json(PresenceResponse { user_id, online })
}

/// Build the complete application
pub fn create_app(state: GatewayState) -> Router {
    create_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Pick the user directory and build `GatewayState`
///
/// Without `DATABASE_URL` the gateway runs on an in-memory directory.
pub async fn create_gateway_state(config: AppConfig) -> Result<GatewayState, GatewayError> {
    let directory: Arc<dyn UserDirectory> = match &config.database {
        Some(database) => {
            tracing::info!("Connecting to PostgreSQL...");
            let pool = chat_db::create_pool(&PoolSettings::from(database))
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            chat_db::run_migrations(&pool)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            tracing::info!("PostgreSQL connection established");
            Arc::new(PgUserDirectory::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory user directory");
            Arc::new(InMemoryUserDirectory::new())
        }
    };

    Ok(GatewayState::new(config, directory))
}

/// Serve `app` on an already bound listener
pub async fn run_server(app: Router, listener: TcpListener) -> Result<(), GatewayError> {
    let addr = listener.local_addr().map_err(|source| GatewayError::Bind {
        addr: "listener".to_string(),
        source,
    })?;
    tracing::info!("Gateway listening on ws://{}/ws", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|source| GatewayError::Serve { addr, source })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Run the complete gateway server with configuration
pub async fn run(config: AppConfig) -> Result<(), GatewayError> {
    let addr = config.gateway.address();
    let state = create_gateway_state(config).await?;
    let app = create_app(state);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| GatewayError::Bind { addr, source })?;

    run_server(app, listener).await
}

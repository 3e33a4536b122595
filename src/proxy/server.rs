use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tracing::info;

use crate::error::AppResult;
use crate::models::AppConfig;
use crate::proxy::handlers::management::{get_usage_limits, get_usage_windows};
use crate::proxy::handlers::openai::{
    handle_chat_completions, handle_models, health_check_handler,
};
use crate::proxy::state::AppState;
use crate::proxy::upstream::client::UpstreamClient;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check_handler))
        .route("/v1/models", get(handle_models))
        .route("/v1/chat/completions", post(handle_chat_completions))
        .route("/v0/management/usage/limits", get(get_usage_limits))
        .route("/v0/management/usage/windows", get(get_usage_windows))
        .with_state(state)
}

/// Binds the proxy surface and serves until ctrl-c.
pub async fn start_server(config: &AppConfig) -> AppResult<()> {
    let state = AppState {
        upstream: Arc::new(UpstreamClient::new(&config.upstream)),
        models: Arc::new(config.proxy.models.clone()),
    };
    let app = build_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.proxy.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Proxy listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}

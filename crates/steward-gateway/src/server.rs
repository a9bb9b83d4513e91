// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, auth middleware, and shared state.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use steward_core::StewardError;
use steward_engine::Agent;
use tower_http::cors::CorsLayer;

use crate::auth::{auth_middleware, AuthConfig};
use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// The assembled agent.
    pub agent: Arc<Agent>,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Process start time for uptime reporting.
    pub start_time: Instant,
}

/// Gateway server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind. Zero picks an ephemeral port.
    pub port: u16,
}

/// Builds the gateway router: a public health route plus the authenticated
/// `/v1` API.
pub fn router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/chat", post(handlers::post_chat))
        .route("/v1/approve", post(handlers::post_approve))
        .route("/v1/conversations", get(handlers::get_conversations))
        .route(
            "/v1/conversations/:id",
            get(handlers::get_conversation).delete(handlers::delete_conversation),
        )
        .route("/v1/executions/pending", get(handlers::get_pending))
        .route("/v1/executions/history", get(handlers::get_history))
        .route("/v1/tools", get(handlers::get_tools))
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(CorsLayer::permissive())
}

/// Binds the configured address and serves the gateway until shutdown.
pub async fn start_server(config: &ServerConfig, state: GatewayState) -> Result<(), StewardError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| StewardError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    let local = listener
        .local_addr()
        .map_err(|e| StewardError::Internal(format!("failed to read bound address: {e}")))?;
    tracing::info!("gateway listening on {local}");

    axum::serve(listener, app)
        .await
        .map_err(|e| StewardError::Internal(format!("gateway server error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_debug_renders_address() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8420,
        };
        let rendered = format!("{config:?}");
        assert!(rendered.contains("127.0.0.1"));
        assert!(rendered.contains("8420"));
    }
}

//! scimhub HTTP gateway.
//!
//! Exposes the notification hub over REST: subscribers register and poll,
//! publishers post event documents, and push subscriptions are delivered
//! through the webhook transport.

pub mod config;
pub mod error;
pub mod json;
pub mod routes;
pub mod webhook;

pub use config::{Args, GatewayConfig};
pub use error::AppError;
pub use webhook::WebhookTransport;

use std::sync::Arc;

use axum::Router;
use scimhub_core::SharedRouter;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Event router.
    pub router: SharedRouter,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl AppState {
    /// Create new application state.
    pub fn new(router: scimhub_core::Router, config: GatewayConfig) -> Self {
        Self {
            router: Arc::new(router),
            config,
        }
    }

    /// Run a router operation off the async executor.
    ///
    /// Router calls take entity locks and may write to the store.
    pub async fn execute<T, F>(&self, op: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: FnOnce(&scimhub_core::Router) -> Result<T, scimhub_core::Error> + Send + 'static,
    {
        let router = self.router.clone();
        let result = tokio::task::spawn_blocking(move || op(&router))
            .await
            .map_err(|e| AppError::Internal(format!("router task failed: {}", e)))?;
        Ok(result?)
    }
}

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::health::routes())
        .merge(routes::subscriptions::routes())
        .merge(routes::events::routes())
        .merge(routes::poll::routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

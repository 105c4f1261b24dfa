//! HTTP server for oced

use crate::auth;
use crate::engine::Engine;
use crate::routes;
use anyhow::Result;
use axum::{middleware, Router};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
pub struct AppState {
    pub engine: Arc<Engine>,
    /// Bearer key; `None` disables the check
    pub api_key: Option<String>,
}

impl AppState {
    pub fn new(engine: Engine) -> Self {
        let api_key = engine
            .config()
            .server
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty());
        Self {
            engine: Arc::new(engine),
            api_key,
        }
    }
}

/// Build the router with all layers applied
pub fn app(state: AppState) -> Router {
    let state = Arc::new(state);
    let server = state.engine.config().server.clone();

    let protected = Router::new()
        .merge(routes::run_routes())
        .merge(routes::notes_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ));

    Router::new()
        .merge(routes::health_routes())
        .merge(protected)
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(server.max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            server.request_timeout_secs.max(1),
        )))
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server until `shutdown` resolves
pub async fn run<F>(state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = state.engine.config().server.bind.clone();
    let auth = if state.api_key.is_some() {
        "bearer key required"
    } else {
        "no api key configured"
    };
    let app = app(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("  Listening on http://{} ({})", addr, auth);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

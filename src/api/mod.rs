//! WebSocket channels and REST API
//!
//! ## Architecture
//!
//! - **Axum** web framework with Tower middleware
//! - **Core handles** in [`ApiState`]: rack state cache, control gate, aggregator
//! - **WebSocket** channels for hubs and actuator controllers
//!
//! ## Endpoints
//!
//! - `WS /ws/alerts` - Telemetry ingest from hubs
//! - `WS /ws/ac-control` - Actuator controller registration, commands, acks
//! - `GET /api/v1/health` - Health check
//! - `POST /api/v1/clusters/:id/evaluate` - Aggregate a cluster
//! - `POST /api/v1/racks/:id/evaluate` - Aggregate the cluster owning a rack
//! - `POST /api/v1/ac/auto-control` - Toggle auto mode
//! - `POST /api/v1/ac/manual-control` - Manual actuator command
//! - `GET /api/v1/alerts/by-rack-cluster/:id` - Rack alerts of a cluster
//! - `GET /api/v1/alerts/by-data-center/:id` - Rack alerts of a data center
//!
//! The bearer token, when configured, guards `/api/v1/*` only.

pub mod actuator_ws;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod socket;
pub mod state;
pub mod telemetry;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;

use std::net::SocketAddr;

use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:5053")
    pub bind_addr: SocketAddr,

    /// Optional authentication token for the REST endpoints
    pub auth_token: Option<String>,

    /// Enable CORS for dashboards
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: crate::util::get_bind_addr(),
            auth_token: None,
            enable_cors: true,
        }
    }
}

/// Build the router with every channel and endpoint
pub fn router(config: &ApiConfig, state: ApiState) -> Router {
    let mut api = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route(
            "/api/v1/clusters/:id/evaluate",
            post(routes::evaluate::evaluate_cluster),
        )
        .route(
            "/api/v1/racks/:id/evaluate",
            post(routes::evaluate::evaluate_rack),
        )
        .route(
            "/api/v1/ac/auto-control",
            post(routes::control::set_auto_control),
        )
        .route(
            "/api/v1/ac/manual-control",
            post(routes::control::set_manual_control),
        )
        .route(
            "/api/v1/alerts/by-rack-cluster/:id",
            get(routes::alerts::alerts_by_cluster),
        )
        .route(
            "/api/v1/alerts/by-data-center/:id",
            get(routes::alerts::alerts_by_data_center),
        );

    if let Some(token) = config.auth_token.clone() {
        api = api.route_layer(axum::middleware::from_fn_with_state(
            token,
            middleware::auth::auth_middleware,
        ));
    }

    let cors = config.enable_cors.then(|| {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    });

    Router::new()
        .route("/ws/alerts", get(telemetry::telemetry_handler))
        .route("/ws/ac-control", get(actuator_ws::actuator_handler))
        .merge(api)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .option_layer(cors),
        )
}

/// Spawn the server
///
/// This starts an Axum HTTP server in a background task.
/// Returns the server's local address.
pub async fn spawn_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting server on {}", config.bind_addr);

    let app = router(&config, state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("server error: {}", e);
        }
    });

    Ok(addr)
}

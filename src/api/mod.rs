//! REST API module using Axum
//!
//! Serves the latest rowing metrics, accepts session resets and heart-rate
//! measurements, and streams snapshots over a web socket.

pub mod envelope;
pub mod feed;
pub mod handlers;
mod routes;

pub use feed::MetricsFeed;
pub use handlers::DashboardState;

use axum::http::{header, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Environment variable listing allowed cross-origin clients.
pub const CORS_ENV_VAR: &str = "ROWMON_CORS_ORIGINS";

/// Build a CORS layer that is restrictive by default (same-origin only).
///
/// Set `ROWMON_CORS_ORIGINS` to a comma-separated list of allowed origins,
/// e.g. a training app served from another host.
fn build_cors_layer() -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    match std::env::var(CORS_ENV_VAR) {
        Ok(origins) => {
            let allowed: Vec<_> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            base.allow_origin(allowed)
        }
        Err(_) => base,
    }
}

/// Create the complete application router.
pub fn create_app(state: DashboardState) -> Router {
    Router::new()
        .nest("/api", routes::api_routes(state.clone()))
        .merge(routes::root_routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}

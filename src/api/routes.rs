//! API route definitions
//!
//! - /health - liveness, status and source
//! - /api/metrics - latest metrics snapshot
//! - /api/reset - start a new session
//! - /api/heartrate - push a heart-rate measurement
//! - /ws - live JSON snapshots

use axum::{
    routing::{get, post},
    Router,
};

use super::feed;
use super::handlers::{self, DashboardState};

/// JSON API nested under `/api`
pub fn api_routes(state: DashboardState) -> Router {
    Router::new()
        .route("/metrics", get(handlers::get_metrics))
        .route("/reset", post(handlers::post_reset))
        .route("/heartrate", post(handlers::post_heart_rate))
        .with_state(state)
}

/// Root level endpoints
pub fn root_routes(state: DashboardState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/ws", get(feed::ws_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::tests::create_test_state;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_api_routes_metrics() {
        let app = api_routes(create_test_state().state);
        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_reset_requires_post() {
        let app = api_routes(create_test_state().state);
        let response = app
            .oneshot(Request::builder().uri("/reset").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_ws_requires_upgrade() {
        let app = root_routes(create_test_state().state);
        let response = app
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}

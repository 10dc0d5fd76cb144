//! API route definitions
//!
//! - /api/v1/health - Liveness and surface counts
//! - /api/v1/documents - Sample document library
//! - /api/v1/catalogs/:subject_id - Step catalogs for one subject
//! - /api/v1/surfaces/:surface - Playback lifecycle per surface
//! - /api/v1/events - SSE stream of playback events

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{self, ApiState};
use super::sse;

/// Create all v1 API routes
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/documents", get(handlers::list_documents))
        .route("/catalogs/:subject_id", get(handlers::get_catalog))
        // Surface lifecycle
        .route(
            "/surfaces/:surface",
            get(handlers::get_surface).delete(handlers::teardown_surface),
        )
        .route("/surfaces/:surface/start", post(handlers::start_surface))
        .route("/surfaces/:surface/cancel", post(handlers::cancel_surface))
        // Push updates
        .route("/events", get(sse::event_stream))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogRegistry;
    use crate::playback::{EventBus, ImmediatePacer, PlaybackObserver, SurfaceRegistry};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn create_test_state() -> ApiState {
        let events = EventBus::new(64);
        let observers: Vec<Arc<dyn PlaybackObserver>> = vec![Arc::new(events.clone())];
        let surfaces = SurfaceRegistry::new(
            Arc::new(CatalogRegistry::builtin().unwrap()),
            Arc::new(ImmediatePacer),
            observers,
            None,
        );
        ApiState::new(Arc::new(surfaces), events)
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<&str>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        app.oneshot(request).await.unwrap()
    }

    async fn json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_api_routes_health() {
        let app = api_routes(create_test_state());
        let response = send(app, "GET", "/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let v = json(response).await;
        assert_eq!(v["data"]["status"], "ok");
        assert_eq!(v["data"]["running"], 0);
    }

    #[tokio::test]
    async fn test_api_routes_documents() {
        let app = api_routes(create_test_state());
        let v = json(send(app, "GET", "/documents", None).await).await;
        let ids: Vec<&str> = v["data"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|d| d["subject_id"].as_str())
            .collect();
        assert!(ids.contains(&"nda"));
        assert!(ids.contains(&"deposition"));
    }

    #[tokio::test]
    async fn test_api_routes_catalog_unknown_subject() {
        let app = api_routes(create_test_state());
        let response = send(app, "GET", "/catalogs/lease", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json(response).await["error"]["code"], "UNKNOWN_SUBJECT");
    }

    #[tokio::test]
    async fn test_api_routes_catalog_has_both_forms() {
        let app = api_routes(create_test_state());
        let v = json(send(app, "GET", "/catalogs/nda", None).await).await;
        assert!(v["data"]["single"].is_object());
        assert!(v["data"]["dual"]["extractor"].is_object());
    }

    #[tokio::test]
    async fn test_api_routes_start_rejects_bad_body() {
        let app = api_routes(create_test_state());
        let response = send(app, "POST", "/surfaces/viewer/start", Some("{\"mode\":1}")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_api_routes_unknown_surface() {
        let app = api_routes(create_test_state());
        let response = send(app, "GET", "/surfaces/ghost", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json(response).await["error"]["code"], "UNKNOWN_SURFACE");
    }
}

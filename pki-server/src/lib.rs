//! In-memory certificate request service.
//!
//! Accepts CSR submissions from `osg-cert-request` and hands out numeric
//! request ids. Used as the backend in tests and local runs.

use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod routes;
pub mod storage;

pub use storage::{InMemoryStorage, StoredRequest, DEFAULT_FIRST_ID};

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<RwLock<InMemoryStorage>>,
}

impl AppState {
    pub fn new(first_id: u64) -> Self {
        Self {
            storage: Arc::new(RwLock::new(InMemoryStorage::with_first_id(first_id))),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(DEFAULT_FIRST_ID)
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health_check))
        .route(
            "/api/v1/requests",
            get(routes::list_requests).post(routes::submit_request),
        )
        .route("/api/v1/requests/:id", get(routes::get_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the request API on an already bound listener
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Request service listening on http://{}", addr);
    }
    axum::serve(listener, app(state)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use pki_core::{RequestReceipt, RequestStatus};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const CSR: &str =
        "-----BEGIN CERTIFICATE REQUEST-----\nQUJDRA==\n-----END CERTIFICATE REQUEST-----\n";

    fn submit_body(hostname: &str) -> Body {
        Body::from(
            json!({
                "csr": CSR,
                "hostname": hostname,
                "email": "a@example.org",
                "name": "A Name",
                "phone": "555-0100",
            })
            .to_string(),
        )
    }

    fn post_request(hostname: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/requests")
            .header("content-type", "application/json")
            .body(submit_body(hostname))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(AppState::default())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_submit_then_fetch() {
        let state = AppState::new(500);
        let response = app(state.clone())
            .oneshot(post_request("test.example.org"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let receipt: RequestReceipt = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(receipt.request_id, 500);
        assert_eq!(receipt.status, RequestStatus::Received);

        let response = app(state.clone())
            .oneshot(
                Request::get("/api/v1/requests/500")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["hostname"], "test.example.org");

        let response = app(state)
            .oneshot(Request::get("/api/v1/requests").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_request_is_404() {
        let response = app(AppState::default())
            .oneshot(
                Request::get("/api/v1/requests/999999")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_json(response).await["error"]
            .as_str()
            .unwrap()
            .contains("999999"));
    }

    #[tokio::test]
    async fn test_invalid_request_is_400() {
        let state = AppState::default();
        let response = app(state.clone())
            .oneshot(post_request("not a hostname"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(state.storage.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_ids_is_500() {
        let state = AppState::new(u64::MAX);
        let response = app(state.clone())
            .oneshot(post_request("a.example.org"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app(state.clone())
            .oneshot(post_request("b.example.org"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_json(response).await["error"].is_string());
        assert_eq!(state.storage.read().await.len(), 1);
    }
}

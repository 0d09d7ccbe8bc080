use std::sync::Arc;

use axum::{
    Router,
    body::{Body, Bytes, to_bytes},
    http::{HeaderMap, Request, StatusCode, request::Builder},
};
use serde_json::Value;
use tower::ServiceExt;

use crate::{
    AppState, backend::memory::InMemoryBackend, config::Config, geocode::fake::FakeGeocoder,
    router::create_router,
};

pub const ADMIN_KEY: &str = "admin-secret";

/// Base64 of a 1x1 PNG.
pub const TINY_PNG: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

pub fn request(method: &str, uri: &str) -> Builder {
    Request::builder().method(method).uri(uri)
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    request("POST", uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    request("GET", uri).body(Body::empty()).unwrap()
}

pub struct TestApp {
    pub backend: Arc<InMemoryBackend>,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(Config::for_tests(), FakeGeocoder::default())
    }

    pub fn with(config: Config, geocoder: FakeGeocoder) -> Self {
        let backend = Arc::new(InMemoryBackend::new());
        let state = AppState {
            config,
            backend: backend.clone(),
            geocoder: Arc::new(geocoder),
        };
        Self {
            backend,
            router: create_router(state),
        }
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body)
    }

    pub async fn send_json(&self, req: Request<Body>) -> (StatusCode, Value) {
        let (status, _, body) = self.send(req).await;
        let value = serde_json::from_slice(&body)
            .unwrap_or_else(|e| panic!("non-JSON body ({e}): {}", String::from_utf8_lossy(&body)));
        (status, value)
    }

    /// Let detached compensation tasks run.
    pub async fn settle(&self) {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }
}

use axum::{
    body::{Body, to_bytes},
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use serde_json::Value;
use tracing::error;

const MAX_LOGGED_BODY: usize = 64 * 1024;

/// Logs every server error body; in production also strips `details` so
/// provider messages never reach clients.
pub async fn log_errors(
    State(production): State<bool>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let response = next.run(req).await;

    if !response.status().is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_LOGGED_BODY).await {
        Ok(b) => b,
        Err(e) => {
            error!("Failed to read error response body: {}", e);
            parts.headers.remove(axum::http::header::CONTENT_LENGTH);
            return Response::from_parts(parts, Body::empty());
        }
    };

    error!(
        "Server error on {} - Status: {}, Body: {}",
        path,
        parts.status,
        String::from_utf8_lossy(&bytes)
    );

    let body = if production {
        redact_details(&bytes).map(Body::from).unwrap_or_else(|| Body::from(bytes))
    } else {
        Body::from(bytes)
    };
    parts.headers.remove(axum::http::header::CONTENT_LENGTH);
    Response::from_parts(parts, body)
}

fn redact_details(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut value: Value = serde_json::from_slice(bytes).ok()?;
    value.as_object_mut()?.remove("details")?;
    serde_json::to_vec(&value).ok()
}

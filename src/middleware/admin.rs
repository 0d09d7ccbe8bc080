use std::collections::HashMap;

use axum::{
    body::Body,
    extract::{Query, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::{AppState, error::AppError};

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";
pub const ADMIN_KEY_PARAM: &str = "admin_key";

/// Exact byte equality; no trimming, and an empty key never matches.
pub fn admin_key_matches(expected: &str, supplied: &str) -> bool {
    !expected.is_empty() && bool::from(expected.as_bytes().ct_eq(supplied.as_bytes()))
}

fn supplied_key(req: &Request<Body>) -> Option<String> {
    let from_query = Query::<HashMap<String, String>>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(mut params)| params.remove(ADMIN_KEY_PARAM));
    from_query.or_else(|| {
        req.headers()
            .get(ADMIN_KEY_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
    })
}

pub async fn admin_guard(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    match supplied_key(&req) {
        Some(key) if admin_key_matches(&state.config.admin_key, &key) => Ok(next.run(req).await),
        _ => {
            tracing::warn!("rejected admin request to {}", req.uri().path());
            Err(AppError::Unauthorized)
        }
    }
}

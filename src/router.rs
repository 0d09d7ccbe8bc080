use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderName, Method, header},
    middleware::from_fn_with_state,
    routing::{MethodRouter, get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    AppState,
    error::AppError,
    middleware::{ADMIN_KEY_HEADER, admin_guard, log_errors},
    routes,
};

/// Every endpoint answers preflight itself: any origin, its own method plus
/// OPTIONS, and the headers the web and mobile clients send.
fn cors(method: Method) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([method, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            HeaderName::from_static(ADMIN_KEY_HEADER),
        ])
}

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

async fn route_not_found() -> AppError {
    AppError::NotFound("Route".into())
}

fn endpoint(path: &str, method: Method, handler: MethodRouter<AppState>) -> Router<AppState> {
    Router::new()
        .route(path, handler.fallback(method_not_allowed))
        .layer(cors(method))
}

fn admin_only(state: &AppState, handler: MethodRouter<AppState>) -> MethodRouter<AppState> {
    handler.route_layer(from_fn_with_state(state.clone(), admin_guard))
}

pub fn create_router(state: AppState) -> Router {
    let production = state.config.production;
    let body_limit = state.config.body_limit();

    Router::new()
        .merge(endpoint(
            "/auth/register",
            Method::POST,
            post(routes::auth::register),
        ))
        .merge(endpoint(
            "/geocode",
            Method::GET,
            get(routes::geocode::reverse_geocode),
        ))
        .merge(endpoint(
            "/get-user-profile",
            Method::GET,
            admin_only(&state, get(routes::user::get_user_profile)),
        ))
        .merge(endpoint(
            "/list-users",
            Method::GET,
            admin_only(&state, get(routes::user::list_users)),
        ))
        .merge(endpoint(
            "/log-error",
            Method::POST,
            post(routes::log::log_error),
        ))
        .merge(endpoint(
            "/push/register",
            Method::POST,
            post(routes::push::register_token),
        ))
        .merge(endpoint(
            "/upload-avatar",
            Method::POST,
            post(routes::upload::upload_avatar),
        ))
        .merge(endpoint("/upload", Method::POST, post(routes::upload::upload)))
        .fallback(route_not_found)
        .layer(from_fn_with_state(production, log_errors))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

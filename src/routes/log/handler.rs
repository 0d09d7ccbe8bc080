use axum::extract::{Json, State, rejection::JsonRejection};
use serde_json::Value;

use crate::{
    AppState,
    error::AppError,
    result::{ApiResult, Empty},
    validation::json_object,
};

use super::model::{ERROR_LOGS_TABLE, ErrorReport};

/// Stores a client-side error report.
#[axum::debug_handler]
pub async fn log_error(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ApiResult<Empty>>, AppError> {
    let body = json_object(payload)?;
    let report = ErrorReport::from_body(&body)?;

    tracing::warn!(
        "client {} reported from {}: {}",
        report.level,
        report.url.as_deref().unwrap_or("-"),
        report.message
    );

    let row = serde_json::to_value(&report).map_err(|e| AppError::internal(e.to_string()))?;
    state
        .backend
        .insert(ERROR_LOGS_TABLE, row)
        .await
        .map_err(|e| AppError::upstream("Failed to log error", &e))?;

    Ok(Json(ApiResult::ok()))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::config::Config;
    use crate::geocode::fake::FakeGeocoder;
    use crate::test_support::{TestApp, post_json};

    #[tokio::test]
    async fn stores_report() {
        let app = TestApp::new();
        let (status, body) = app
            .send_json(post_json(
                "/log-error",
                json!({"message": "TypeError: x is undefined", "url": "/cart", "context": {"build": 42}}),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true}));
        let rows = app.backend.rows("error_logs");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["url"], "/cart");
        assert_eq!(rows[0]["context"]["build"], 42);
    }

    #[tokio::test]
    async fn message_is_required() {
        let app = TestApp::new();
        let (status, body) = app
            .send_json(post_json("/log-error", json!({"message": ""})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required fields: message");
    }

    #[tokio::test]
    async fn store_failure_shows_details_outside_production() {
        let app = TestApp::new();
        app.backend.fail_table("error_logs");
        let (status, body) = app
            .send_json(post_json("/log-error", json!({"message": "boom"})))
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to log error");
        assert!(body["details"].as_str().unwrap().contains("error_logs"));
    }

    #[tokio::test]
    async fn store_failure_hides_details_in_production() {
        let config = Config {
            production: true,
            ..Config::for_tests()
        };
        let app = TestApp::with(config, FakeGeocoder::default());
        app.backend.fail_table("error_logs");
        let (status, body) = app
            .send_json(post_json("/log-error", json!({"message": "boom"})))
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Failed to log error"}));
    }
}

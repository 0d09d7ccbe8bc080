use axum::extract::{Json, State, rejection::JsonRejection};
use serde::Serialize;
use serde_json::Value;

use crate::{
    AppState,
    audit::{self, AuditEntry},
    error::AppError,
    result::ApiResult,
    validation::json_object,
};

use super::model::{CONFLICT_KEY, PUSH_TOKENS_TABLE, PushTokenRow};

#[derive(Serialize)]
pub struct RegisterTokenResponse {
    pub message: String,
    pub data: Value,
}

#[axum::debug_handler]
pub async fn register_token(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ApiResult<RegisterTokenResponse>>, AppError> {
    let body = json_object(payload)?;
    let row = PushTokenRow::from_body(&body)?;
    let user_id = row.user_id.clone();

    let encoded = serde_json::to_value(&row).map_err(|e| AppError::internal(e.to_string()))?;
    let stored = state
        .backend
        .upsert(PUSH_TOKENS_TABLE, encoded, CONFLICT_KEY)
        .await
        .map_err(|e| {
            tracing::error!("push token upsert failed for {}: {}", user_id, e);
            AppError::upstream("Failed to register push token", &e)
        })?;

    let record_id = stored
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or(row.token.as_str())
        .to_string();
    audit::emit(
        state.backend.as_ref(),
        AuditEntry::new(
            user_id.as_str(),
            "push_token.register",
            PUSH_TOKENS_TABLE,
            record_id,
            serde_json::json!({ "platform": row.platform }),
        ),
    )
    .await;

    Ok(Json(ApiResult::flat(RegisterTokenResponse {
        message: "Push token registered successfully".to_string(),
        data: stored,
    })))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::test_support::{TestApp, post_json};

    #[tokio::test]
    async fn registers_token() {
        let app = TestApp::new();
        let (status, body) = app
            .send_json(post_json(
                "/push/register",
                json!({"token": "ExponentPushToken[abc]", "user_id": "u1", "platform": "iOS"}),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Push token registered successfully");
        assert_eq!(body["data"]["platform"], "ios");
        assert_eq!(app.backend.rows("audit_logs")[0]["action"], "push_token.register");
    }

    #[tokio::test]
    async fn same_token_moves_to_latest_user() {
        let app = TestApp::new();
        for user in ["u1", "u2"] {
            let (status, _) = app
                .send_json(post_json(
                    "/push/register",
                    json!({"token": "device-1", "user_id": user}),
                ))
                .await;
            assert_eq!(status, StatusCode::OK);
        }
        let rows = app.backend.rows("push_tokens");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["user_id"], "u2");
        assert_eq!(rows[0]["platform"], "unknown");
    }

    #[tokio::test]
    async fn token_and_user_are_required() {
        let app = TestApp::new();
        let (status, body) = app
            .send_json(post_json("/push/register", json!({"token": "t"})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required fields: user_id");

        let (status, body) = app
            .send_json(post_json("/push/register", json!({"user_id": "u1", "token": null})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required fields: token");
    }

    #[tokio::test]
    async fn unknown_platform_is_rejected() {
        let app = TestApp::new();
        let (status, _) = app
            .send_json(post_json(
                "/push/register",
                json!({"token": "t", "user_id": "u1", "platform": "palm"}),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(app.backend.rows("push_tokens").is_empty());
    }

    #[tokio::test]
    async fn store_failure_is_a_500() {
        let app = TestApp::new();
        app.backend.fail_table("push_tokens");
        let (status, body) = app
            .send_json(post_json("/push/register", json!({"token": "t", "user_id": "u1"})))
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to register push token");
    }
}

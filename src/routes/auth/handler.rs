use axum::{
    extract::{Json, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::Value;

use crate::{
    AppState,
    audit::{self, AuditEntry},
    backend::NewAuthUser,
    error::AppError,
    result::ApiResult,
    routes::user::model::{DEFAULT_STATUS, USERS_TABLE},
    saga::{Compensation, run_dependent},
    validation::json_object,
};

use super::model::{RegisterRequest, RegisterResponse, RegisteredUser};

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let body = json_object(payload)?;
    let req = RegisterRequest::from_body(&body)?;

    let identity = state
        .backend
        .create_user(NewAuthUser {
            email: req.email.clone(),
            password: req.password.clone(),
            email_confirm: true,
            user_metadata: req.metadata(),
        })
        .await
        .map_err(|e| {
            tracing::warn!("identity creation failed for {}: {}", req.email, e);
            AppError::rejected("Failed to register user", &e)
        })?;

    let undo = {
        let backend = state.backend.clone();
        let user_id = identity.id.clone();
        Compensation::new(format!("delete identity {user_id}"), async move {
            backend.delete_user(&user_id).await
        })
    };
    run_dependent(
        state
            .backend
            .insert(USERS_TABLE, req.profile_row(&identity.id)),
        undo,
    )
    .await
    .map_err(|e| {
        tracing::error!("profile creation failed for {}: {}", identity.id, e);
        AppError::upstream("Failed to create user profile", &e)
    })?;

    audit::emit(
        state.backend.as_ref(),
        AuditEntry::new(
            identity.id.as_str(),
            "user.register",
            USERS_TABLE,
            identity.id.as_str(),
            req.metadata(),
        ),
    )
    .await;

    tracing::info!("registered user {}", identity.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResult::flat(RegisterResponse {
            user: RegisteredUser {
                id: identity.id,
                email: req.email,
                first_name: req.first_name,
                last_name: req.last_name,
                phone: req.phone,
                role: req.role,
                status: DEFAULT_STATUS.to_string(),
            },
            message: "User registered successfully".to_string(),
        })),
    ))
}

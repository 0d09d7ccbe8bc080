use axum::extract::{
    Json, Multipart, State,
    multipart::{MultipartError, MultipartRejection},
    rejection::JsonRejection,
};
use chrono::Utc;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
    AppState,
    audit::{self, AuditEntry},
    backend::Select,
    error::AppError,
    result::ApiResult,
    routes::user::model::USERS_TABLE,
    saga::{Compensation, run_dependent},
    utils::{content_type_for_extension, extension_for_content_type, extension_of, object_name},
    validation::{Fields, check_user_id, json_object},
};

use super::model::{
    AvatarImage, AvatarResponse, UPLOADS_TABLE, UploadKind, UploadResponse, too_large,
};

fn removal(state: &AppState, bucket: &str, path: &str) -> Compensation {
    let backend = state.backend.clone();
    let bucket = bucket.to_string();
    let path = path.to_string();
    Compensation::new(format!("remove object {bucket}/{path}"), async move {
        backend.remove_object(&bucket, &path).await
    })
}

#[axum::debug_handler]
pub async fn upload_avatar(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ApiResult<AvatarResponse>>, AppError> {
    let body = json_object(payload)?;
    let mut fields = Fields::new(&body);
    let user_id = fields.required("user_id");
    let avatar_data = fields.required("avatar_data");
    let file_ext = fields.optional("file_ext");
    fields.finish()?;
    check_user_id(&user_id)?;

    let image = AvatarImage::decode(
        &avatar_data,
        file_ext.as_deref(),
        state.config.max_avatar_bytes,
    )?;
    let bucket = state.config.avatar_bucket.as_str();
    let path = format!("{}/{}", user_id, object_name(&image.extension));

    state
        .backend
        .upload_object(bucket, &path, image.bytes, &image.content_type)
        .await
        .map_err(|e| {
            tracing::error!("avatar upload failed for {}: {}", user_id, e);
            AppError::upstream("Failed to upload avatar", &e)
        })?;
    let avatar_url = state.backend.public_url(bucket, &path);

    let changes = json!({
        "avatar_url": avatar_url,
        "updated_at": Utc::now().to_rfc3339(),
    });
    let profile_update = async {
        let updated = state
            .backend
            .update(USERS_TABLE, &Select::all().eq("id", user_id.as_str()), changes)
            .await
            .map_err(|e| AppError::upstream("Failed to update user profile", &e))?;
        updated
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound("User profile".into()))
    };
    run_dependent(profile_update, removal(&state, bucket, &path)).await?;

    audit::emit(
        state.backend.as_ref(),
        AuditEntry::new(
            user_id.as_str(),
            "user.avatar_update",
            USERS_TABLE,
            user_id.as_str(),
            json!({ "avatar_url": avatar_url }),
        ),
    )
    .await;

    Ok(Json(ApiResult::flat(AvatarResponse {
        message: "Avatar uploaded successfully".to_string(),
        avatar_url,
    })))
}

fn bad_multipart(err: MultipartError) -> AppError {
    AppError::invalid(format!("Invalid multipart body: {}", err.body_text()))
}

/// A declared part type must map to an extension the kind accepts. Generic
/// binary is treated as undeclared.
fn check_declared_content_type(kind: UploadKind, declared: Option<&str>) -> Result<(), AppError> {
    let Some(declared) = declared.map(str::trim).filter(|ct| !ct.is_empty()) else {
        return Ok(());
    };
    if declared.eq_ignore_ascii_case("application/octet-stream") {
        return Ok(());
    }
    match extension_for_content_type(declared) {
        Some(ext) if kind.allows(ext) => Ok(()),
        _ => Err(AppError::invalid(format!(
            "Unsupported content type for {}: {}",
            kind.as_str(),
            declared
        ))),
    }
}

struct FilePart {
    original_name: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

#[axum::debug_handler]
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResult<UploadResponse>>, AppError> {
    let mut multipart =
        multipart.map_err(|_| AppError::invalid("Expected a multipart/form-data body"))?;

    let mut file: Option<FilePart> = None;
    let mut declared_type: Option<String> = None;
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let original_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                file = Some(FilePart {
                    original_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            Some("type") => {
                let text = field.text().await.map_err(bad_multipart)?;
                declared_type = Some(text.trim().to_string()).filter(|t| !t.is_empty());
            }
            _ => {}
        }
    }

    let mut missing = Vec::new();
    if file.is_none() {
        missing.push("file".to_string());
    }
    if declared_type.is_none() {
        missing.push("type".to_string());
    }
    let (Some(file), Some(declared_type)) = (file, declared_type) else {
        return Err(AppError::MissingFields(missing));
    };

    let kind = UploadKind::parse(&declared_type)?;
    if file.bytes.is_empty() {
        return Err(AppError::invalid("Uploaded file is empty"));
    }
    if file.bytes.len() > state.config.max_upload_bytes {
        return Err(too_large(state.config.max_upload_bytes));
    }
    let extension = extension_of(&file.original_name)
        .or_else(|| {
            file.content_type
                .as_deref()
                .and_then(extension_for_content_type)
                .map(str::to_string)
        })
        .filter(|ext| kind.allows(ext))
        .ok_or_else(|| AppError::invalid(format!("Unsupported file type for {}", kind.as_str())))?;
    check_declared_content_type(kind, file.content_type.as_deref())?;
    let content_type = content_type_for_extension(&extension);

    let file_name = object_name(&extension);
    let path = format!("{}/{}", kind.as_str(), file_name);
    let bucket = state.config.upload_bucket.as_str();
    let size = file.bytes.len();

    state
        .backend
        .upload_object(bucket, &path, file.bytes, content_type)
        .await
        .map_err(|e| {
            tracing::error!("upload of {} failed: {}", path, e);
            AppError::upstream("Failed to upload file", &e)
        })?;
    let url = state.backend.public_url(bucket, &path);

    let id = Uuid::new_v4().to_string();
    let record = json!({
        "id": id,
        "file_name": file_name,
        "original_name": file.original_name,
        "path": path,
        "url": url,
        "size": size,
        "type": kind.as_str(),
        "content_type": content_type,
        "created_at": Utc::now().to_rfc3339(),
    });
    run_dependent(
        state.backend.insert(UPLOADS_TABLE, record),
        removal(&state, bucket, &path),
    )
    .await
    .map_err(|e| AppError::upstream("Failed to record upload", &e))?;

    tracing::info!("stored upload {} ({} bytes) at {}", id, size, path);
    Ok(Json(ApiResult::flat(UploadResponse {
        id,
        url,
        file_name,
        size,
        kind: kind.as_str().to_string(),
    })))
}

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Query, State},
};

use crate::{
    AppState,
    backend::{Direction, Select},
    error::AppError,
    pagination::{PageRequest, Pagination},
    result::{ApiResult, Data},
    validation::{Fields, check_user_id, query_object},
};

use super::model::{SEARCH_COLUMNS, USERS_TABLE, UserListData, UserProfileData, UserStats};

/// Rows requested per round trip while tallying stats.
const STATS_BATCH: u64 = 1000;

/// Whole-table role/status tallies. The total comes from an exact count; the
/// breakdown walks the table in id order, advancing by however many rows the
/// store actually returned, so a provider row cap cannot truncate it.
async fn user_stats(state: &AppState) -> Result<UserStats, AppError> {
    let counted = state
        .backend
        .select(
            USERS_TABLE,
            &Select::all().columns("id").with_count().range(0, 0),
        )
        .await
        .map_err(|e| AppError::upstream("Failed to compute user stats", &e))?;
    let total = counted.total.unwrap_or(counted.rows.len() as u64);

    let mut stats = UserStats::default();
    let mut offset = 0;
    while offset < total {
        let batch = state
            .backend
            .select(
                USERS_TABLE,
                &Select::all()
                    .columns("role,status")
                    .order("id", Direction::Asc)
                    .range(offset, offset + STATS_BATCH - 1),
            )
            .await
            .map_err(|e| AppError::upstream("Failed to compute user stats", &e))?;
        if batch.rows.is_empty() {
            break;
        }
        offset += batch.rows.len() as u64;
        stats.tally(&batch.rows);
    }
    stats.total = total;
    Ok(stats)
}

#[axum::debug_handler]
pub async fn get_user_profile(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ApiResult<Data<UserProfileData>>>, AppError> {
    let params = query_object(params);
    let mut fields = Fields::new(&params);
    let user_id = fields.required("user_id");
    fields.finish()?;
    check_user_id(&user_id)?;

    let user = state
        .backend
        .get_user_by_id(&user_id)
        .await
        .map_err(|e| AppError::upstream("Failed to fetch user", &e))?
        .ok_or_else(|| AppError::NotFound("User".into()))?;

    let profile = state
        .backend
        .select(USERS_TABLE, &Select::all().eq("id", user_id.as_str()))
        .await
        .map_err(|e| AppError::upstream("Failed to fetch user profile", &e))?
        .rows
        .into_iter()
        .next();

    Ok(Json(ApiResult::data(UserProfileData { user, profile })))
}

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ApiResult<Data<UserListData>>>, AppError> {
    let page = PageRequest::parse(
        params.get("page").map(String::as_str),
        params.get("limit").map(String::as_str),
    );
    let params = query_object(params);
    let fields = Fields::new(&params);

    let mut query = Select::all()
        .order("created_at", Direction::Desc)
        .with_count();
    if let Some(role) = fields.optional("role") {
        query = query.eq("role", role);
    }
    if let Some(status) = fields.optional("status") {
        query = query.eq("status", status);
    }
    if let Some(term) = fields.optional("search") {
        query = query.search(&SEARCH_COLUMNS, term);
    }
    let (from, to) = page.range();
    query = query.range(from, to);

    let listed = state
        .backend
        .select(USERS_TABLE, &query)
        .await
        .map_err(|e| AppError::upstream("Failed to list users", &e))?;
    let total = listed.total.unwrap_or(listed.rows.len() as u64);

    let stats = user_stats(&state).await?;

    tracing::debug!("listed {} of {} users (page {})", listed.rows.len(), total, page.page);
    Ok(Json(ApiResult::data(UserListData {
        users: listed.rows,
        pagination: Pagination::new(page, total),
        stats,
    })))
}

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Query, State},
};
use serde_json::Value;

use crate::{
    AppState,
    error::AppError,
    result::{ApiResult, Data},
    validation::{Fields, parse_coordinates, query_object},
};

/// Proxies a reverse-geocode lookup for `lat`/`lon`.
#[axum::debug_handler]
pub async fn reverse_geocode(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ApiResult<Data<Value>>>, AppError> {
    let params = query_object(params);
    let mut fields = Fields::new(&params);
    let lat = fields.required("lat");
    let lon = fields.required("lon");
    fields.finish()?;

    let at = parse_coordinates(&lat, &lon)?;
    let data = state.geocoder.reverse(at).await.map_err(|e| {
        tracing::error!("reverse geocode failed at {},{}: {}", at.latitude, at.longitude, e);
        AppError::upstream("Failed to reverse geocode location", &e)
    })?;

    Ok(Json(ApiResult::data(data)))
}

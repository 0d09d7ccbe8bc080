//! Reqwest-backed adapter for the hosted backend's REST surface
//! (`/rest/v1`, `/storage/v1`, `/auth/v1/admin`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url, header};
use serde_json::Value;

use super::{AuthUser, BackendService, Direction, NewAuthUser, Rows, Select, ServiceError};

const USER_AGENT: &str = "luxbyte-functions/0.1";

pub struct RestBackend {
    client: Client,
    base_url: String,
    service_key: String,
}

impl RestBackend {
    pub fn new(base_url: &str, service_key: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", self.service_key.as_str())
            .header(header::AUTHORIZATION, format!("Bearer {}", self.service_key))
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path)
    }

    fn admin_users_url(&self) -> String {
        format!("{}/auth/v1/admin/users", self.base_url)
    }

    /// The id is percent-encoded as a single path segment.
    fn admin_user_url(&self, id: &str) -> Result<Url, ServiceError> {
        let mut url =
            Url::parse(&self.admin_users_url()).map_err(|e| ServiceError::Transport(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ServiceError::Transport("backend URL cannot carry a path".into()))?
            .push(id);
        Ok(url)
    }
}

/// PostgREST query parameters for a selection.
fn query_params(query: &Select) -> Vec<(String, String)> {
    let mut params = Vec::new();
    params.push((
        "select".to_string(),
        query.columns.clone().unwrap_or_else(|| "*".to_string()),
    ));
    for (column, value) in &query.filters {
        params.push((column.clone(), format!("eq.{value}")));
    }
    if let Some((columns, term)) = &query.search {
        let pattern = term.replace(['*', ',', '(', ')'], " ");
        let clauses = columns
            .iter()
            .map(|c| format!("{c}.ilike.*{}*", pattern.trim()))
            .collect::<Vec<_>>()
            .join(",");
        params.push(("or".to_string(), format!("({clauses})")));
    }
    if let Some((column, direction)) = &query.order {
        let dir = match direction {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        };
        params.push(("order".to_string(), format!("{column}.{dir}")));
    }
    if let Some((from, to)) = query.range {
        params.push(("offset".to_string(), from.to_string()));
        params.push(("limit".to_string(), (to.saturating_sub(from) + 1).to_string()));
    }
    params
}

/// Total from a `Content-Range: 0-9/42` header.
fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

async fn check(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Status {
        status: status.as_u16(),
        message: provider_message(&body),
    })
}

/// Best human-readable message from a provider error body.
fn provider_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}

fn transport(err: reqwest::Error) -> ServiceError {
    ServiceError::Transport(err.to_string())
}

fn first_row(rows: Value) -> Result<Value, ServiceError> {
    match rows {
        Value::Array(mut rows) if !rows.is_empty() => Ok(rows.swap_remove(0)),
        Value::Array(_) => Err(ServiceError::Decode("no row returned".into())),
        other => Ok(other),
    }
}

#[async_trait]
impl BackendService for RestBackend {
    async fn insert(&self, table: &str, row: Value) -> Result<Value, ServiceError> {
        let response = self
            .authorized(self.client.post(self.table_url(table)))
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await
            .map_err(transport)?;
        let rows: Value = check(response)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))?;
        first_row(rows)
    }

    async fn select(&self, table: &str, query: &Select) -> Result<Rows, ServiceError> {
        let mut request = self
            .authorized(self.client.get(self.table_url(table)))
            .query(&query_params(query));
        if query.count {
            request = request.header("Prefer", "count=exact");
        }
        let response = check(request.send().await.map_err(transport)?).await?;
        let total = response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range);
        let rows: Vec<Value> = response
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))?;
        Ok(Rows { rows, total })
    }

    async fn update(
        &self,
        table: &str,
        query: &Select,
        changes: Value,
    ) -> Result<Vec<Value>, ServiceError> {
        let params: Vec<_> = query_params(query)
            .into_iter()
            .filter(|(k, _)| k != "select")
            .collect();
        let response = self
            .authorized(self.client.patch(self.table_url(table)))
            .query(&params)
            .header("Prefer", "return=representation")
            .json(&changes)
            .send()
            .await
            .map_err(transport)?;
        check(response)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))
    }

    async fn upsert(
        &self,
        table: &str,
        row: Value,
        on_conflict: &str,
    ) -> Result<Value, ServiceError> {
        let response = self
            .authorized(self.client.post(self.table_url(table)))
            .query(&[("on_conflict", on_conflict)])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&row)
            .send()
            .await
            .map_err(transport)?;
        let rows: Value = check(response)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))?;
        first_row(rows)
    }

    async fn delete(&self, table: &str, query: &Select) -> Result<(), ServiceError> {
        let params: Vec<_> = query_params(query)
            .into_iter()
            .filter(|(k, _)| k != "select")
            .collect();
        let response = self
            .authorized(self.client.delete(self.table_url(table)))
            .query(&params)
            .send()
            .await
            .map_err(transport)?;
        check(response).await.map(|_| ())
    }

    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ServiceError> {
        let response = self
            .authorized(self.client.post(self.object_url(bucket, path)))
            .header(header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await
            .map_err(transport)?;
        check(response).await.map(|_| ())
    }

    async fn remove_object(&self, bucket: &str, path: &str) -> Result<(), ServiceError> {
        let response = self
            .authorized(self.client.delete(self.object_url(bucket, path)))
            .send()
            .await
            .map_err(transport)?;
        check(response).await.map(|_| ())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, bucket, path
        )
    }

    async fn create_user(&self, user: NewAuthUser) -> Result<AuthUser, ServiceError> {
        let response = self
            .authorized(self.client.post(self.admin_users_url()))
            .json(&user)
            .send()
            .await
            .map_err(transport)?;
        check(response)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))
    }

    async fn delete_user(&self, id: &str) -> Result<(), ServiceError> {
        let response = self
            .authorized(self.client.delete(self.admin_user_url(id)?))
            .send()
            .await
            .map_err(transport)?;
        check(response).await.map(|_| ())
    }

    async fn get_user_by_id(&self, id: &str) -> Result<Option<AuthUser>, ServiceError> {
        let response = self
            .authorized(self.client.get(self.admin_user_url(id)?))
            .send()
            .await
            .map_err(transport)?;
        match check(response).await {
            Ok(response) => response
                .json()
                .await
                .map(Some)
                .map_err(|e| ServiceError::Decode(e.to_string())),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

//! Port for the hosted backend-as-a-service: table CRUD, object storage and
//! the admin side of the identity provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(test)]
pub mod memory;
mod rest;

pub use rest::RestBackend;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("backend request failed: {0}")]
    Transport(String),
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("backend response could not be decoded: {0}")]
    Decode(String),
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::Status { status: 404, .. })
    }
}

/// Identity-provider record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewAuthUser {
    pub email: String,
    pub password: String,
    pub email_confirm: bool,
    pub user_metadata: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Row selection: equality filters, optional case-insensitive substring match,
/// ordering and an inclusive row range.
#[derive(Debug, Clone, Default)]
pub struct Select {
    pub columns: Option<String>,
    pub filters: Vec<(String, String)>,
    pub search: Option<(Vec<String>, String)>,
    pub order: Option<(String, Direction)>,
    pub range: Option<(u64, u64)>,
    pub count: bool,
}

impl Select {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn columns(mut self, columns: &str) -> Self {
        self.columns = Some(columns.to_string());
        self
    }

    pub fn eq(mut self, column: &str, value: impl Into<String>) -> Self {
        self.filters.push((column.to_string(), value.into()));
        self
    }

    pub fn search(mut self, columns: &[&str], term: impl Into<String>) -> Self {
        self.search = Some((
            columns.iter().map(|c| c.to_string()).collect(),
            term.into(),
        ));
        self
    }

    pub fn order(mut self, column: &str, direction: Direction) -> Self {
        self.order = Some((column.to_string(), direction));
        self
    }

    pub fn range(mut self, from: u64, to: u64) -> Self {
        self.range = Some((from, to));
        self
    }

    /// Ask the store for the exact number of matching rows.
    pub fn with_count(mut self) -> Self {
        self.count = true;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Rows {
    pub rows: Vec<Value>,
    pub total: Option<u64>,
}

#[async_trait]
pub trait BackendService: Send + Sync {
    async fn insert(&self, table: &str, row: Value) -> Result<Value, ServiceError>;

    async fn select(&self, table: &str, query: &Select) -> Result<Rows, ServiceError>;

    /// Update rows matching the filters of `query`, returning the updated rows.
    async fn update(
        &self,
        table: &str,
        query: &Select,
        changes: Value,
    ) -> Result<Vec<Value>, ServiceError>;

    /// Insert or merge on the unique column `on_conflict`.
    async fn upsert(&self, table: &str, row: Value, on_conflict: &str)
    -> Result<Value, ServiceError>;

    async fn delete(&self, table: &str, query: &Select) -> Result<(), ServiceError>;

    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ServiceError>;

    async fn remove_object(&self, bucket: &str, path: &str) -> Result<(), ServiceError>;

    fn public_url(&self, bucket: &str, path: &str) -> String;

    async fn create_user(&self, user: NewAuthUser) -> Result<AuthUser, ServiceError>;

    async fn delete_user(&self, id: &str) -> Result<(), ServiceError>;

    async fn get_user_by_id(&self, id: &str) -> Result<Option<AuthUser>, ServiceError>;
}

//! In-memory backend used by handler tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{AuthUser, BackendService, Direction, NewAuthUser, Rows, Select, ServiceError};

#[derive(Default)]
struct State {
    tables: HashMap<String, Vec<Value>>,
    objects: HashMap<(String, String), (Vec<u8>, String)>,
    users: Vec<AuthUser>,
    failing_tables: HashSet<String>,
    fail_uploads: bool,
    fail_user_deletes: bool,
    deleted_users: Vec<String>,
    removed_objects: Vec<(String, String)>,
    max_rows: Option<usize>,
}

#[derive(Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
}

fn failure(message: &str) -> ServiceError {
    ServiceError::Status {
        status: 500,
        message: message.to_string(),
    }
}

fn cell(row: &Value, column: &str) -> String {
    match row.get(column) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn matches(row: &Value, query: &Select) -> bool {
    let filtered = query
        .filters
        .iter()
        .all(|(column, value)| cell(row, column) == *value);
    let searched = match &query.search {
        Some((columns, term)) => {
            let term = term.to_lowercase();
            columns
                .iter()
                .any(|c| cell(row, c).to_lowercase().contains(&term))
        }
        None => true,
    };
    filtered && searched
}

fn merge(target: &mut Value, changes: &Value) {
    if let (Some(target), Some(changes)) = (target.as_object_mut(), changes.as_object()) {
        for (k, v) in changes {
            target.insert(k.clone(), v.clone());
        }
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write to `table` fail.
    pub fn fail_table(&self, table: &str) {
        self.lock().failing_tables.insert(table.to_string());
    }

    /// Return at most `n` rows per select, like a provider max-rows setting.
    pub fn cap_rows(&self, n: usize) {
        self.lock().max_rows = Some(n);
    }

    pub fn fail_uploads(&self) {
        self.lock().fail_uploads = true;
    }

    pub fn fail_user_deletes(&self) {
        self.lock().fail_user_deletes = true;
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn seed(&self, table: &str, row: Value) {
        self.lock()
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    pub fn seed_user(&self, user: AuthUser) {
        self.lock().users.push(user);
    }

    pub fn users(&self) -> Vec<AuthUser> {
        self.lock().users.clone()
    }

    pub fn deleted_users(&self) -> Vec<String> {
        self.lock().deleted_users.clone()
    }

    pub fn objects(&self) -> Vec<(String, String)> {
        self.lock().objects.keys().cloned().collect()
    }

    pub fn object_content_types(&self) -> Vec<String> {
        self.lock()
            .objects
            .values()
            .map(|(_, content_type)| content_type.clone())
            .collect()
    }

    pub fn removed_objects(&self) -> Vec<(String, String)> {
        self.lock().removed_objects.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn check_writable(state: &State, table: &str) -> Result<(), ServiceError> {
        if state.failing_tables.contains(table) {
            return Err(failure(&format!("write to {table} rejected")));
        }
        Ok(())
    }
}

#[async_trait]
impl BackendService for InMemoryBackend {
    async fn insert(&self, table: &str, mut row: Value) -> Result<Value, ServiceError> {
        let mut state = self.lock();
        Self::check_writable(&state, table)?;
        if let Some(obj) = row.as_object_mut() {
            obj.entry("id")
                .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        }
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn select(&self, table: &str, query: &Select) -> Result<Rows, ServiceError> {
        let state = self.lock();
        let mut rows: Vec<Value> = state
            .tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| matches(r, query)).cloned().collect())
            .unwrap_or_default();
        if let Some((column, direction)) = &query.order {
            rows.sort_by_key(|r| cell(r, column));
            if *direction == Direction::Desc {
                rows.reverse();
            }
        }
        let total = query.count.then_some(rows.len() as u64);
        if let Some((from, to)) = query.range {
            rows = rows
                .into_iter()
                .skip(from as usize)
                .take((to.saturating_sub(from) + 1) as usize)
                .collect();
        }
        if let Some(cap) = state.max_rows {
            rows.truncate(cap);
        }
        if let Some(columns) = &query.columns {
            let wanted: Vec<&str> = columns.split(',').map(str::trim).collect();
            rows = rows
                .into_iter()
                .map(|r| {
                    let projected: Map<String, Value> = wanted
                        .iter()
                        .filter_map(|c| r.get(*c).map(|v| (c.to_string(), v.clone())))
                        .collect();
                    Value::Object(projected)
                })
                .collect();
        }
        Ok(Rows { rows, total })
    }

    async fn update(
        &self,
        table: &str,
        query: &Select,
        changes: Value,
    ) -> Result<Vec<Value>, ServiceError> {
        let mut state = self.lock();
        Self::check_writable(&state, table)?;
        let mut updated = Vec::new();
        if let Some(rows) = state.tables.get_mut(table) {
            for row in rows.iter_mut().filter(|r| matches(r, query)) {
                merge(row, &changes);
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn upsert(
        &self,
        table: &str,
        row: Value,
        on_conflict: &str,
    ) -> Result<Value, ServiceError> {
        let mut state = self.lock();
        Self::check_writable(&state, table)?;
        let key = cell(&row, on_conflict);
        let rows = state.tables.entry(table.to_string()).or_default();
        if let Some(existing) = rows.iter_mut().find(|r| cell(r, on_conflict) == key) {
            merge(existing, &row);
            return Ok(existing.clone());
        }
        rows.push(row.clone());
        Ok(row)
    }

    async fn delete(&self, table: &str, query: &Select) -> Result<(), ServiceError> {
        let mut state = self.lock();
        Self::check_writable(&state, table)?;
        if let Some(rows) = state.tables.get_mut(table) {
            rows.retain(|r| !matches(r, query));
        }
        Ok(())
    }

    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ServiceError> {
        let mut state = self.lock();
        if state.fail_uploads {
            return Err(failure("storage unavailable"));
        }
        let key = (bucket.to_string(), path.to_string());
        if state.objects.contains_key(&key) {
            return Err(ServiceError::Status {
                status: 409,
                message: "The resource already exists".into(),
            });
        }
        state.objects.insert(key, (bytes, content_type.to_string()));
        Ok(())
    }

    async fn remove_object(&self, bucket: &str, path: &str) -> Result<(), ServiceError> {
        let mut state = self.lock();
        let key = (bucket.to_string(), path.to_string());
        state.objects.remove(&key);
        state.removed_objects.push(key);
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("http://baas.test/storage/v1/object/public/{bucket}/{path}")
    }

    async fn create_user(&self, user: NewAuthUser) -> Result<AuthUser, ServiceError> {
        let mut state = self.lock();
        let taken = state
            .users
            .iter()
            .any(|u| u.email.as_deref() == Some(user.email.as_str()));
        if taken {
            return Err(ServiceError::Status {
                status: 422,
                message: "A user with this email address has already been registered".into(),
            });
        }
        let created = AuthUser {
            id: Uuid::new_v4().to_string(),
            email: Some(user.email),
            user_metadata: user.user_metadata,
            created_at: Some(chrono::Utc::now().to_rfc3339()),
        };
        state.users.push(created.clone());
        Ok(created)
    }

    async fn delete_user(&self, id: &str) -> Result<(), ServiceError> {
        let mut state = self.lock();
        if state.fail_user_deletes {
            return Err(failure("identity provider unavailable"));
        }
        state.users.retain(|u| u.id != id);
        state.deleted_users.push(id.to_string());
        Ok(())
    }

    async fn get_user_by_id(&self, id: &str) -> Result<Option<AuthUser>, ServiceError> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }
}

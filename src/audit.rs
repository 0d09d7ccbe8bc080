use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::backend::BackendService;

pub const AUDIT_TABLE: &str = "audit_logs";

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub user_id: String,
    pub action: String,
    pub table_name: String,
    pub record_id: String,
    pub new_values: Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        user_id: impl Into<String>,
        action: &str,
        table_name: &str,
        record_id: impl Into<String>,
        new_values: Value,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            action: action.to_string(),
            table_name: table_name.to_string(),
            record_id: record_id.into(),
            new_values,
            timestamp: Utc::now(),
        }
    }
}

/// Best-effort append. A failed write is logged and otherwise ignored.
pub async fn emit(backend: &dyn BackendService, entry: AuditEntry) {
    let action = entry.action.clone();
    let row = match serde_json::to_value(&entry) {
        Ok(row) => row,
        Err(e) => {
            tracing::warn!("failed to encode audit entry {}: {}", action, e);
            return;
        }
    };
    if let Err(e) = backend.insert(AUDIT_TABLE, row).await {
        tracing::warn!("failed to write audit entry {}: {}", action, e);
    }
}

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::backend::AuthUser;
use crate::pagination::Pagination;

pub const USERS_TABLE: &str = "users";
pub const DEFAULT_ROLE: &str = "customer";
pub const DEFAULT_STATUS: &str = "active";
/// Roles a client may pick for itself at registration.
pub const SELF_SERVICE_ROLES: [&str; 3] = ["customer", "driver", "merchant"];

/// Columns matched by the `search` filter of the listing.
pub const SEARCH_COLUMNS: [&str; 3] = ["email", "first_name", "last_name"];

#[derive(Debug, Serialize)]
pub struct UserProfileData {
    pub user: AuthUser,
    pub profile: Option<Value>,
}

#[derive(Debug, Serialize, Default, PartialEq)]
pub struct UserStats {
    pub total: u64,
    pub by_role: BTreeMap<String, u64>,
    pub by_status: BTreeMap<String, u64>,
}

impl UserStats {
    /// Adds role and status counts for `rows`; `total` is left to the caller.
    pub fn tally(&mut self, rows: &[Value]) {
        for row in rows {
            let role = row
                .get("role")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            let status = row
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            *self.by_role.entry(role.to_string()).or_default() += 1;
            *self.by_status.entry(status.to_string()).or_default() += 1;
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserListData {
    pub users: Vec<Value>,
    pub pagination: Pagination,
    pub stats: UserStats,
}

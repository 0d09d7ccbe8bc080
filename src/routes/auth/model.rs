use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::error::AppError;
use crate::routes::user::model::{DEFAULT_ROLE, DEFAULT_STATUS, SELF_SERVICE_ROLES};
use crate::validation::{Fields, check_password, normalize_email};

#[derive(Debug)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: String,
}

impl RegisterRequest {
    pub fn from_body(body: &Map<String, Value>) -> Result<Self, AppError> {
        let mut fields = Fields::new(body);
        let email = fields.required("email");
        let password = fields.required_verbatim("password");
        let first_name = fields.required("first_name");
        let last_name = fields.required("last_name");
        let phone = fields.optional("phone");
        let role = fields.optional("role");
        fields.finish()?;

        let email = normalize_email(&email)?;
        check_password(&password)?;
        let role = match role {
            Some(role) => {
                let role = role.to_lowercase();
                if !SELF_SERVICE_ROLES.contains(&role.as_str()) {
                    return Err(AppError::invalid(format!("Invalid role: {role}")));
                }
                role
            }
            None => DEFAULT_ROLE.to_string(),
        };

        Ok(Self {
            email,
            password,
            first_name,
            last_name,
            phone,
            role,
        })
    }

    pub fn metadata(&self) -> Value {
        json!({
            "first_name": self.first_name,
            "last_name": self.last_name,
            "role": self.role,
        })
    }

    /// Application-side profile row for the freshly created identity.
    pub fn profile_row(&self, user_id: &str) -> Value {
        let now = Utc::now().to_rfc3339();
        json!({
            "id": user_id,
            "email": self.email,
            "first_name": self.first_name,
            "last_name": self.last_name,
            "phone": self.phone,
            "role": self.role,
            "status": DEFAULT_STATUS,
            "created_at": now,
            "updated_at": now,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: RegisteredUser,
    pub message: String,
}

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::validation::Fields;

pub const PUSH_TOKENS_TABLE: &str = "push_tokens";
/// A device token belongs to at most one user; the last registration wins.
pub const CONFLICT_KEY: &str = "token";
pub const PLATFORMS: [&str; 3] = ["ios", "android", "web"];
pub const UNKNOWN_PLATFORM: &str = "unknown";

#[derive(Debug, Serialize)]
pub struct PushTokenRow {
    pub user_id: String,
    pub token: String,
    pub platform: String,
    pub updated_at: DateTime<Utc>,
}

impl PushTokenRow {
    pub fn from_body(body: &Map<String, Value>) -> Result<Self, AppError> {
        let mut fields = Fields::new(body);
        let token = fields.required("token");
        let user_id = fields.required("user_id");
        let platform = fields.optional("platform");
        fields.finish()?;

        let platform = match platform {
            Some(p) => {
                let p = p.to_lowercase();
                if !PLATFORMS.contains(&p.as_str()) {
                    return Err(AppError::invalid(format!(
                        "platform must be one of {}",
                        PLATFORMS.join(", ")
                    )));
                }
                p
            }
            None => UNKNOWN_PLATFORM.to_string(),
        };

        Ok(Self {
            user_id,
            token,
            platform,
            updated_at: Utc::now(),
        })
    }
}

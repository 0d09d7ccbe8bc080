use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::validation::Fields;

pub const ERROR_LOGS_TABLE: &str = "error_logs";
const LEVELS: [&str; 4] = ["fatal", "error", "warn", "info"];
const MAX_MESSAGE_LEN: usize = 4000;

#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub message: String,
    pub stack: Option<String>,
    pub url: Option<String>,
    pub user_agent: Option<String>,
    pub user_id: Option<String>,
    pub level: String,
    pub context: Value,
    pub created_at: DateTime<Utc>,
}

fn clip(mut text: String) -> String {
    if text.len() > MAX_MESSAGE_LEN {
        let mut end = MAX_MESSAGE_LEN;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}

impl ErrorReport {
    pub fn from_body(body: &Map<String, Value>) -> Result<Self, AppError> {
        let mut fields = Fields::new(body);
        let message = fields.required("message");
        let stack = fields.optional("stack");
        let url = fields.optional("url");
        let user_agent = fields
            .optional("user_agent")
            .or_else(|| fields.optional("userAgent"));
        let user_id = fields.optional("user_id");
        let level = fields.optional("level");
        fields.finish()?;

        Ok(Self {
            message: clip(message),
            stack: stack.map(clip),
            url,
            user_agent,
            user_id,
            level: normalize_level(level),
            context: body.get("context").cloned().unwrap_or(Value::Null),
            created_at: Utc::now(),
        })
    }
}

/// Unknown or absent levels are recorded as `error`.
fn normalize_level(level: Option<String>) -> String {
    level
        .map(|l| l.to_lowercase())
        .filter(|l| LEVELS.contains(&l.as_str()))
        .unwrap_or_else(|| "error".to_string())
}

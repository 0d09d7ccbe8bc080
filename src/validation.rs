//! Request-shape checks shared by every handler.

use std::collections::HashMap;

use axum::{Json, extract::rejection::JsonRejection};
use serde_json::{Map, Value};

use crate::common::Coordinates;
use crate::error::AppError;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Trimmed text of a scalar value. Absent, null, empty and whitespace-only
/// values all read as `None`.
pub fn text(value: Option<&Value>) -> Option<String> {
    let raw = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!raw.is_empty()).then_some(raw)
}

/// Collects missing required fields so they are reported together.
pub struct Fields<'a> {
    source: &'a Map<String, Value>,
    missing: Vec<String>,
}

impl<'a> Fields<'a> {
    pub fn new(source: &'a Map<String, Value>) -> Self {
        Self {
            source,
            missing: Vec::new(),
        }
    }

    /// Returns the trimmed value, or an empty string after recording `name`
    /// as missing.
    pub fn required(&mut self, name: &str) -> String {
        match text(self.source.get(name)) {
            Some(value) => value,
            None => {
                self.missing.push(name.to_string());
                String::new()
            }
        }
    }

    /// Like `required`, but keeps surrounding whitespace. Secrets are passed
    /// on exactly as typed.
    pub fn required_verbatim(&mut self, name: &str) -> String {
        match self.source.get(name) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            other => text(other).unwrap_or_else(|| {
                self.missing.push(name.to_string());
                String::new()
            }),
        }
    }

    pub fn optional(&self, name: &str) -> Option<String> {
        text(self.source.get(name))
    }

    pub fn finish(self) -> Result<(), AppError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::MissingFields(self.missing))
        }
    }
}

/// User ids end up in object paths and provider URLs, so only path-safe ids
/// are accepted.
pub fn check_user_id(user_id: &str) -> Result<(), AppError> {
    if user_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        Ok(())
    } else {
        Err(AppError::invalid(
            "user_id may only contain letters, digits, '-' and '_'",
        ))
    }
}

pub fn json_object(payload: Result<Json<Value>, JsonRejection>) -> Result<Map<String, Value>, AppError> {
    match payload {
        Ok(Json(Value::Object(map))) => Ok(map),
        Ok(Json(_)) => Err(AppError::invalid("Request body must be a JSON object")),
        Err(rejection) => {
            tracing::debug!("rejected request body: {}", rejection.body_text());
            Err(AppError::invalid("Invalid JSON body"))
        }
    }
}

pub fn query_object(params: HashMap<String, String>) -> Map<String, Value> {
    params
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect()
}

fn parse_bounded(name: &str, raw: &str, bound: f64) -> Result<f64, AppError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| AppError::invalid(format!("{name} must be a number")))?;
    if !value.is_finite() {
        return Err(AppError::invalid(format!("{name} must be a number")));
    }
    if !(-bound..=bound).contains(&value) {
        return Err(AppError::invalid(format!(
            "{name} must be between {} and {bound}",
            -bound
        )));
    }
    Ok(value)
}

pub fn parse_coordinates(lat: &str, lon: &str) -> Result<Coordinates, AppError> {
    Ok(Coordinates {
        latitude: parse_bounded("lat", lat, 90.0)?,
        longitude: parse_bounded("lon", lon, 180.0)?,
    })
}

pub fn normalize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@') && domain.contains('.')
        }
        None => false,
    };
    if valid && !email.chars().any(char::is_whitespace) {
        Ok(email)
    } else {
        Err(AppError::invalid("Invalid email address"))
    }
}

pub fn check_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::invalid(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

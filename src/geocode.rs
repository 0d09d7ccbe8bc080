//! Reverse-geocoding port and its reqwest adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header};
use serde_json::Value;

use crate::backend::ServiceError;
use crate::common::Coordinates;

const USER_AGENT: &str = "luxbyte-functions-geocoder/0.1";

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse(&self, at: Coordinates) -> Result<Value, ServiceError>;
}

pub struct HttpGeocoder {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpGeocoder {
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl ReverseGeocoder for HttpGeocoder {
    async fn reverse(&self, at: Coordinates) -> Result<Value, ServiceError> {
        let mut params = vec![
            ("lat", at.latitude.to_string()),
            ("lon", at.longitude.to_string()),
            ("format", "json".to_string()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("key", key.clone()));
        }

        let response = self
            .client
            .get(&self.endpoint)
            .header(header::ACCEPT, "application/json")
            .query(&params)
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                message: body.trim().to_string(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ServiceError::Decode(format!("invalid geocoder payload: {e}")))
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;

    /// Echoes the coordinates back as a fixed address, or fails when `down`.
    #[derive(Default)]
    pub struct FakeGeocoder {
        pub down: bool,
    }

    #[async_trait]
    impl ReverseGeocoder for FakeGeocoder {
        async fn reverse(&self, at: Coordinates) -> Result<Value, ServiceError> {
            if self.down {
                return Err(ServiceError::Transport("connection refused".into()));
            }
            Ok(serde_json::json!({
                "lat": at.latitude.to_string(),
                "lon": at.longitude.to_string(),
                "display_name": "Tahrir Square, Cairo, Egypt",
                "address": { "city": "Cairo", "country_code": "eg" }
            }))
        }
    }
}

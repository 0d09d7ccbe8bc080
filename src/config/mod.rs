use std::env;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub baas_url: String,
    pub baas_service_key: String,
    pub admin_key: String,
    pub geocode_url: String,
    pub geocode_api_key: Option<String>,
    pub http_timeout_secs: u64,
    pub avatar_bucket: String,
    pub upload_bucket: String,
    pub max_upload_bytes: usize,
    pub max_avatar_bytes: usize,
    pub server_host: String,
    pub server_port: u16,
    pub production: bool,
}

const DEFAULT_GEOCODE_URL: &str = "https://nominatim.openstreetmap.org/reverse";

impl Config {
    /// Secrets (`BAAS_SERVICE_KEY`, `ADMIN_KEY`) must come from the environment;
    /// everything else has a default.
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let production = env::var("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);
        let geocode_api_key = env::var("GEOCODE_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        Ok(Config {
            baas_url: env::var("BAAS_URL")?.trim_end_matches('/').to_string(),
            baas_service_key: env::var("BAAS_SERVICE_KEY")?,
            admin_key: env::var("ADMIN_KEY")?,
            geocode_url: env::var("GEOCODE_URL").unwrap_or_else(|_| DEFAULT_GEOCODE_URL.into()),
            geocode_api_key,
            http_timeout_secs: parse_or("HTTP_TIMEOUT_SECS", 10),
            avatar_bucket: env::var("AVATAR_BUCKET").unwrap_or_else(|_| "avatars".into()),
            upload_bucket: env::var("UPLOAD_BUCKET").unwrap_or_else(|_| "uploads".into()),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
            max_avatar_bytes: parse_or("MAX_AVATAR_BYTES", 5 * 1024 * 1024),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            server_port: parse_or("SERVER_PORT", 3000),
            production,
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Request body ceiling: the larger of the two upload limits, plus room
    /// for multipart framing and base64 expansion.
    pub fn body_limit(&self) -> usize {
        let largest = self.max_upload_bytes.max(self.max_avatar_bytes);
        largest + largest / 3 + 64 * 1024
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Config {
            baas_url: "http://baas.test".into(),
            baas_service_key: "service-key".into(),
            admin_key: "admin-secret".into(),
            geocode_url: "http://geocode.test/reverse".into(),
            geocode_api_key: None,
            http_timeout_secs: 1,
            avatar_bucket: "avatars".into(),
            upload_bucket: "uploads".into(),
            max_upload_bytes: 1024,
            max_avatar_bytes: 512,
            server_host: "127.0.0.1".into(),
            server_port: 0,
            production: false,
        }
    }
}

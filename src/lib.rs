use std::sync::Arc;

use backend::BackendService;
use config::Config;
use geocode::ReverseGeocoder;

pub mod audit;
pub mod backend;
pub mod common;
pub mod config;
pub mod error;
pub mod geocode;
pub mod middleware;
pub mod pagination;
pub mod result;
pub mod router;
pub mod routes;
pub mod saga;
pub mod utils;
pub mod validation;

#[cfg(test)]
mod test_support;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub backend: Arc<dyn BackendService>,
    pub geocoder: Arc<dyn ReverseGeocoder>,
}

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use luxbyte_functions::{
    AppState, backend::RestBackend, config::Config, geocode::HttpGeocoder, router::create_router,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration");
    if config.production {
        tracing::info!("Running in production mode, error details are redacted");
    } else {
        tracing::info!("Running in development mode, error details are returned");
    }

    let backend = RestBackend::new(
        &config.baas_url,
        &config.baas_service_key,
        config.http_timeout(),
    )
    .expect("Failed to build backend client");
    let geocoder = HttpGeocoder::new(
        &config.geocode_url,
        config.geocode_api_key.clone(),
        config.http_timeout(),
    )
    .expect("Failed to build geocoder client");

    let state = AppState {
        config: config.clone(),
        backend: Arc::new(backend),
        geocoder: Arc::new(geocoder),
    };
    let app = create_router(state);

    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app,
    )
    .await
    .expect("Failed to start server");
}

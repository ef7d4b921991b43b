//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{GeminiAdapter, GoogleCalendarAdapter, ObjectStoreGateway, UnavailableStore},
    config::Config,
    error::ApiError,
    web::{build_router, state::AppState},
};
use std::sync::Arc;
use syllabus_core::BlobStore;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize Storage ---
    // A broken storage configuration leaves the service up so the status probe can
    // report it; every storage-backed request then fails with a transport fault.
    let store: Arc<dyn BlobStore> = match ObjectStoreGateway::from_settings(&config.storage) {
        Ok(gateway) => Arc::new(gateway),
        Err(e) => {
            error!("Could not initialize storage. Check credentials and bucket config: {}", e);
            Arc::new(UnavailableStore)
        }
    };

    // --- 3. Initialize Service Adapters ---
    let model_client = reqwest::Client::builder()
        .timeout(config.gemini_timeout)
        .build()?;
    let model = Arc::new(GeminiAdapter::new(
        model_client,
        config.gemini_base_url.clone(),
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
    ));
    let calendar = Arc::new(GoogleCalendarAdapter::new(
        reqwest::Client::new(),
        config.calendar_base_url.clone(),
    ));

    // --- 4. Build the Shared AppState & Router ---
    let app_state = Arc::new(AppState::new(config.clone(), store, model, calendar));
    let app = build_router(app_state);

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

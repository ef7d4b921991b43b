pub mod protocol;
pub mod rest;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use rest::ApiDoc;
use state::AppState;

// Re-export the handlers to make them easily accessible to the binary.
pub use rest::{
    add_to_calendar_handler, extract_events_handler, status_handler, upload_local_test_handler,
    upload_pdf_handler,
};

/// Builds the complete application: API routes, CORS, body limit, and Swagger UI.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    // An unparseable origin allows no cross-origin callers rather than all of them.
    let allow_origin = match app_state.config.cors_allowed_origin.as_str() {
        "*" => AllowOrigin::any(),
        origin => AllowOrigin::list(origin.parse::<HeaderValue>().ok()),
    };
    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            ACCEPT,
            HeaderName::from_static("x-user-id"),
        ]);

    let api_router = Router::new()
        .route("/", get(status_handler))
        .route("/api/upload-pdf", post(upload_pdf_handler))
        .route("/api/upload-local-test", get(upload_local_test_handler))
        .route("/api/extract-events", post(extract_events_handler))
        .route("/api/add-to-calendar", post(add_to_calendar_handler))
        .layer(DefaultBodyLimit::max(app_state.config.max_upload_bytes))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

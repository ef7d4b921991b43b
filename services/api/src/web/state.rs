//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use std::sync::Arc;
use syllabus_core::{
    BlobStore, CalendarMaterializer, CalendarProvider, ExtractionModel, ExtractionOrchestrator,
    MaterializerSettings, UploadCoordinator,
};

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn BlobStore>,
    pub uploads: UploadCoordinator,
    pub extractor: ExtractionOrchestrator,
    pub materializer: CalendarMaterializer,
}

impl AppState {
    /// Wires the pipeline stages to the given adapters.
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn BlobStore>,
        model: Arc<dyn ExtractionModel>,
        calendar: Arc<dyn CalendarProvider>,
    ) -> Self {
        let settings = MaterializerSettings {
            timezone: config.calendar_timezone,
            ..MaterializerSettings::default()
        };

        Self {
            uploads: UploadCoordinator::new(store.clone()),
            extractor: ExtractionOrchestrator::new(store.clone(), model),
            materializer: CalendarMaterializer::new(calendar, settings),
            store,
            config,
        }
    }
}

//! Test helpers: build the router over an in-memory store and scripted model and
//! calendar adapters.
//!
//! Run with: `cargo test -p api --test api_test`

use api_lib::adapters::ObjectStoreGateway;
use bytes::Bytes;
use api_lib::config::Config;
use api_lib::web::{build_router, state::AppState};
use async_trait::async_trait;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use syllabus_core::{
    AccessToken, BlobStore, CalendarEventRequest, CalendarProvider, ExtractionModel,
    InferenceRequest, InsertedEvent, KeyStream, PortError, PortResult,
};

pub const PUBLIC_BASE_URL: &str = "https://storage.test/bucket";

pub const PDF_BYTES: &[u8] = b"%PDF-1.4 syllabus";

/// Replies with a fixed body to every generation request.
pub struct CannedModel {
    pub reply: String,
    pub requests: Mutex<Vec<InferenceRequest>>,
}

#[async_trait]
impl ExtractionModel for CannedModel {
    async fn generate(&self, request: &InferenceRequest) -> PortResult<String> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.reply.clone())
    }
}

/// Accepts every event except those whose summary is listed in `reject`. With
/// `token_expired` set, refuses the credential for every event.
#[derive(Default)]
pub struct RecordingCalendar {
    pub reject: Vec<String>,
    pub token_expired: bool,
    pub inserted: Mutex<Vec<(String, CalendarEventRequest)>>,
}

#[async_trait]
impl CalendarProvider for RecordingCalendar {
    async fn insert_event(
        &self,
        token: &AccessToken,
        event: &CalendarEventRequest,
    ) -> PortResult<InsertedEvent> {
        if self.token_expired {
            return Err(PortError::Unauthorized);
        }
        if self.reject.contains(&event.summary) {
            return Err(PortError::Transfer("HTTP 400: invalid event".to_string()));
        }
        let mut inserted = self.inserted.lock().unwrap();
        inserted.push((token.secret().to_string(), event.clone()));
        Ok(InsertedEvent {
            id: format!("evt{}", inserted.len()),
            link: None,
        })
    }
}

/// An object store whose reads fail for the listed keys.
pub struct FlakyStore {
    pub inner: ObjectStoreGateway,
    pub unreadable: Vec<String>,
}

#[async_trait]
impl BlobStore for FlakyStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> PortResult<String> {
        self.inner.put(key, bytes, content_type).await
    }

    async fn list(&self, prefix: &str) -> PortResult<KeyStream> {
        self.inner.list(prefix).await
    }

    async fn get_bytes(&self, key: &str) -> PortResult<Bytes> {
        if self.unreadable.iter().any(|k| k == key) {
            return Err(PortError::Transfer("connection reset".to_string()));
        }
        self.inner.get_bytes(key).await
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub model: Arc<CannedModel>,
    pub calendar: Arc<RecordingCalendar>,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

pub fn test_config(extra_vars: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = HashMap::from([
        ("STORAGE_BACKEND".to_string(), "memory".to_string()),
        ("STORAGE_PUBLIC_BASE_URL".to_string(), PUBLIC_BASE_URL.to_string()),
        ("GEMINI_API_KEY".to_string(), "test-key".to_string()),
    ]);
    for (name, value) in extra_vars {
        vars.insert(name.to_string(), value.to_string());
    }
    Config::from_lookup(|name| vars.get(name).cloned()).expect("test configuration should be valid")
}

pub fn setup_test_app(model_reply: &str, calendar: RecordingCalendar) -> TestApp {
    let store = Arc::new(ObjectStoreGateway::in_memory(PUBLIC_BASE_URL));
    setup_test_app_with(store, &[], model_reply, calendar)
}

/// Like `setup_test_app`, over a caller-chosen store and extra environment.
pub fn setup_test_app_with(
    store: Arc<dyn BlobStore>,
    extra_vars: &[(&str, &str)],
    model_reply: &str,
    calendar: RecordingCalendar,
) -> TestApp {
    let config = Arc::new(test_config(extra_vars));
    let model = Arc::new(CannedModel {
        reply: model_reply.to_string(),
        requests: Mutex::new(Vec::new()),
    });
    let calendar = Arc::new(calendar);

    let state = AppState::new(config, store, model.clone(), calendar.clone());
    let server = TestServer::new(build_router(Arc::new(state))).expect("test server");
    TestApp {
        server,
        model,
        calendar,
    }
}

pub fn pdf_form(names: &[&str]) -> MultipartForm {
    names.iter().fold(MultipartForm::new(), |form, name| {
        form.add_part(
            "files",
            Part::bytes(PDF_BYTES.to_vec())
                .file_name(name.to_string())
                .mime_type("application/pdf"),
        )
    })
}

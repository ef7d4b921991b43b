//! In-memory stand-ins for the ports, shared by the pipeline tests.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::domain::{AccessToken, CalendarEventRequest, InsertedEvent};
use crate::ports::{
    BlobStore, CalendarProvider, ExtractionModel, InferenceRequest, KeyStream, PortError,
    PortResult,
};

#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Bytes>>,
    broken_keys: HashSet<String>,
    fail_puts: bool,
    put_attempts: AtomicUsize,
}

impl MemoryStore {
    pub fn with_object(self, key: &str, bytes: &'static [u8]) -> Self {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), Bytes::from_static(bytes));
        self
    }

    /// Listed, but every fetch fails with a transfer error.
    pub fn with_broken_object(mut self, key: &str) -> Self {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), Bytes::new());
        self.broken_keys.insert(key.to_string());
        self
    }

    pub fn failing_puts(mut self) -> Self {
        self.fail_puts = true;
        self
    }

    pub fn put_attempts(&self) -> usize {
        self.put_attempts.load(Ordering::SeqCst)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn put(&self, key: &str, bytes: Bytes, _content_type: &str) -> PortResult<String> {
        self.put_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts {
            return Err(PortError::Transfer("disk full".to_string()));
        }
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        Ok(format!("https://storage.test/bucket/{}", key))
    }

    async fn list(&self, prefix: &str) -> PortResult<KeyStream> {
        let keys: Vec<PortResult<String>> = self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .map(Ok)
            .collect();
        Ok(Box::pin(stream::iter(keys)))
    }

    async fn get_bytes(&self, key: &str) -> PortResult<Bytes> {
        if self.broken_keys.contains(key) {
            return Err(PortError::Transfer(format!("connection reset reading {}", key)));
        }
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| PortError::NotFound(key.to_string()))
    }
}

/// Returns a fixed reply and remembers every request it saw.
pub struct ScriptedModel {
    reply: PortResult<String>,
    pub requests: Mutex<Vec<InferenceRequest>>,
}

impl ScriptedModel {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: PortError) -> Self {
        Self {
            reply: Err(error),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ExtractionModel for ScriptedModel {
    async fn generate(&self, request: &InferenceRequest) -> PortResult<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.reply.clone()
    }
}

/// Accepts every insert except those whose summary is in `rejected`.
#[derive(Default)]
pub struct ScriptedCalendar {
    rejected: HashSet<String>,
    pub inserted: Mutex<Vec<CalendarEventRequest>>,
}

impl ScriptedCalendar {
    pub fn rejecting(summary: &str) -> Self {
        Self {
            rejected: HashSet::from([summary.to_string()]),
            inserted: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CalendarProvider for ScriptedCalendar {
    async fn insert_event(
        &self,
        _token: &AccessToken,
        event: &CalendarEventRequest,
    ) -> PortResult<InsertedEvent> {
        if self.rejected.contains(&event.summary) {
            return Err(PortError::Transfer("HTTP 400: invalid event".to_string()));
        }
        let mut inserted = self.inserted.lock().unwrap();
        inserted.push(event.clone());
        let id = format!("evt{}", inserted.len());
        Ok(InsertedEvent {
            link: Some(format!("https://calendar.test/event?eid={}", id)),
            id,
        })
    }
}

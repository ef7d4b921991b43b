//! services/api/src/adapters/blob_store.rs
//!
//! This module contains the blob store gateway, the concrete implementation of the
//! `BlobStore` port. It wraps any `object_store` backend: Google Cloud Storage (where
//! Firebase Storage keeps its files) in production and `InMemory` for tests.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, TryStreamExt};
use object_store::{
    gcp::GoogleCloudStorageBuilder, memory::InMemory, path::Path, Attribute, Attributes,
    ObjectStore, PutOptions, PutPayload,
};
use std::sync::Arc;
use syllabus_core::ports::{BlobStore, KeyStream, PortError, PortResult};
use tracing::info;

use crate::config::StorageSettings;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A `BlobStore` over an `object_store` backend.
#[derive(Clone)]
pub struct ObjectStoreGateway {
    store: Arc<dyn ObjectStore>,
    public_base_url: String,
}

impl ObjectStoreGateway {
    /// Creates a gateway over an already-built store.
    pub fn new(store: Arc<dyn ObjectStore>, public_base_url: impl Into<String>) -> Self {
        Self {
            store,
            public_base_url: public_base_url.into(),
        }
    }

    pub fn in_memory(public_base_url: impl Into<String>) -> Self {
        Self::new(Arc::new(InMemory::new()), public_base_url)
    }

    /// Builds the configured backend once at startup.
    pub fn from_settings(settings: &StorageSettings) -> Result<Self, object_store::Error> {
        match settings {
            StorageSettings::Gcs {
                bucket,
                service_account_path,
                service_account_key,
                public_base_url,
            } => {
                let bucket = bucket.as_deref().ok_or_else(|| object_store::Error::Generic {
                    store: "GCS",
                    source: "FIREBASE_STORAGE_BUCKET is not set".into(),
                })?;
                let mut builder = GoogleCloudStorageBuilder::from_env().with_bucket_name(bucket);
                if let Some(path) = service_account_path {
                    builder = builder.with_service_account_path(path.to_string_lossy());
                }
                if let Some(key) = service_account_key {
                    builder = builder.with_service_account_key(key);
                }
                let store = builder.build()?;
                info!(bucket = %bucket, "Google Cloud Storage gateway initialized");
                Ok(Self::new(Arc::new(store), public_base_url.clone()))
            }
            StorageSettings::Memory { public_base_url } => {
                info!("In-memory storage gateway initialized");
                Ok(Self::in_memory(public_base_url.clone()))
            }
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), key)
    }

    fn location(key: &str) -> PortResult<Path> {
        Path::parse(key)
            .map_err(|e| PortError::Unexpected(format!("Invalid storage key {}: {}", key, e)))
    }
}

fn map_store_error(key: &str, err: object_store::Error) -> PortError {
    match err {
        object_store::Error::NotFound { .. } => PortError::NotFound(key.to_string()),
        other => PortError::Transfer(other.to_string()),
    }
}

//=========================================================================================
// `BlobStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl BlobStore for ObjectStoreGateway {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> PortResult<String> {
        let location = Self::location(key)?;

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        self.store
            .put_opts(&location, PutPayload::from(bytes), options)
            .await
            .map_err(|e| map_store_error(key, e))?;

        Ok(self.public_url(key))
    }

    async fn list(&self, prefix: &str) -> PortResult<KeyStream> {
        // object_store matches whole path segments, so `u1/pdfs/` and `u1/pdfs` agree.
        // Parsed like `location` so the prefix is spelled exactly as stored keys are.
        let prefix_path = Self::location(prefix.trim_end_matches('/'))?;
        let keys: Vec<String> = self
            .store
            .list(Some(&prefix_path))
            .map_ok(|meta| meta.location.to_string())
            .try_collect()
            .await
            .map_err(|e| map_store_error(prefix, e))?;

        Ok(Box::pin(stream::iter(keys.into_iter().map(Ok))))
    }

    async fn get_bytes(&self, key: &str) -> PortResult<Bytes> {
        let location = Self::location(key)?;
        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| map_store_error(key, e))?;
        result.bytes().await.map_err(|e| map_store_error(key, e))
    }
}

//=========================================================================================
// Fallback When Storage Could Not Be Initialized
//=========================================================================================

/// Stands in for the gateway when the backend failed to initialize at startup, so the
/// service can still answer the status probe. Every operation fails.
#[derive(Clone, Default)]
pub struct UnavailableStore;

impl UnavailableStore {
    fn error() -> PortError {
        PortError::Unexpected("Storage backend is not initialized".to_string())
    }
}

#[async_trait]
impl BlobStore for UnavailableStore {
    async fn put(&self, _key: &str, _bytes: Bytes, _content_type: &str) -> PortResult<String> {
        Err(Self::error())
    }

    async fn list(&self, _prefix: &str) -> PortResult<KeyStream> {
        Err(Self::error())
    }

    async fn get_bytes(&self, _key: &str) -> PortResult<Bytes> {
        Err(Self::error())
    }

    fn is_ready(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn put_then_get_returns_the_same_bytes_and_a_public_url() {
        let gateway = ObjectStoreGateway::in_memory("https://storage.googleapis.com/bucket/");
        let url = gateway
            .put("u1/pdfs/a.pdf", Bytes::from_static(b"%PDF-1.7"), "application/pdf")
            .await
            .unwrap();

        assert_eq!(url, "https://storage.googleapis.com/bucket/u1/pdfs/a.pdf");
        assert_eq!(
            gateway.get_bytes("u1/pdfs/a.pdf").await.unwrap(),
            Bytes::from_static(b"%PDF-1.7")
        );
    }

    #[tokio::test]
    async fn list_is_scoped_to_the_prefix() {
        let gateway = ObjectStoreGateway::in_memory("http://files");
        for key in ["u1/pdfs/a.pdf", "u1/pdfs/b.pdf", "u12/pdfs/c.pdf", "u2/pdfs/d.pdf"] {
            gateway
                .put(key, Bytes::from_static(b"%PDF"), "application/pdf")
                .await
                .unwrap();
        }

        let mut keys: Vec<String> = gateway
            .list("u1/pdfs/")
            .await
            .unwrap()
            .map(|k| k.unwrap())
            .collect()
            .await;
        keys.sort();
        assert_eq!(keys, vec!["u1/pdfs/a.pdf", "u1/pdfs/b.pdf"]);
    }

    #[tokio::test]
    async fn keys_with_reserved_characters_list_back_as_stored() {
        let gateway = ObjectStoreGateway::in_memory("http://files");
        for key in ["user#1/pdfs/a.pdf", "50%off/pdfs/b.pdf"] {
            gateway
                .put(key, Bytes::from_static(b"%PDF"), "application/pdf")
                .await
                .unwrap();
        }

        let hashed: Vec<String> = gateway
            .list("user#1/pdfs/")
            .await
            .unwrap()
            .map(|k| k.unwrap())
            .collect()
            .await;
        assert_eq!(hashed, vec!["user#1/pdfs/a.pdf"]);

        let percent: Vec<String> = gateway
            .list("50%off/pdfs/")
            .await
            .unwrap()
            .map(|k| k.unwrap())
            .collect()
            .await;
        assert_eq!(percent, vec!["50%off/pdfs/b.pdf"]);
        assert!(gateway.get_bytes(&percent[0]).await.is_ok());
    }

    #[tokio::test]
    async fn empty_listing_is_not_an_error() {
        let gateway = ObjectStoreGateway::in_memory("http://files");
        let keys: Vec<_> = gateway.list("nobody/pdfs/").await.unwrap().collect().await;
        assert!(keys.is_empty());
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let gateway = ObjectStoreGateway::in_memory("http://files");
        let err = gateway.get_bytes("u1/pdfs/missing.pdf").await.unwrap_err();
        assert_eq!(err, PortError::NotFound("u1/pdfs/missing.pdf".to_string()));
    }

    #[test]
    fn gcs_without_a_bucket_fails_to_build() {
        let settings = StorageSettings::Gcs {
            bucket: None,
            service_account_path: None,
            service_account_key: None,
            public_base_url: "https://storage.googleapis.com/".to_string(),
        };
        let err = ObjectStoreGateway::from_settings(&settings).err().unwrap();
        assert!(err.to_string().contains("FIREBASE_STORAGE_BUCKET"));
    }

    #[tokio::test]
    async fn unavailable_store_reports_not_ready() {
        let store = UnavailableStore;
        assert!(!store.is_ready());
        assert!(store.list("u1/pdfs/").await.is_err());
    }
}

//! crates/syllabus_core/src/pipeline/upload.rs
//!
//! The upload coordinator: validates each incoming file on its own and persists the
//! valid ones under `{user_id}/pdfs/{uuid}{ext}`. A failure for one file never rolls
//! back or blocks its siblings.

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use super::{
    documents_prefix, has_pdf_extension, validate_user_id, PipelineError, DEFAULT_CONCURRENCY,
};
use crate::domain::{Document, UploadBatch, UploadOutcome, UploadRejection};
use crate::ports::BlobStore;

pub const ACCEPTED_EXTENSION: &str = ".pdf";
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// A named file as received from the client.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub filename: String,
    pub bytes: Bytes,
}

impl IncomingFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// Builds a fresh, collision-resistant key for an accepted filename.
///
/// The extension is kept exactly as the client sent it (`.pdf` or `.PDF`).
pub fn generate_storage_key(user_id: &str, filename: &str) -> String {
    let ext = filename
        .len()
        .checked_sub(ACCEPTED_EXTENSION.len())
        .and_then(|start| filename.get(start..))
        .filter(|ext| ext.eq_ignore_ascii_case(ACCEPTED_EXTENSION))
        .unwrap_or(ACCEPTED_EXTENSION);
    format!("{}{}{}", documents_prefix(user_id), Uuid::new_v4(), ext)
}

fn validate_filename(filename: &str) -> Result<(), UploadRejection> {
    if filename.trim().is_empty() {
        return Err(UploadRejection::EmptyName);
    }
    if !has_pdf_extension(filename) {
        return Err(UploadRejection::InvalidType);
    }
    Ok(())
}

#[derive(Clone)]
pub struct UploadCoordinator {
    store: Arc<dyn BlobStore>,
    concurrency: usize,
}

impl UploadCoordinator {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Stores every valid file of the batch and reports one outcome per file, in order.
    pub async fn upload_batch(
        &self,
        user_id: &str,
        files: Vec<IncomingFile>,
    ) -> Result<UploadBatch, PipelineError> {
        validate_user_id(user_id)?;
        if files.is_empty() {
            return Err(PipelineError::NoFiles);
        }

        let outcomes = stream::iter(files)
            .map(|file| self.upload_one(user_id, file))
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        Ok(UploadBatch { outcomes })
    }

    async fn upload_one(&self, user_id: &str, file: IncomingFile) -> UploadOutcome {
        let IncomingFile { filename, bytes } = file;

        if let Err(reason) = validate_filename(&filename) {
            return UploadOutcome::Rejected { filename, reason };
        }

        let storage_key = generate_storage_key(user_id, &filename);
        let size_bytes = bytes.len() as u64;

        match self.store.put(&storage_key, bytes, PDF_CONTENT_TYPE).await {
            Ok(public_url) => {
                info!(user_id, storage_key = %storage_key, size_bytes, "PDF uploaded");
                UploadOutcome::Uploaded(Document {
                    storage_key,
                    original_filename: filename,
                    size_bytes,
                    public_url,
                })
            }
            Err(e) => {
                error!(user_id, storage_key = %storage_key, "Storage upload failed: {}", e);
                UploadOutcome::Rejected {
                    filename,
                    reason: UploadRejection::Storage(e.to_string()),
                }
            }
        }
    }
}

//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between the browser client and the API server.
//! Field names follow the frontend's camelCase convention.

use serde::{Deserialize, Serialize};
use syllabus_core::{
    validate_event, CalendarOutcome, Document, ExtractedEvent, MaterializationReport,
    SkippedDocument, UploadBatch,
};
use utoipa::ToSchema;

//=========================================================================================
// Events (shared by extraction responses and calendar requests)
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct EventStart {
    /// Calendar date, `YYYY-MM-DD`.
    pub date: String,
    /// Local wall time, `HH:MM`. Absent for all-day events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct EventPayload {
    pub summary: String,
    #[serde(default)]
    pub description: String,
    pub start: EventStart,
}

impl From<&ExtractedEvent> for EventPayload {
    fn from(event: &ExtractedEvent) -> Self {
        Self {
            summary: event.summary.clone(),
            description: event.description.clone().unwrap_or_default(),
            start: EventStart {
                date: event.date.format("%Y-%m-%d").to_string(),
                time: event.time.map(|t| t.format("%H:%M").to_string()),
            },
        }
    }
}

impl EventPayload {
    pub fn to_event(&self) -> Result<ExtractedEvent, String> {
        validate_event(
            &self.summary,
            Some(&self.description),
            &self.start.date,
            self.start.time.as_deref(),
        )
    }
}

//=========================================================================================
// Upload
//=========================================================================================

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub filename: String,
    pub storage_path: String,
    pub public_url: String,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct FileError {
    pub filename: String,
    pub error: String,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct UploadResponse {
    pub message: String,
    pub files: Vec<UploadedFile>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FileError>,
}

impl From<&Document> for UploadedFile {
    fn from(doc: &Document) -> Self {
        Self {
            filename: doc.original_filename.clone(),
            storage_path: doc.storage_key.clone(),
            public_url: doc.public_url.clone(),
        }
    }
}

impl From<&UploadBatch> for UploadResponse {
    fn from(batch: &UploadBatch) -> Self {
        let message = if batch.all_succeeded() {
            format!("PDF(s) uploaded successfully. {}", batch.summary())
        } else {
            format!("Some files failed to upload. {}", batch.summary())
        };
        Self {
            message,
            files: batch.uploaded().map(UploadedFile::from).collect(),
            errors: batch
                .rejected()
                .map(|(filename, reason)| FileError {
                    filename: filename.to_string(),
                    error: reason.to_string(),
                })
                .collect(),
        }
    }
}

//=========================================================================================
// Extraction
//=========================================================================================

#[derive(Deserialize, ToSchema, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExtractRequest {
    /// IANA zone the extracted times are local to. Defaults to the configured zone.
    #[serde(default)]
    pub timezone: Option<String>,
    /// Calendar token; only echoed back as `calendarReady`.
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SkippedFile {
    pub storage_path: String,
    pub reason: String,
}

impl From<&SkippedDocument> for SkippedFile {
    fn from(skipped: &SkippedDocument) -> Self {
        Self {
            storage_path: skipped.storage_key.clone(),
            reason: skipped.reason.clone(),
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResponse {
    pub summary: String,
    pub events: Vec<EventPayload>,
    pub skipped: Vec<SkippedFile>,
    /// Whether a calendar token accompanied the request.
    pub calendar_ready: bool,
}

//=========================================================================================
// Calendar
//=========================================================================================

#[derive(Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AddToCalendarRequest {
    #[serde(default)]
    pub events: Vec<EventPayload>,
    /// Google OAuth token. May instead be sent as `Authorization: Bearer`.
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct CreatedEvent {
    pub id: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct EventError {
    pub summary: String,
    pub error: String,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct AddToCalendarResponse {
    pub message: String,
    pub events: Vec<CreatedEvent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<EventError>,
}

impl From<&MaterializationReport> for AddToCalendarResponse {
    fn from(report: &MaterializationReport) -> Self {
        let mut events = Vec::new();
        let mut errors = Vec::new();
        for outcome in &report.outcomes {
            match outcome {
                CalendarOutcome::Created { id, summary, link } => events.push(CreatedEvent {
                    id: id.clone(),
                    summary: summary.clone(),
                    link: link.clone(),
                }),
                CalendarOutcome::Failed { summary, error, .. } => errors.push(EventError {
                    summary: summary.clone(),
                    error: error.clone(),
                }),
            }
        }
        Self {
            message: report.summary(),
            events,
            errors,
        }
    }
}

//=========================================================================================
// Status
//=========================================================================================

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
    pub storage_initialized: bool,
}

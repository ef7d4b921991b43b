//! crates/syllabus_core/src/domain.rs
//!
//! Defines the pure, core data structures for the pipeline.
//! These structs are independent of any storage provider or wire format.

use chrono::{DateTime, NaiveDate, NaiveTime};
use chrono_tz::Tz;
use std::fmt;

use crate::ports::PortError;

//=========================================================================================
// Documents & Uploads
//=========================================================================================

/// A syllabus PDF persisted under a user's namespace in the blob store.
///
/// Documents are never mutated after creation; the storage key is unique per upload
/// so re-uploading the same filename produces a second, independent document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub storage_key: String,
    pub original_filename: String,
    pub size_bytes: u64,
    pub public_url: String,
}

/// Why a single file in an upload batch was not stored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadRejection {
    #[error("No file selected.")]
    EmptyName,
    #[error("Invalid file type. Only PDF files are accepted.")]
    InvalidType,
    #[error("Failed to upload file to storage: {0}")]
    Storage(String),
}

impl UploadRejection {
    /// Validation rejections never touched storage; storage rejections did.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::EmptyName | Self::InvalidType)
    }
}

/// The outcome for one file of an upload batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded(Document),
    Rejected {
        filename: String,
        reason: UploadRejection,
    },
}

/// Per-file outcomes of one upload call, in the order the files were submitted.
#[derive(Debug, Clone, Default)]
pub struct UploadBatch {
    pub outcomes: Vec<UploadOutcome>,
}

impl UploadBatch {
    pub fn uploaded(&self) -> impl Iterator<Item = &Document> {
        self.outcomes.iter().filter_map(|o| match o {
            UploadOutcome::Uploaded(doc) => Some(doc),
            UploadOutcome::Rejected { .. } => None,
        })
    }

    pub fn rejected(&self) -> impl Iterator<Item = (&str, &UploadRejection)> {
        self.outcomes.iter().filter_map(|o| match o {
            UploadOutcome::Rejected { filename, reason } => Some((filename.as_str(), reason)),
            UploadOutcome::Uploaded(_) => None,
        })
    }

    pub fn all_succeeded(&self) -> bool {
        !self.outcomes.is_empty() && self.rejected().next().is_none()
    }

    pub fn summary(&self) -> String {
        format!(
            "Uploaded {} of {} file(s).",
            self.uploaded().count(),
            self.outcomes.len()
        )
    }
}

//=========================================================================================
// Extraction
//=========================================================================================

/// A dated item pulled out of a syllabus by the language model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEvent {
    pub summary: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    /// Local wall-clock time; `None` means an all-day item.
    pub time: Option<NaiveTime>,
}

/// A stored document that could not be included in the inference request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDocument {
    pub storage_key: String,
    pub reason: String,
}

/// The result of one extraction run over all of a user's documents.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub events: Vec<ExtractedEvent>,
    pub documents_read: usize,
    pub skipped: Vec<SkippedDocument>,
    /// Entries the model returned that failed validation.
    pub dropped_entries: usize,
}

impl Extraction {
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Extracted {} event(s) from {} document(s).",
            self.events.len(),
            self.documents_read
        );
        if !self.skipped.is_empty() {
            summary.push_str(&format!(" Skipped {} unreadable document(s).", self.skipped.len()));
        }
        if self.dropped_entries > 0 {
            summary.push_str(&format!(" Dropped {} invalid entr(ies).", self.dropped_entries));
        }
        summary
    }
}

//=========================================================================================
// Calendar
//=========================================================================================

/// An OAuth access token for the calendar provider. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderMethod {
    Popup,
}

impl ReminderMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Popup => "popup",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reminder {
    pub method: ReminderMethod,
    pub minutes_before: u32,
}

impl Reminder {
    pub fn popup(minutes_before: u32) -> Self {
        Self {
            method: ReminderMethod::Popup,
            minutes_before,
        }
    }
}

/// When a calendar event happens.
#[derive(Debug, Clone, PartialEq)]
pub enum EventTiming {
    Timed { start: DateTime<Tz>, end: DateTime<Tz> },
    /// Start and end are both inclusive calendar dates.
    AllDay { start: NaiveDate, end: NaiveDate },
}

/// A provider-neutral calendar insert derived 1:1 from an `ExtractedEvent`.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEventRequest {
    pub summary: String,
    pub description: Option<String>,
    pub timing: EventTiming,
    pub reminders: Vec<Reminder>,
}

/// What the provider hands back for an accepted insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertedEvent {
    pub id: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarOutcome {
    Created {
        id: String,
        summary: String,
        link: Option<String>,
    },
    Failed {
        summary: String,
        error: String,
        /// The provider's error, when the event got as far as the provider.
        cause: Option<PortError>,
    },
}

/// Per-event outcomes of one materialization call, in input order.
#[derive(Debug, Clone, Default)]
pub struct MaterializationReport {
    pub outcomes: Vec<CalendarOutcome>,
}

impl MaterializationReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, CalendarOutcome::Created { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }

    /// True when nothing was added and the provider refused the credential for every
    /// event it was asked to insert.
    pub fn credential_rejected(&self) -> bool {
        let mut causes = self.outcomes.iter().filter_map(|o| match o {
            CalendarOutcome::Failed { cause, .. } => cause.as_ref(),
            CalendarOutcome::Created { .. } => None,
        });
        self.succeeded() == 0
            && causes.next() == Some(&PortError::Unauthorized)
            && causes.all(|c| *c == PortError::Unauthorized)
    }

    pub fn summary(&self) -> String {
        if self.all_succeeded() {
            format!("Successfully added {} event(s) to calendar.", self.succeeded())
        } else {
            format!(
                "Added {} event(s) to calendar; {} failed.",
                self.succeeded(),
                self.failed()
            )
        }
    }
}

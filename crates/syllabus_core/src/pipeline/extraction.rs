//! crates/syllabus_core/src/pipeline/extraction.rs
//!
//! The extraction orchestrator. Everything a user has stored goes to the model in one
//! request, and the reply is decoded in two separate stages:
//!
//! 1. `normalize_response` tolerates surrounding whitespace and markdown fences.
//! 2. `parse_events` is strict about the top-level shape, then validates each entry
//!    on its own so one bad entry cannot void its siblings.

use chrono::{NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use futures::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::upload::PDF_CONTENT_TYPE;
use super::{documents_prefix, has_pdf_extension, validate_user_id, PipelineError};
use crate::domain::{ExtractedEvent, Extraction, SkippedDocument};
use crate::ports::{BlobStore, ExtractionModel, InferenceRequest, InlineAttachment};

const EXTRACTION_INSTRUCTIONS: &str = r#"You are given one or more course syllabi as PDF attachments.

Find every dated item a student would want on their calendar: exams, midterms, finals,
quizzes, assignment and project deadlines, presentations, and other graded or required
events. Consider all attached syllabi together.

Return ONLY a JSON object with exactly this shape:
{"events":[{"summary":string,"description":string,"start":{"date":"YYYY-MM-DD","time":"HH:MM"}}]}

Rules:
- "summary" starts with the course name, e.g. "Biology 101 - Midterm".
- "description" briefly says what the item is; use "" if there is nothing to add.
- "date" is a full calendar date in YYYY-MM-DD form.
- "time" is a 24-hour local time in HH:MM form. OMIT "time" entirely for all-day items
  or when the syllabus gives no time.
- Times are local to the {timezone} time zone.
- Today is {today}. When a syllabus omits the year, pick the year that places the
  item in the current or upcoming academic term.
- If there are no dated items, return {"events":[]}.
- Do not add prose, explanations, or markdown code fences."#;

/// The fixed instruction sent with every extraction request.
pub fn build_prompt(timezone: Tz, today: NaiveDate) -> String {
    EXTRACTION_INSTRUCTIONS
        .replace("{timezone}", timezone.name())
        .replace("{today}", &today.format("%Y-%m-%d").to_string())
}

//=========================================================================================
// Stage 1: tolerant normalization
//=========================================================================================

/// Trims the reply and strips one surrounding markdown fence, with or without a
/// language tag. Text without a leading fence is returned trimmed but otherwise as-is.
pub fn normalize_response(raw: &str) -> &str {
    let text = raw.trim();
    let Some(body) = text.strip_prefix("```") else {
        return text;
    };
    let body = body.strip_suffix("```").unwrap_or(body);

    // The opening fence line may carry an info string such as `json`.
    let body = match body.find('\n') {
        Some(idx) if !body[..idx].trim_start().starts_with(['{', '[']) => &body[idx + 1..],
        Some(_) => body,
        None => body.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
    body.trim()
}

//=========================================================================================
// Stage 2: strict parse, per-entry validation
//=========================================================================================

/// The model's reply could not be read as the contracted JSON shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Model response was not valid event JSON: {reason}")]
pub struct MalformedResponse {
    /// The reply exactly as the model sent it.
    pub raw: String,
    pub reason: String,
}

#[derive(Deserialize)]
struct EventsEnvelope {
    events: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct EventEntry {
    summary: String,
    #[serde(default)]
    description: Option<String>,
    start: EventStart,
}

#[derive(Deserialize)]
struct EventStart {
    date: String,
    #[serde(default)]
    time: Option<String>,
}

/// Validated events plus how many entries were thrown away.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedEvents {
    pub events: Vec<ExtractedEvent>,
    pub dropped: usize,
}

/// Parses normalized text. Fails only when the top-level shape is wrong; invalid
/// entries are counted in `dropped`.
pub fn parse_events(text: &str) -> Result<ParsedEvents, serde_json::Error> {
    let envelope: EventsEnvelope = serde_json::from_str(text)?;
    let mut parsed = ParsedEvents::default();

    for (index, value) in envelope.events.into_iter().enumerate() {
        match serde_json::from_value::<EventEntry>(value)
            .map_err(|e| e.to_string())
            .and_then(|entry| {
                validate_event(
                    &entry.summary,
                    entry.description.as_deref(),
                    &entry.start.date,
                    entry.start.time.as_deref(),
                )
            })
        {
            Ok(event) => parsed.events.push(event),
            Err(reason) => {
                warn!(index, "Dropping invalid event entry: {}", reason);
                parsed.dropped += 1;
            }
        }
    }
    Ok(parsed)
}

/// Both stages together; a failure carries the original reply.
pub fn decode_response(raw: &str) -> Result<ParsedEvents, MalformedResponse> {
    parse_events(normalize_response(raw)).map_err(|e| MalformedResponse {
        raw: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Applies the `ExtractedEvent` invariants to loosely-typed fields, whether they came
/// from the model or from a client.
pub fn validate_event(
    summary: &str,
    description: Option<&str>,
    date: &str,
    time: Option<&str>,
) -> Result<ExtractedEvent, String> {
    let summary = summary.trim();
    if summary.is_empty() {
        return Err("summary is empty".to_string());
    }

    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|e| format!("invalid date {:?}: {}", date, e))?;

    let time = match time.map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(parse_wall_time(raw)?),
    };

    let description = description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string);

    Ok(ExtractedEvent {
        summary: summary.to_string(),
        description,
        date,
        time,
    })
}

/// Accepts `HH:MM` and `HH:MM:SS`.
pub fn parse_wall_time(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|e| format!("invalid time {:?}: {}", raw, e))
}

//=========================================================================================
// The Orchestrator
//=========================================================================================

#[derive(Clone)]
pub struct ExtractionOrchestrator {
    store: Arc<dyn BlobStore>,
    model: Arc<dyn ExtractionModel>,
}

impl ExtractionOrchestrator {
    pub fn new(store: Arc<dyn BlobStore>, model: Arc<dyn ExtractionModel>) -> Self {
        Self { store, model }
    }

    /// Sends every PDF stored for `user_id` to the model in a single request and
    /// returns the validated events.
    pub async fn extract(&self, user_id: &str, timezone: Tz) -> Result<Extraction, PipelineError> {
        validate_user_id(user_id)?;

        let prefix = documents_prefix(user_id);
        let mut listing = self.store.list(&prefix).await?;
        let mut keys = Vec::new();
        while let Some(key) = listing.next().await {
            keys.push(key?);
        }
        if keys.is_empty() {
            return Err(PipelineError::NoDocuments(user_id.to_string()));
        }

        let mut attachments = Vec::new();
        let mut skipped = Vec::new();
        for key in keys.into_iter().filter(|k| has_pdf_extension(k)) {
            match self.store.get_bytes(&key).await {
                Ok(data) => attachments.push(InlineAttachment {
                    mime_type: PDF_CONTENT_TYPE.to_string(),
                    data,
                }),
                Err(e) => {
                    warn!(user_id, storage_key = %key, "Skipping unreadable document: {}", e);
                    skipped.push(SkippedDocument {
                        storage_key: key,
                        reason: e.to_string(),
                    });
                }
            }
        }
        if attachments.is_empty() {
            return Err(PipelineError::NoDocuments(user_id.to_string()));
        }

        let documents_read = attachments.len();
        let today = Utc::now().with_timezone(&timezone).date_naive();
        let request = InferenceRequest {
            prompt: build_prompt(timezone, today),
            attachments,
        };

        info!(user_id, documents = documents_read, "Requesting event extraction");
        let raw = self.model.generate(&request).await?;
        let parsed = decode_response(&raw)?;

        info!(
            user_id,
            events = parsed.events.len(),
            dropped = parsed.dropped,
            "Extraction complete"
        );
        Ok(Extraction {
            events: parsed.events,
            documents_read,
            skipped,
            dropped_entries: parsed.dropped,
        })
    }
}

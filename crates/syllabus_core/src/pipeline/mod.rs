//! crates/syllabus_core/src/pipeline/mod.rs
//!
//! The three stages of the syllabus pipeline: uploading PDFs, extracting events from
//! everything a user has stored, and materializing those events as calendar entries.
//!
//! Per-item failures (one file, one event) are folded into the stage's report.
//! Only failures that make the whole request meaningless surface as `PipelineError`.

pub mod calendar;
pub mod extraction;
pub mod upload;

#[cfg(test)]
pub(crate) mod fakes;

use crate::ports::PortError;
use extraction::MalformedResponse;

/// How many files or events a stage works on at once. Output order is unaffected.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// The broad class of a request-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Transport,
    MalformedResponse,
}

/// A failure that aborts a whole pipeline request.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("No files were provided.")]
    NoFiles,
    #[error("Invalid user id: {0:?}")]
    InvalidUserId(String),
    #[error("No PDF documents found for user {0}.")]
    NoDocuments(String),
    #[error("No events provided.")]
    NoEventsProvided,
    #[error("A calendar access token is required.")]
    MissingCredential,
    #[error(transparent)]
    Malformed(#[from] MalformedResponse),
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoFiles
            | Self::InvalidUserId(_)
            | Self::NoEventsProvided
            | Self::MissingCredential => ErrorKind::Validation,
            Self::NoDocuments(_) => ErrorKind::NotFound,
            Self::Malformed(_) => ErrorKind::MalformedResponse,
            Self::Port(_) => ErrorKind::Transport,
        }
    }
}

/// User ids become the first segment of every storage key, so they must be a single
/// non-empty path segment.
pub(crate) fn validate_user_id(user_id: &str) -> Result<(), PipelineError> {
    let trimmed = user_id.trim();
    let reserved = matches!(user_id, "." | "..");
    if trimmed.is_empty() || trimmed != user_id || user_id.contains('/') || reserved {
        return Err(PipelineError::InvalidUserId(user_id.to_string()));
    }
    Ok(())
}

/// The prefix under which all of a user's PDFs live.
pub fn documents_prefix(user_id: &str) -> String {
    format!("{}/pdfs/", user_id)
}

/// Case-insensitive check for the one accepted document extension.
pub fn has_pdf_extension(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(upload::ACCEPTED_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_ids_must_be_a_single_segment() {
        assert!(validate_user_id("u1").is_ok());
        assert!(validate_user_id("anonymous_user").is_ok());
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id(" u1").is_err());
        assert!(validate_user_id("a/b").is_err());
        assert!(validate_user_id("..").is_err());
        assert!(validate_user_id(".").is_err());
        assert!(validate_user_id("user#1").is_ok());
    }

    #[test]
    fn error_kinds_separate_nothing_to_do_from_faults() {
        assert_eq!(
            PipelineError::NoDocuments("u1".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            PipelineError::Port(PortError::Transfer("reset".into())).kind(),
            ErrorKind::Transport
        );
        assert_eq!(PipelineError::NoEventsProvided.kind(), ErrorKind::Validation);
    }

    #[test]
    fn pdf_extension_is_case_insensitive() {
        assert!(has_pdf_extension("Syllabus.PDF"));
        assert!(has_pdf_extension("u1/pdfs/abc.pdf"));
        assert!(!has_pdf_extension("notes.pdf.txt"));
        assert!(!has_pdf_extension("pdf"));
    }
}

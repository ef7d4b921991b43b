pub mod domain;
pub mod pipeline;
pub mod ports;

pub use domain::{
    AccessToken, CalendarEventRequest, CalendarOutcome, Document, EventTiming, ExtractedEvent,
    Extraction, InsertedEvent, MaterializationReport, Reminder, ReminderMethod, SkippedDocument,
    UploadBatch, UploadOutcome, UploadRejection,
};
pub use pipeline::calendar::{CalendarMaterializer, MaterializerSettings, DEFAULT_TIMEZONE};
pub use pipeline::extraction::{validate_event, ExtractionOrchestrator, MalformedResponse};
pub use pipeline::upload::{IncomingFile, UploadCoordinator};
pub use pipeline::{ErrorKind, PipelineError};
pub use ports::{
    BlobStore, CalendarProvider, ExtractionModel, InferenceRequest, InlineAttachment, KeyStream,
    PortError, PortResult,
};

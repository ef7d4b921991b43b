//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::{ErrorBody, HttpError};
use crate::web::protocol::{
    AddToCalendarRequest, AddToCalendarResponse, CreatedEvent, EventError, EventPayload,
    EventStart, ExtractRequest, ExtractResponse, FileError, SkippedFile, StatusResponse,
    UploadResponse, UploadedFile,
};
use crate::web::state::AppState;
use axum::{
    body::Bytes,
    extract::{Multipart, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono_tz::Tz;
use std::sync::Arc;
use syllabus_core::{
    AccessToken, CalendarOutcome, IncomingFile, MaterializationReport, PipelineError, UploadBatch,
};
use tracing::info;
use utoipa::OpenApi;

/// Used when a request carries no `x-user-id` header.
pub const ANONYMOUS_USER: &str = "anonymous_user";
/// Owner of files uploaded through the local test endpoint.
pub const LOCAL_TEST_USER: &str = "local_test_user";

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        status_handler,
        upload_pdf_handler,
        upload_local_test_handler,
        extract_events_handler,
        add_to_calendar_handler,
    ),
    components(
        schemas(
            StatusResponse, UploadResponse, UploadedFile, FileError, ExtractRequest,
            ExtractResponse, EventPayload, EventStart, SkippedFile, AddToCalendarRequest,
            AddToCalendarResponse, CreatedEvent, EventError, ErrorBody
        )
    ),
    tags(
        (name = "Syllabus Calendar API", description = "Upload syllabus PDFs, extract exam and deadline dates, and add them to Google Calendar.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Request Helpers
//=========================================================================================

fn user_id_from(headers: &HeaderMap) -> String {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(ANONYMOUS_USER)
        .to_string()
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// A token from the body wins over one in the `Authorization` header.
fn resolve_token(body_token: Option<&str>, headers: &HeaderMap) -> Option<String> {
    body_token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or_else(|| bearer_token(headers))
}

fn parse_timezone(name: Option<&str>, default: Tz) -> Result<Tz, HttpError> {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name
            .parse::<Tz>()
            .map_err(|_| HttpError::BadRequest(format!("Unknown time zone: {}", name))),
        None => Ok(default),
    }
}

/// 200 when every file was stored; otherwise the full breakdown with a status that
/// tells partial failure apart from total failure.
fn upload_response(batch: &UploadBatch) -> Response {
    let status = if batch.all_succeeded() {
        StatusCode::OK
    } else if batch.rejected().any(|(_, reason)| !reason.is_validation()) {
        StatusCode::INTERNAL_SERVER_ERROR
    } else if batch.uploaded().next().is_none() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::MULTI_STATUS
    };
    (status, Json(UploadResponse::from(batch))).into_response()
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service is running", body = StatusResponse))
)]
pub async fn status_handler(State(app_state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
        message: "PDF Upload API is running.".to_string(),
        storage_initialized: app_state.store.is_ready(),
    })
}

/// Upload one or more syllabus PDFs.
///
/// Accepts a multipart/form-data request; every part with a filename is treated as a
/// file. The optional `x-user-id` header selects the user's namespace.
#[utoipa::path(
    post,
    path = "/api/upload-pdf",
    request_body(content_type = "multipart/form-data", description = "One or more PDF files."),
    responses(
        (status = 200, description = "All files uploaded", body = UploadResponse),
        (status = 207, description = "Some files uploaded, some rejected", body = UploadResponse),
        (status = 400, description = "No files, or every file was rejected", body = UploadResponse),
        (status = 500, description = "Storage failure for at least one file", body = UploadResponse)
    ),
    params(
        ("x-user-id" = Option<String>, Header, description = "Owner of the uploaded files.")
    )
)]
pub async fn upload_pdf_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, HttpError> {
    let user_id = user_id_from(&headers);

    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| HttpError::BadRequest(format!("Failed to read multipart data: {}", e)))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| HttpError::BadRequest(format!("Failed to read file bytes: {}", e)))?;
        files.push(IncomingFile::new(filename, bytes));
    }

    let batch = app_state.uploads.upload_batch(&user_id, files).await?;
    info!(user_id = %user_id, "{}", batch.summary());
    Ok(upload_response(&batch))
}

/// Upload the PDF at `TEST_PDF_PATH` for the local test user.
#[utoipa::path(
    get,
    path = "/api/upload-local-test",
    responses(
        (status = 200, description = "Local file uploaded", body = UploadResponse),
        (status = 500, description = "Test file not configured or not found", body = ErrorBody)
    )
)]
pub async fn upload_local_test_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Response, HttpError> {
    let path = app_state
        .config
        .test_pdf_path
        .clone()
        .ok_or_else(|| HttpError::Internal("TEST_PDF_PATH is not configured.".to_string()))?;

    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        HttpError::Internal(format!(
            "Local test file not found at: {} ({})",
            path.display(),
            e
        ))
    })?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string();

    let batch = app_state
        .uploads
        .upload_batch(LOCAL_TEST_USER, vec![IncomingFile::new(filename, bytes)])
        .await?;
    Ok(upload_response(&batch))
}

/// Extract exam dates and deadlines from every PDF the user has uploaded.
#[utoipa::path(
    post,
    path = "/api/extract-events",
    request_body(content = ExtractRequest, description = "Optional time zone and calendar token; the body may be empty."),
    responses(
        (status = 200, description = "Events extracted", body = ExtractResponse),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 404, description = "The user has no uploaded PDFs", body = ErrorBody),
        (status = 502, description = "Storage or model failure, or an unparseable model reply", body = ErrorBody)
    ),
    params(
        ("x-user-id" = Option<String>, Header, description = "Whose documents to read.")
    )
)]
pub async fn extract_events_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ExtractResponse>, HttpError> {
    let user_id = user_id_from(&headers);
    let request: ExtractRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ExtractRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| HttpError::BadRequest(format!("Invalid request body: {}", e)))?
    };

    let timezone = parse_timezone(request.timezone.as_deref(), app_state.config.calendar_timezone)?;
    let calendar_ready = resolve_token(request.access_token.as_deref(), &headers).is_some();

    let extraction = app_state.extractor.extract(&user_id, timezone).await?;

    Ok(Json(ExtractResponse {
        summary: extraction.summary(),
        events: extraction.events.iter().map(EventPayload::from).collect(),
        skipped: extraction.skipped.iter().map(SkippedFile::from).collect(),
        calendar_ready,
    }))
}

/// Add events to the token owner's primary Google Calendar.
///
/// Each event is inserted on its own; failures are listed next to the successes.
#[utoipa::path(
    post,
    path = "/api/add-to-calendar",
    request_body = AddToCalendarRequest,
    responses(
        (status = 200, description = "Every event was added", body = AddToCalendarResponse),
        (status = 207, description = "Some events were added", body = AddToCalendarResponse),
        (status = 400, description = "No events provided or invalid time zone", body = ErrorBody),
        (status = 401, description = "No access token provided, or the calendar rejected it for every event", body = ErrorBody),
        (status = 502, description = "No event could be added", body = AddToCalendarResponse)
    )
)]
pub async fn add_to_calendar_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<AddToCalendarRequest>,
) -> Result<Response, HttpError> {
    let token = resolve_token(request.access_token.as_deref(), &headers)
        .map(AccessToken::new)
        .ok_or(PipelineError::MissingCredential)?;
    if request.events.is_empty() {
        return Err(PipelineError::NoEventsProvided.into());
    }
    let timezone = parse_timezone(request.timezone.as_deref(), app_state.config.calendar_timezone)?;

    // Client-supplied events get the same validation as model output; invalid ones are
    // reported in place without reaching the provider.
    let mut slots = Vec::with_capacity(request.events.len());
    let mut valid = Vec::new();
    for payload in &request.events {
        match payload.to_event() {
            Ok(event) => {
                valid.push(event);
                slots.push(None);
            }
            Err(error) => slots.push(Some(CalendarOutcome::Failed {
                summary: payload.summary.clone(),
                error: format!("Invalid event: {}", error),
                cause: None,
            })),
        }
    }

    let mut inserted = if valid.is_empty() {
        Vec::new().into_iter()
    } else {
        app_state
            .materializer
            .materialize(&valid, Some(&token), Some(timezone))
            .await?
            .outcomes
            .into_iter()
    };
    let report = MaterializationReport {
        outcomes: slots
            .into_iter()
            .filter_map(|slot| slot.or_else(|| inserted.next()))
            .collect(),
    };

    let status = if report.all_succeeded() {
        StatusCode::OK
    } else if report.succeeded() > 0 {
        StatusCode::MULTI_STATUS
    } else if report.credential_rejected() {
        StatusCode::UNAUTHORIZED
    } else {
        StatusCode::BAD_GATEWAY
    };
    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        "Calendar materialization finished"
    );
    Ok((status, Json(AddToCalendarResponse::from(&report))).into_response())
}

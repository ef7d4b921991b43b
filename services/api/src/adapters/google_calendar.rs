//! services/api/src/adapters/google_calendar.rs
//!
//! This module contains the adapter for the Google Calendar v3 API.
//! It implements the `CalendarProvider` port, inserting into the `primary` calendar of
//! whoever owns the supplied OAuth access token.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use syllabus_core::domain::{AccessToken, CalendarEventRequest, EventTiming, InsertedEvent};
use syllabus_core::ports::{CalendarProvider, PortError, PortResult};

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventBody {
    summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    start: EventDateTime,
    end: EventDateTime,
    reminders: Reminders,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
struct EventDateTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_zone: Option<String>,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
struct Reminders {
    use_default: bool,
    overrides: Vec<ReminderOverride>,
}

#[derive(Serialize, Debug, PartialEq)]
struct ReminderOverride {
    method: &'static str,
    minutes: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertResponse {
    id: String,
    #[serde(default)]
    html_link: Option<String>,
}

impl EventBody {
    /// Translates a provider-neutral request into the Calendar API's event resource.
    pub fn from_request(request: &CalendarEventRequest) -> Self {
        let (start, end) = match &request.timing {
            EventTiming::Timed { start, end } => (
                EventDateTime {
                    date: None,
                    date_time: Some(start.to_rfc3339()),
                    time_zone: Some(start.timezone().name().to_string()),
                },
                EventDateTime {
                    date: None,
                    date_time: Some(end.to_rfc3339()),
                    time_zone: Some(end.timezone().name().to_string()),
                },
            ),
            // The API's end date is exclusive; ours is the last day the event covers.
            EventTiming::AllDay { start, end } => (
                EventDateTime {
                    date: Some(start.format("%Y-%m-%d").to_string()),
                    date_time: None,
                    time_zone: None,
                },
                EventDateTime {
                    date: Some(end.succ_opt().unwrap_or(*end).format("%Y-%m-%d").to_string()),
                    date_time: None,
                    time_zone: None,
                },
            ),
        };

        Self {
            summary: request.summary.clone(),
            description: request.description.clone(),
            start,
            end,
            reminders: Reminders {
                use_default: false,
                overrides: request
                    .reminders
                    .iter()
                    .map(|r| ReminderOverride {
                        method: r.method.as_str(),
                        minutes: r.minutes_before,
                    })
                    .collect(),
            },
        }
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `CalendarProvider` using the Google Calendar REST API.
#[derive(Clone)]
pub struct GoogleCalendarAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl GoogleCalendarAdapter {
    /// Creates a new `GoogleCalendarAdapter`.
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

//=========================================================================================
// `CalendarProvider` Trait Implementation
//=========================================================================================

#[async_trait]
impl CalendarProvider for GoogleCalendarAdapter {
    async fn insert_event(
        &self,
        token: &AccessToken,
        event: &CalendarEventRequest,
    ) -> PortResult<InsertedEvent> {
        let url = format!(
            "{}/calendars/primary/events",
            self.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(token.secret())
            .json(&EventBody::from_request(event))
            .send()
            .await
            .map_err(|e| PortError::Transfer(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(PortError::Unauthorized);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PortError::Transfer(format!("Calendar HTTP {}: {}", status, text)));
        }

        let inserted: InsertResponse = response
            .json()
            .await
            .map_err(|e| PortError::Transfer(format!("Unreadable Calendar response: {}", e)))?;

        Ok(InsertedEvent {
            id: inserted.id,
            link: inserted.html_link,
        })
    }
}

//! crates/syllabus_core/src/pipeline/calendar.rs
//!
//! The calendar materializer: turns extracted events into provider inserts. Each event
//! is built and submitted on its own; the provider's calendar is append-only from our
//! side, so there is nothing to roll back when a sibling fails.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{error, info};

use super::{PipelineError, DEFAULT_CONCURRENCY};
use crate::domain::{
    AccessToken, CalendarEventRequest, CalendarOutcome, EventTiming, ExtractedEvent,
    MaterializationReport, Reminder,
};
use crate::ports::CalendarProvider;

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Chicago;

/// Event shape applied to every materialized event.
#[derive(Debug, Clone)]
pub struct MaterializerSettings {
    pub timezone: Tz,
    pub duration: Duration,
    pub reminders: Vec<Reminder>,
}

impl Default for MaterializerSettings {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE,
            duration: Duration::hours(1),
            reminders: vec![Reminder::popup(24 * 60), Reminder::popup(60)],
        }
    }
}

/// Resolves a local wall time in `timezone`. Times skipped by a DST jump do not exist;
/// times repeated by a DST fall-back resolve to the earlier instant.
fn localize(local: NaiveDateTime, timezone: Tz) -> Result<DateTime<Tz>, String> {
    timezone
        .from_local_datetime(&local)
        .earliest()
        .ok_or_else(|| format!("{} does not exist in time zone {}", local, timezone.name()))
}

/// Builds the provider-neutral insert for one extracted event.
pub fn build_request(
    event: &ExtractedEvent,
    settings: &MaterializerSettings,
) -> Result<CalendarEventRequest, String> {
    let timing = match event.time {
        Some(time) => {
            let start = localize(event.date.and_time(time), settings.timezone)?;
            EventTiming::Timed {
                start,
                end: start + settings.duration,
            }
        }
        None => EventTiming::AllDay {
            start: event.date,
            end: event.date,
        },
    };

    Ok(CalendarEventRequest {
        summary: event.summary.clone(),
        description: event.description.clone(),
        timing,
        reminders: settings.reminders.clone(),
    })
}

#[derive(Clone)]
pub struct CalendarMaterializer {
    provider: Arc<dyn CalendarProvider>,
    settings: MaterializerSettings,
    concurrency: usize,
}

impl CalendarMaterializer {
    pub fn new(provider: Arc<dyn CalendarProvider>, settings: MaterializerSettings) -> Self {
        Self {
            provider,
            settings,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Inserts every event and reports one outcome per event, in input order.
    ///
    /// `timezone` overrides the configured zone for this call only.
    pub async fn materialize(
        &self,
        events: &[ExtractedEvent],
        token: Option<&AccessToken>,
        timezone: Option<Tz>,
    ) -> Result<MaterializationReport, PipelineError> {
        let token = token
            .filter(|t| !t.secret().trim().is_empty())
            .ok_or(PipelineError::MissingCredential)?;
        if events.is_empty() {
            return Err(PipelineError::NoEventsProvided);
        }

        let mut settings = self.settings.clone();
        if let Some(tz) = timezone {
            settings.timezone = tz;
        }

        let inserts: Vec<_> = events
            .iter()
            .map(|event| self.insert_one(event, token, &settings))
            .collect();
        let outcomes = stream::iter(inserts)
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        Ok(MaterializationReport { outcomes })
    }

    async fn insert_one(
        &self,
        event: &ExtractedEvent,
        token: &AccessToken,
        settings: &MaterializerSettings,
    ) -> CalendarOutcome {
        let summary = event.summary.clone();

        let request = match build_request(event, settings) {
            Ok(request) => request,
            Err(error) => {
                error!(summary = %summary, "Could not build calendar event: {}", error);
                return CalendarOutcome::Failed {
                    summary,
                    error,
                    cause: None,
                };
            }
        };

        match self.provider.insert_event(token, &request).await {
            Ok(inserted) => {
                info!(summary = %summary, event_id = %inserted.id, "Calendar event created");
                CalendarOutcome::Created {
                    id: inserted.id,
                    summary,
                    link: inserted.link,
                }
            }
            Err(e) => {
                error!(summary = %summary, "Calendar insert failed: {}", e);
                CalendarOutcome::Failed {
                    summary,
                    error: e.to_string(),
                    cause: Some(e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ReminderMethod;
    use crate::pipeline::fakes::ScriptedCalendar;
    use chrono::{NaiveDate, NaiveTime};

    fn event(summary: &str, date: (i32, u32, u32), time: Option<(u32, u32)>) -> ExtractedEvent {
        ExtractedEvent {
            summary: summary.to_string(),
            description: None,
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            time: time.map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0).unwrap()),
        }
    }

    fn token() -> AccessToken {
        AccessToken::new("ya29.test")
    }

    #[test]
    fn timed_event_lasts_the_default_duration_in_the_target_zone() {
        let settings = MaterializerSettings::default();
        let request = build_request(
            &event("Biology 101 - Midterm", (2025, 3, 15), Some((9, 0))),
            &settings,
        )
        .unwrap();

        let EventTiming::Timed { start, end } = request.timing else {
            panic!("expected a timed event");
        };
        assert_eq!(start.to_rfc3339(), "2025-03-15T09:00:00-05:00");
        assert_eq!(end.to_rfc3339(), "2025-03-15T10:00:00-05:00");
        assert_eq!(end - start, Duration::hours(1));
        assert_eq!(start.timezone(), chrono_tz::America::Chicago);
    }

    #[test]
    fn event_without_time_is_a_same_day_all_day_event() {
        let request = build_request(
            &event("Project due", (2025, 4, 30), None),
            &MaterializerSettings::default(),
        )
        .unwrap();

        let day = NaiveDate::from_ymd_opt(2025, 4, 30).unwrap();
        assert_eq!(request.timing, EventTiming::AllDay { start: day, end: day });
    }

    #[test]
    fn default_reminders_are_a_day_and_an_hour_popups() {
        let request = build_request(
            &event("Quiz", (2025, 2, 1), None),
            &MaterializerSettings::default(),
        )
        .unwrap();

        assert_eq!(request.reminders.len(), 2);
        assert!(request
            .reminders
            .iter()
            .all(|r| r.method == ReminderMethod::Popup));
        let minutes: Vec<u32> = request.reminders.iter().map(|r| r.minutes_before).collect();
        assert_eq!(minutes, vec![1440, 60]);
    }

    #[test]
    fn nonexistent_local_time_is_rejected() {
        // 02:30 is skipped when Chicago springs forward on 2025-03-09.
        let err = build_request(
            &event("Lab", (2025, 3, 9), Some((2, 30))),
            &MaterializerSettings::default(),
        )
        .unwrap_err();
        assert!(err.contains("America/Chicago"));
    }

    #[test]
    fn duration_holds_across_fall_back() {
        // 01:30 happens twice on 2025-11-02 in Chicago; the earlier one is used.
        let request = build_request(
            &event("Review", (2025, 11, 2), Some((1, 30))),
            &MaterializerSettings::default(),
        )
        .unwrap();
        let EventTiming::Timed { start, end } = request.timing else {
            panic!("expected a timed event");
        };
        assert_eq!(start.to_rfc3339(), "2025-11-02T01:30:00-05:00");
        assert_eq!(end - start, Duration::hours(1));
    }

    #[tokio::test]
    async fn one_rejected_event_does_not_block_the_others() {
        let provider = Arc::new(ScriptedCalendar::rejecting("Midterm"));
        let materializer =
            CalendarMaterializer::new(provider.clone(), MaterializerSettings::default())
                .with_concurrency(3);
        let events = vec![
            event("Quiz", (2025, 2, 1), None),
            event("Midterm", (2025, 3, 15), Some((9, 0))),
            event("Final", (2025, 5, 10), Some((14, 0))),
        ];

        let report = materializer
            .materialize(&events, Some(&token()), None)
            .await
            .unwrap();

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert!(matches!(
            &report.outcomes[1],
            CalendarOutcome::Failed { summary, error, .. }
                if summary == "Midterm" && error.contains("400")
        ));
        assert!(matches!(
            &report.outcomes[2],
            CalendarOutcome::Created { summary, .. } if summary == "Final"
        ));
        assert_eq!(provider.inserted.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn timezone_override_applies_to_this_call() {
        let provider = Arc::new(ScriptedCalendar::default());
        let materializer =
            CalendarMaterializer::new(provider.clone(), MaterializerSettings::default());

        materializer
            .materialize(
                &[event("Seminar", (2025, 6, 2), Some((18, 0)))],
                Some(&token()),
                Some(chrono_tz::Asia::Seoul),
            )
            .await
            .unwrap();

        let inserted = provider.inserted.lock().unwrap();
        let EventTiming::Timed { start, .. } = &inserted[0].timing else {
            panic!("expected a timed event");
        };
        assert_eq!(start.to_rfc3339(), "2025-06-02T18:00:00+09:00");
    }

    #[tokio::test]
    async fn empty_event_list_is_a_caller_error() {
        let materializer = CalendarMaterializer::new(
            Arc::new(ScriptedCalendar::default()),
            MaterializerSettings::default(),
        );
        let err = materializer
            .materialize(&[], Some(&token()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoEventsProvided));
    }

    #[tokio::test]
    async fn missing_or_blank_token_is_rejected_before_any_insert() {
        let provider = Arc::new(ScriptedCalendar::default());
        let materializer =
            CalendarMaterializer::new(provider.clone(), MaterializerSettings::default());
        let events = [event("Quiz", (2025, 2, 1), None)];

        let err = materializer.materialize(&events, None, None).await.unwrap_err();
        assert!(matches!(err, PipelineError::MissingCredential));

        let blank = AccessToken::new("  ");
        let err = materializer
            .materialize(&events, Some(&blank), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingCredential));
        assert!(provider.inserted.lock().unwrap().is_empty());
    }
}

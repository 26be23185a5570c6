//! Google Calendar v3 client for the two operations the assistant
//! needs: listing upcoming events and inserting a new one.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::RemoteServiceError;
use super::auth::ServiceAccountAuth;

pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

/// Start and end of an event as absolute instants. Nothing checks that
/// `start < end`, the calendar service decides if it accepts it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    pub date_time: Option<String>,
    // Only set for all-day events
    pub date: Option<String>,
    pub time_zone: Option<String>,
}

impl EventTime {
    /// The precise timestamp if there is one, otherwise the date of an
    /// all-day event.
    pub fn display(&self) -> &str {
        self.date_time
            .as_deref()
            .or(self.date.as_deref())
            .unwrap_or("unknown time")
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub summary: Option<String>,
    #[serde(default)]
    pub start: EventTime,
    #[serde(default)]
    pub end: EventTime,
    pub html_link: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedEvent {
    pub id: String,
    pub html_link: Option<String>,
}

#[derive(Deserialize)]
struct EventsResponse {
    #[serde(default)]
    items: Vec<CalendarEvent>,
}

#[derive(Deserialize)]
struct ProviderErrorDetail {
    message: String,
}

#[derive(Deserialize)]
struct ProviderErrorResponse {
    error: ProviderErrorDetail,
}

/// The calendar operations the tools depend on. Implemented by
/// `GoogleCalendar` and swapped for fakes in tests.
#[async_trait]
pub trait CalendarGateway: Send + Sync {
    /// Up to `limit` events starting from now, recurring events expanded
    /// into single occurrences and ordered by start time.
    async fn list_upcoming(&self, limit: usize) -> Result<Vec<CalendarEvent>, RemoteServiceError>;

    /// Insert an event. This is not idempotent: retrying after a lost
    /// response can create a duplicate.
    async fn create_event(
        &self,
        summary: &str,
        interval: &NormalizedInterval,
        timezone: &str,
    ) -> Result<CreatedEvent, RemoteServiceError>;
}

pub type SharedGateway = Arc<dyn CalendarGateway>;

pub struct GoogleCalendar {
    auth: ServiceAccountAuth,
    calendar_id: String,
    api_base_url: String,
    http: reqwest::Client,
}

impl GoogleCalendar {
    pub fn new(auth: ServiceAccountAuth, calendar_id: &str, api_base_url: &str) -> Self {
        Self {
            auth,
            calendar_id: calendar_id.to_string(),
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.api_base_url,
            urlencoding::encode(&self.calendar_id)
        )
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, RemoteServiceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ProviderErrorResponse>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);

    Err(RemoteServiceError::Provider {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl CalendarGateway for GoogleCalendar {
    async fn list_upcoming(&self, limit: usize) -> Result<Vec<CalendarEvent>, RemoteServiceError> {
        let token = self.auth.access_token().await?;
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let max_results = limit.to_string();

        let resp = self
            .http
            .get(self.events_url())
            .bearer_auth(token)
            .query(&[
                ("timeMin", now.as_str()),
                ("maxResults", max_results.as_str()),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
            ])
            .send()
            .await?;

        let events: EventsResponse = check_status(resp).await?.json().await?;

        Ok(events.items)
    }

    async fn create_event(
        &self,
        summary: &str,
        interval: &NormalizedInterval,
        timezone: &str,
    ) -> Result<CreatedEvent, RemoteServiceError> {
        let token = self.auth.access_token().await?;
        let body = json!({
            "summary": summary,
            "start": {
                "dateTime": interval.start.to_rfc3339(),
                "timeZone": timezone,
            },
            "end": {
                "dateTime": interval.end.to_rfc3339(),
                "timeZone": timezone,
            },
        });

        let resp = self
            .http
            .post(self.events_url())
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let created: CreatedEvent = check_status(resp).await?.json().await?;
        tracing::info!("Created event {} on {}", created.id, self.calendar_id);

        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_falls_back_to_the_all_day_date() {
        let timed: CalendarEvent = serde_json::from_str(
            r#"{"id": "1", "summary": "Standup", "start": {"dateTime": "2026-10-20T09:00:00+05:30"}}"#,
        )
        .unwrap();
        assert_eq!(timed.start.display(), "2026-10-20T09:00:00+05:30");

        let all_day: CalendarEvent = serde_json::from_str(
            r#"{"id": "2", "summary": "Offsite", "start": {"date": "2026-10-21"}, "end": {"date": "2026-10-22"}}"#,
        )
        .unwrap();
        assert_eq!(all_day.start.display(), "2026-10-21");

        let bare: CalendarEvent = serde_json::from_str(r#"{"id": "3"}"#).unwrap();
        assert_eq!(bare.start.display(), "unknown time");
        assert!(bare.summary.is_none());
    }
}

//! Test utilities for integration tests
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{Router, body::Body};

use tailortalk::ai::Assistant;
use tailortalk::api::{AppState, app};
use tailortalk::core::{AppConfig, CredentialSource};
use tailortalk::google::{
    CalendarEvent, CalendarGateway, CreatedEvent, EventTime, NormalizedInterval,
    RemoteServiceError, ServiceAccountKey, SharedGateway,
};

pub const SERVICE_ACCOUNT_JSON: &str = include_str!("../fixtures/service_account.json");

/// Service account key whose token endpoint points at `token_uri`.
pub fn service_account_key(token_uri: &str) -> ServiceAccountKey {
    let mut key = ServiceAccountKey::from_json(SERVICE_ACCOUNT_JSON).unwrap();
    key.token_uri = token_uri.to_string();
    key
}

#[derive(Debug, Clone)]
pub struct CreatedCall {
    pub summary: String,
    pub interval: NormalizedInterval,
    pub timezone: String,
}

/// In-memory calendar that records what it was asked to do.
#[derive(Default)]
pub struct FakeGateway {
    pub events: Vec<CalendarEvent>,
    pub fail_with: Option<(u16, String)>,
    pub created: Mutex<Vec<CreatedCall>>,
    pub list_calls: AtomicUsize,
}

impl FakeGateway {
    pub fn with_events(events: Vec<CalendarEvent>) -> Arc<Self> {
        Arc::new(Self {
            events,
            ..Default::default()
        })
    }

    pub fn failing(status: u16, message: &str) -> Arc<Self> {
        Arc::new(Self {
            fail_with: Some((status, message.to_string())),
            ..Default::default()
        })
    }

    pub fn created(&self) -> Vec<CreatedCall> {
        self.created.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn error(&self) -> Option<RemoteServiceError> {
        self.fail_with
            .as_ref()
            .map(|(status, message)| RemoteServiceError::Provider {
                status: *status,
                message: message.clone(),
            })
    }
}

#[async_trait]
impl CalendarGateway for FakeGateway {
    async fn list_upcoming(&self, limit: usize) -> Result<Vec<CalendarEvent>, RemoteServiceError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.error() {
            return Err(e);
        }
        Ok(self.events.iter().take(limit).cloned().collect())
    }

    async fn create_event(
        &self,
        summary: &str,
        interval: &NormalizedInterval,
        timezone: &str,
    ) -> Result<CreatedEvent, RemoteServiceError> {
        if let Some(e) = self.error() {
            return Err(e);
        }
        let mut created = self.created.lock().unwrap();
        created.push(CreatedCall {
            summary: summary.to_string(),
            interval: *interval,
            timezone: timezone.to_string(),
        });
        let id = format!("evt{}", created.len());

        Ok(CreatedEvent {
            html_link: Some(format!("https://calendar.google.com/event?eid={}", id)),
            id,
        })
    }
}

pub fn event(summary: &str, date_time: &str) -> CalendarEvent {
    CalendarEvent {
        id: summary.to_lowercase().replace(' ', "-"),
        summary: Some(summary.to_string()),
        start: EventTime {
            date_time: Some(date_time.to_string()),
            ..Default::default()
        },
        end: EventTime::default(),
        html_link: None,
    }
}

/// Config that sends LLM requests to `llm_api_base_url`. The calendar
/// settings are never used since tests inject a gateway.
pub fn test_config(llm_api_base_url: &str) -> AppConfig {
    AppConfig {
        llm_api_base_url: llm_api_base_url.to_string(),
        llm_api_key: String::from("test-api-key"),
        llm_model: String::from("gemini-1.5-flash"),
        llm_temperature: 0.0,
        max_tool_rounds: 5,
        system_message: None,
        calendar_id: String::from("team@example.com"),
        credentials: CredentialSource::File(PathBuf::from("tests/fixtures/service_account.json")),
        calendar_api_base_url: String::from("http://localhost:9"),
        timezone: chrono_tz::Asia::Kolkata,
        web_ui_path: format!("{}/web-ui/src", env!("CARGO_MANIFEST_DIR")),
    }
}

/// Creates a test application router backed by `gateway`.
pub fn test_app(llm_api_base_url: &str, gateway: SharedGateway) -> Router {
    let config = test_config(llm_api_base_url);
    let assistant = Assistant::from_config(&config, gateway);
    let app_state = AppState::new(config, assistant);
    app(Arc::new(app_state))
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

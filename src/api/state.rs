use std::sync::Arc;

use anyhow::Result;

use crate::ai::Assistant;
use crate::core::AppConfig;
use crate::google::{CALENDAR_SCOPE, GoogleCalendar, ServiceAccountAuth, SharedGateway};

// Nothing is mutated after startup so there is no lock around the state
pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: AppConfig,
    pub assistant: Assistant,
}

impl AppState {
    pub fn new(config: AppConfig, assistant: Assistant) -> Self {
        Self { config, assistant }
    }

    /// Load the credential and wire the calendar gateway into the
    /// assistant. Fails if the credential can't be read.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let key = config.credentials.load()?;
        let auth = ServiceAccountAuth::new(key, CALENDAR_SCOPE)?;
        tracing::info!(
            "Using calendar {} as {}",
            config.calendar_id,
            auth.client_email()
        );
        let gateway: SharedGateway = Arc::new(GoogleCalendar::new(
            auth,
            &config.calendar_id,
            &config.calendar_api_base_url,
        ));
        let assistant = Assistant::from_config(&config, gateway);

        Ok(Self::new(config, assistant))
    }
}

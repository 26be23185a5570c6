pub mod auth;
pub mod gcal;

pub use auth::{CALENDAR_SCOPE, ServiceAccountAuth, ServiceAccountKey};
pub use gcal::{
    CalendarEvent, CalendarGateway, CreatedEvent, EventTime, GoogleCalendar, NormalizedInterval,
    SharedGateway,
};

/// Anything that went wrong talking to Google, with the provider's
/// own message when there is one.
#[derive(Debug, thiserror::Error)]
pub enum RemoteServiceError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("calendar service returned {status}: {message}")]
    Provider { status: u16, message: String },
}

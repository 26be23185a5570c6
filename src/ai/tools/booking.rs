use std::fmt;

use anyhow::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::ai::time::{TimeNormalizer, TimeParseError};
use crate::google::{CreatedEvent, NormalizedInterval, RemoteServiceError, SharedGateway};
use crate::openai::{Function, Parameters, Property, ToolCall, ToolType};

pub const DEFAULT_SUMMARY: &str = "General Meeting";

#[derive(Serialize)]
pub struct BookMeetingProps {
    pub summary: Property,
    pub start_time: Property,
    pub end_time: Property,
}

#[derive(Debug, Default, Deserialize)]
pub struct BookMeetingArgs {
    pub summary: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

/// Validated arguments for a booking. Times are still the raw phrases
/// from the model.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingRequest {
    pub summary: String,
    pub start_time_raw: String,
    pub end_time_raw: String,
}

impl BookMeetingArgs {
    pub fn into_request(self) -> Result<BookingRequest, BookingError> {
        let present = |s: Option<String>| s.filter(|s| !s.trim().is_empty());

        let (Some(start_time_raw), Some(end_time_raw)) =
            (present(self.start_time), present(self.end_time))
        else {
            return Err(BookingError::MissingTime);
        };
        let summary = present(self.summary).unwrap_or_else(|| DEFAULT_SUMMARY.to_string());

        Ok(BookingRequest {
            summary,
            start_time_raw,
            end_time_raw,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Please provide both start_time and end_time.")]
    MissingTime,
    #[error("Couldn't understand the {field} \"{raw}\". Please try again.")]
    UnparseableTime {
        field: &'static str,
        raw: String,
        #[source]
        source: TimeParseError,
    },
    #[error("Booking failed: {0}")]
    Remote(#[from] RemoteServiceError),
}

#[derive(Debug)]
pub struct BookingConfirmation {
    pub summary: String,
    pub interval: NormalizedInterval,
    pub event: CreatedEvent,
    pub timezone: Tz,
}

impl fmt::Display for BookingConfirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start = self.interval.start.with_timezone(&self.timezone);
        let end = self.interval.end.with_timezone(&self.timezone);

        writeln!(
            f,
            "✅ Meeting **'{}'** booked from **{} to {} {}**.",
            self.summary,
            start.format("%b %d, %I:%M %p"),
            end.format("%I:%M %p"),
            end.format("%Z"),
        )?;
        match &self.event.html_link {
            Some(link) => write!(f, "🔗 [View in Calendar]({})", link),
            None => write!(f, "🆔 Event ID: {}", self.event.id),
        }
    }
}

#[derive(Serialize)]
pub struct BookMeetingTool {
    pub r#type: ToolType,
    pub function: Function<BookMeetingProps>,
    #[serde(skip)]
    gateway: SharedGateway,
    #[serde(skip)]
    normalizer: TimeNormalizer,
}

#[async_trait]
impl ToolCall for BookMeetingTool {
    async fn call(&self, args: &str) -> Result<String, Error> {
        let args = if args.trim().is_empty() { "{}" } else { args };
        let fn_args: BookMeetingArgs = serde_json::from_str(args)?;

        let outcome = match fn_args.into_request() {
            Ok(request) => self.book(request).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(confirmation) => Ok(confirmation.to_string()),
            Err(e) => {
                tracing::warn!("Booking rejected: {}", e);
                Ok(format!("❌ {}", e))
            }
        }
    }

    fn function_name(&self) -> String {
        self.function.name.clone()
    }
}

impl BookMeetingTool {
    pub fn new(gateway: SharedGateway, normalizer: TimeNormalizer) -> Self {
        let function = Function {
            name: String::from("book_meeting"),
            description: String::from(
                "Book a meeting using summary, start_time, and end_time (natural language supported).",
            ),
            parameters: Parameters {
                r#type: String::from("object"),
                properties: BookMeetingProps {
                    summary: Property {
                        r#type: String::from("string"),
                        description: String::from(
                            "Meeting title or purpose (default is 'General Meeting').",
                        ),
                    },
                    start_time: Property {
                        r#type: String::from("string"),
                        description: String::from(
                            "Start time (e.g., 'tomorrow at 10 PM').",
                        ),
                    },
                    end_time: Property {
                        r#type: String::from("string"),
                        description: String::from("End time (e.g., 'tomorrow at 11 PM')."),
                    },
                },
                required: vec![String::from("start_time"), String::from("end_time")],
                additional_properties: false,
            },
            // Strict mode would force the optional summary to be required
            strict: false,
        };

        Self {
            r#type: ToolType::Function,
            function,
            gateway,
            normalizer,
        }
    }

    /// Normalize both times and create the event. Nothing is sent to
    /// the calendar unless both times parse.
    pub async fn book(&self, request: BookingRequest) -> Result<BookingConfirmation, BookingError> {
        self.book_at(request, Utc::now()).await
    }

    /// Same as `book` with both times read against a single `now`.
    pub async fn book_at(
        &self,
        request: BookingRequest,
        now: DateTime<Utc>,
    ) -> Result<BookingConfirmation, BookingError> {
        let unparseable = |field: &'static str, raw: &str| {
            let raw = raw.to_string();
            move |source| BookingError::UnparseableTime { field, raw, source }
        };
        let start = self
            .normalizer
            .normalize_at(&request.start_time_raw, now)
            .map_err(unparseable("start_time", &request.start_time_raw))?;
        let end = self
            .normalizer
            .normalize_end_at(&request.end_time_raw, start, now)
            .map_err(unparseable("end_time", &request.end_time_raw))?;
        let interval = NormalizedInterval { start, end };

        let timezone = self.normalizer.source_timezone();
        let event = self
            .gateway
            .create_event(&request.summary, &interval, timezone.name())
            .await?;

        tracing::info!(
            "Booked '{}' from {} to {}",
            request.summary,
            interval.start,
            interval.end
        );

        Ok(BookingConfirmation {
            summary: request.summary,
            interval,
            event,
            timezone,
        })
    }
}

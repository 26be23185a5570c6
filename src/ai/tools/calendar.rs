use anyhow::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;

use crate::google::{CalendarEvent, RemoteServiceError, SharedGateway};
use crate::openai::{Function, Parameters, Property, ToolCall, ToolType};

pub const UPCOMING_LIMIT: usize = 10;

pub const FREE_MESSAGE: &str = "✅ You're free!";

#[derive(Serialize)]
pub struct CheckCalendarProps {
    pub query: Property,
}

#[derive(Serialize)]
pub struct CheckCalendarTool {
    pub r#type: ToolType,
    pub function: Function<CheckCalendarProps>,
    #[serde(skip)]
    gateway: SharedGateway,
}

/// One bullet per event in the order the calendar returned them.
pub fn format_events(events: &[CalendarEvent]) -> String {
    if events.is_empty() {
        return FREE_MESSAGE.to_string();
    }

    events
        .iter()
        .map(|e| {
            format!(
                "• **{}** at `{}`",
                e.summary.as_deref().unwrap_or("(no title)"),
                e.start.display()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl ToolCall for CheckCalendarTool {
    // The argument is ignored, the upcoming events are always listed
    async fn call(&self, _args: &str) -> Result<String, Error> {
        match self.upcoming().await {
            Ok(events) => Ok(format_events(&events)),
            Err(e) => {
                tracing::error!("Calendar check failed: {}", e);
                Ok(format!("❌ Calendar check failed: {}", e))
            }
        }
    }

    fn function_name(&self) -> String {
        self.function.name.clone()
    }
}

impl CheckCalendarTool {
    pub fn new(gateway: SharedGateway) -> Self {
        let function = Function {
            name: String::from("check_calendar"),
            description: String::from("Check your upcoming Google Calendar events."),
            parameters: Parameters {
                r#type: String::from("object"),
                properties: CheckCalendarProps {
                    query: Property {
                        r#type: String::from("string"),
                        description: String::from(
                            "Optional note about what the user asked. Not used for filtering.",
                        ),
                    },
                },
                required: vec![],
                additional_properties: false,
            },
            strict: false,
        };

        Self {
            r#type: ToolType::Function,
            function,
            gateway,
        }
    }

    pub async fn upcoming(&self) -> Result<Vec<CalendarEvent>, RemoteServiceError> {
        self.gateway.list_upcoming(UPCOMING_LIMIT).await
    }
}

//! Reusable prompts using Handlebars for templating. Strict mode is on
//! so a missing variable is an error instead of an empty string.

use std::fmt;

use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use handlebars::Handlebars;
use serde_json::json;

#[derive(Debug)]
pub enum Prompt {
    System,
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

const SYSTEM_PROMPT: &str = r"You are TailorTalk, an AI assistant that helps users book meetings and check calendars. You can understand natural language like 'tomorrow at 10 PM IST' and convert it to proper time. If any details are missing, use defaults and book the meeting directly. Always include the calendar link.

You have two tools:
- book_meeting: books a meeting. Pass start_time and end_time exactly as the user said them (for example 'tomorrow at 10 PM'), the tool understands natural language. If the user gives no end time, end the meeting one hour after it starts. If there is no title, leave summary empty.
- check_calendar: lists the upcoming events on the calendar. Use it when the user asks what is scheduled or whether they are free.

Relay the tool result to the user, including any link it returns. If a tool reports a problem, explain it and ask for what is missing.

Times are in the {{timezone}} timezone. Right now it is {{now}}.
";

pub fn templates<'a>() -> Result<Handlebars<'a>> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    // Prompts are plain text, not HTML
    registry.register_escape_fn(handlebars::no_escape);
    registry.register_template_string(&Prompt::System.to_string(), SYSTEM_PROMPT)?;
    Ok(registry)
}

/// Render the default system prompt for the given timezone and moment.
pub fn system_prompt(timezone: Tz, now: DateTime<Utc>) -> Result<String> {
    let local = now.with_timezone(&timezone);
    let data = json!({
        "timezone": timezone.name(),
        "now": local.format("%A, %B %-d, %Y %I:%M %p %Z").to_string(),
    });
    let rendered = templates()?.render(&Prompt::System.to_string(), &data)?;
    Ok(rendered)
}

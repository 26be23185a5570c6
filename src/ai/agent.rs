//! The assistant turns one user message into one reply, letting the
//! model call the calendar tools as many times as it needs.

use anyhow::{Result, anyhow};
use chrono::Utc;
use chrono_tz::Tz;

use crate::ai::prompt::system_prompt;
use crate::ai::time::TimeNormalizer;
use crate::ai::tools::calendar_tools;
use crate::core::AppConfig;
use crate::google::SharedGateway;
use crate::openai::{BoxedToolCall, CompletionConfig, Message, Role, chat};

pub const FALLBACK_OUTPUT: &str = "Something went wrong. Please try again later.";

pub struct Assistant {
    tools: Vec<BoxedToolCall>,
    completion: CompletionConfig,
    system_message: Option<String>,
    timezone: Tz,
    max_tool_rounds: usize,
}

impl Assistant {
    pub fn new(
        tools: Vec<BoxedToolCall>,
        completion: CompletionConfig,
        system_message: Option<String>,
        timezone: Tz,
        max_tool_rounds: usize,
    ) -> Self {
        Self {
            tools,
            completion,
            system_message,
            timezone,
            max_tool_rounds,
        }
    }

    /// Build the assistant with the calendar tools backed by `gateway`.
    pub fn from_config(config: &AppConfig, gateway: SharedGateway) -> Self {
        let completion = CompletionConfig {
            api_base_url: config.llm_api_base_url.clone(),
            api_key: config.llm_api_key.clone(),
            model: config.llm_model.clone(),
            temperature: config.llm_temperature,
        };
        let tools = calendar_tools(gateway, TimeNormalizer::new(config.timezone));

        Self::new(
            tools,
            completion,
            config.system_message.clone(),
            config.timezone,
            config.max_tool_rounds,
        )
    }

    fn system_message(&self) -> Result<String> {
        match &self.system_message {
            Some(msg) => Ok(msg.clone()),
            None => system_prompt(self.timezone, Utc::now()),
        }
    }

    /// Run the tool calling loop for a single message and return the
    /// model's final answer.
    pub async fn run(&self, user_message: &str) -> Result<String> {
        let history = vec![
            Message::new(Role::System, &self.system_message()?),
            Message::new(Role::User, user_message),
        ];

        let messages = chat(&self.tools, &history, &self.completion, self.max_tool_rounds).await?;
        tracing::debug!("Chat finished with {} new messages", messages.len());

        messages
            .last()
            .and_then(|m| m.content.clone())
            .ok_or_else(|| anyhow!("Chat returned no answer"))
    }

    /// Like `run` but never fails. Errors are logged and the user gets a
    /// generic apology.
    pub async fn handle_intent(&self, user_message: &str) -> String {
        match self.run(user_message).await {
            Ok(output) => output,
            Err(e) => {
                tracing::error!("Agent error: {}. Root cause: {}", e, e.root_cause());
                FALLBACK_OUTPUT.to_string()
            }
        }
    }
}

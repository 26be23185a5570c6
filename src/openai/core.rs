use std::time::Duration;

use anyhow::{Error, Result, bail};
use async_trait::async_trait;
use erased_serde;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "user")]
    User,
    #[serde(rename = "tool")]
    Tool,
}

// Object {
//     "content": Null,
//     "role": String("assistant"),
//     "tool_calls": Array [
//         Object {
//             "function": Object {
//                 "arguments": String("{\"start_time\":\"tomorrow at 10 PM\", ...}"),
//                 "name": String("book_meeting")
//             },
//             "id": String("call_KCg5V0N5E7hHHrUwdefHBfgL"),
//             "type": String("function")
//         }
//     ]
// }
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct FunctionCallFn {
    pub arguments: String,
    pub name: String,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct FunctionCall {
    pub function: FunctionCallFn,
    pub id: String,
    pub r#type: String,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Message {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<FunctionCall>>,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: Some(content.to_string()),
            tool_call_id: None,
            tool_calls: None,
        }
    }
    pub fn new_tool_call_request(tool_calls: Vec<FunctionCall>) -> Self {
        Message {
            role: Role::Assistant,
            content: None,
            tool_call_id: None,
            tool_calls: Some(tool_calls),
        }
    }
    pub fn new_tool_call_response(content: &str, tool_call_id: &str) -> Self {
        Message {
            role: Role::Tool,
            content: Some(content.to_string()),
            tool_call_id: Some(tool_call_id.to_string()),
            tool_calls: None,
        }
    }
}

#[derive(Serialize)]
pub struct Property {
    pub r#type: String,
    pub description: String,
}

#[derive(Serialize)]
pub struct Parameters<Props: Serialize> {
    pub r#type: String,
    pub properties: Props,
    pub required: Vec<String>,
    #[serde(rename = "additionalProperties")]
    pub additional_properties: bool,
}

#[derive(Serialize)]
pub struct Function<Props: Serialize> {
    pub name: String,
    pub description: String,
    pub parameters: Parameters<Props>,
    pub strict: bool,
}

#[derive(Serialize)]
pub enum ToolType {
    #[serde(rename = "function")]
    Function,
}

// Tools are passed around as trait objects but still need to
// serialize into the `tools` field of the request. `serde::Serialize`
// isn't object safe so `erased_serde` stands in for it.
#[async_trait]
pub trait ToolCall: erased_serde::Serialize {
    /// Run the tool with the raw JSON arguments from the model. The
    /// returned text is handed back to the model as the tool result.
    async fn call(&self, args: &str) -> Result<String, Error>;
    fn function_name(&self) -> String;
}
erased_serde::serialize_trait_object!(ToolCall);

pub type BoxedToolCall = Box<dyn ToolCall + Send + Sync + 'static>;

/// Where and how to ask for completions. Works with any OpenAI
/// compatible `/chat/completions` endpoint.
#[derive(Clone, Debug)]
pub struct CompletionConfig {
    pub api_base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f64,
}

pub async fn completion(
    messages: &[Message],
    tools: &[BoxedToolCall],
    config: &CompletionConfig,
) -> Result<Value, Error> {
    let mut payload = json!({
        "model": config.model,
        "messages": messages,
        "temperature": config.temperature,
    });
    if !tools.is_empty() {
        payload["tools"] = json!(tools);
    }
    let url = format!(
        "{}/chat/completions",
        config.api_base_url.trim_end_matches("/")
    );
    let response = reqwest::Client::new()
        .post(url)
        .bearer_auth(&config.api_key)
        .header("Content-Type", "application/json")
        .timeout(Duration::from_secs(60 * 10))
        .json(&payload)
        .send()
        .await?;

    let status = response.status();
    let body: Value = response.json().await?;
    if !status.is_success() {
        bail!("Completion request failed with {}: {}", status, body);
    }

    Ok(body)
}

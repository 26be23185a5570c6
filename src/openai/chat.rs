use anyhow::{Error, Result, anyhow, bail};
use futures_util::future::join_all;
use serde_json::Value;

use crate::openai::{
    BoxedToolCall, CompletionConfig, FunctionCall, FunctionCallFn, Message, Role, completion,
};

async fn run_tool(tools: &[BoxedToolCall], name: &str, args: &str) -> String {
    let Some(tool) = tools.iter().find(|t| t.function_name() == name) else {
        tracing::warn!("Model asked for unknown tool {}", name);
        return format!("Error: there is no tool named {}", name);
    };

    // Errors go back to the model as text so it can correct the call
    // instead of failing the whole turn
    match tool.call(args).await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!("Tool {} failed: {}", name, e);
            format!("Error: {}", e)
        }
    }
}

fn parse_tool_call(tool_call: &Value) -> Result<FunctionCall, Error> {
    let id = tool_call["id"]
        .as_str()
        .ok_or(anyhow!("Tool call missing ID: {}", tool_call))?;
    let function = &tool_call["function"];
    let arguments = function["arguments"]
        .as_str()
        .ok_or(anyhow!("Tool call missing arguments: {}", tool_call))?;
    let name = function["name"]
        .as_str()
        .ok_or(anyhow!("Tool call missing name: {}", tool_call))?;

    Ok(FunctionCall {
        function: FunctionCallFn {
            arguments: arguments.to_string(),
            name: name.to_string(),
        },
        id: id.to_string(),
        r#type: String::from("function"),
    })
}

async fn handle_tool_calls(
    tools: &[BoxedToolCall],
    tool_calls: &[Value],
) -> Result<Vec<Message>, Error> {
    let calls = tool_calls
        .iter()
        .map(parse_tool_call)
        .collect::<Result<Vec<_>, _>>()?;

    for call in calls.iter() {
        tracing::debug!(
            "\nTool call: {}\nargs: {}",
            &call.function.name,
            &call.function.arguments
        );
    }

    // Run each tool call concurrently. Results are returned in the
    // same order as the requests.
    let results = join_all(
        calls
            .iter()
            .map(|call| run_tool(tools, &call.function.name, &call.function.arguments)),
    )
    .await;

    let mut messages = Vec::with_capacity(calls.len() + 1);
    let responses = calls
        .iter()
        .zip(results.iter())
        .map(|(call, result)| Message::new_tool_call_response(result, &call.id))
        .collect::<Vec<_>>();
    messages.push(Message::new_tool_call_request(calls));
    messages.extend(responses);

    Ok(messages)
}

/// Runs the next turn in chat by passing a transcript to the LLM for
/// the next response. Tool calls are resolved until the model answers
/// with content or `max_tool_rounds` is exceeded. Returns every message
/// generated along the way, the last one being the answer.
pub async fn chat(
    tools: &[BoxedToolCall],
    history: &[Message],
    config: &CompletionConfig,
    max_tool_rounds: usize,
) -> Result<Vec<Message>, Error> {
    let mut updated_history = history.to_owned();
    let mut messages = Vec::new();
    let mut rounds = 0;

    let mut resp = completion(&updated_history, tools, config).await?;

    // Tool calls need to be handled for the chat to proceed
    while let Some(tool_calls) = resp["choices"][0]["message"]["tool_calls"].as_array() {
        if tool_calls.is_empty() {
            break;
        }
        if rounds >= max_tool_rounds {
            bail!("Gave up after {} rounds of tool calls", max_tool_rounds);
        }
        rounds += 1;

        let tool_call_msgs = handle_tool_calls(tools, tool_calls).await?;
        for m in tool_call_msgs.into_iter() {
            messages.push(m.clone());
            updated_history.push(m);
        }

        // Provide the results of the tool calls back to the chat
        resp = completion(&updated_history, tools, config).await?;
    }

    if let Some(msg) = resp["choices"][0]["message"]["content"].as_str() {
        messages.push(Message::new(Role::Assistant, msg));
    } else {
        bail!("No message received. Resp:\n\n {}", resp);
    }

    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde::Serialize;
    use serde_json::json;

    #[derive(Serialize)]
    struct EchoTool;

    #[async_trait]
    impl crate::openai::ToolCall for EchoTool {
        async fn call(&self, args: &str) -> Result<String, Error> {
            if args == "boom" {
                bail!("bad arguments");
            }
            Ok(format!("echo {}", args))
        }

        fn function_name(&self) -> String {
            String::from("echo")
        }
    }

    fn tool_call(id: &str, name: &str, args: &str) -> Value {
        json!({"id": id, "type": "function", "function": {"name": name, "arguments": args}})
    }

    #[tokio::test]
    async fn it_pairs_tool_results_with_requests() {
        let tools: Vec<BoxedToolCall> = vec![Box::new(EchoTool)];
        let calls = vec![
            tool_call("call_1", "echo", "one"),
            tool_call("call_2", "missing", "{}"),
            tool_call("call_3", "echo", "boom"),
        ];

        let messages = handle_tool_calls(&tools, &calls).await.unwrap();

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::Assistant);
        assert_eq!(messages[0].tool_calls.as_ref().unwrap().len(), 3);
        assert_eq!(messages[1].content.as_deref(), Some("echo one"));
        assert_eq!(messages[1].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(
            messages[2].content.as_deref(),
            Some("Error: there is no tool named missing")
        );
        assert_eq!(messages[3].content.as_deref(), Some("Error: bad arguments"));
    }

    #[tokio::test]
    async fn it_rejects_malformed_tool_calls() {
        let tools: Vec<BoxedToolCall> = vec![Box::new(EchoTool)];
        let calls = vec![json!({"type": "function", "function": {"name": "echo"}})];
        assert!(handle_tool_calls(&tools, &calls).await.is_err());
    }

    #[tokio::test]
    async fn it_stops_after_too_many_tool_rounds() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"choices": [{"message": {
                    "role": "assistant",
                    "tool_calls": [tool_call("call_1", "echo", "again")]
                }}]})
                .to_string(),
            )
            .create_async()
            .await;

        let config = CompletionConfig {
            api_base_url: server.url(),
            api_key: String::from("test-key"),
            model: String::from("test-model"),
            temperature: 0.0,
        };
        let tools: Vec<BoxedToolCall> = vec![Box::new(EchoTool)];
        let history = vec![Message::new(Role::User, "loop forever")];

        let err = chat(&tools, &history, &config, 2).await.unwrap_err();
        assert!(err.to_string().contains("2 rounds"));
    }
}

use anyhow::{Result, bail};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::api::public::chat::{ChatRequest, ChatResponse};
use crate::core::config::backend_url;

/// Post one message to the chat endpoint and return the reply text.
pub async fn send_message(client: &reqwest::Client, url: &str, message: &str) -> Result<String> {
    let response = client
        .post(url)
        .json(&ChatRequest {
            message: message.to_string(),
        })
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        bail!("Error: {}", status);
    }
    let body: ChatResponse = response.json().await?;

    Ok(body.output)
}

pub async fn run(backend: Option<String>) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let url = backend.unwrap_or_else(backend_url);
    let client = reqwest::Client::new();

    println!("TailorTalk: book meetings and check your calendar ({})", url);

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());
                // Connection problems are shown inline, the session keeps going
                match send_message(&client, &url, &line).await {
                    Ok(output) => println!("{}", output),
                    Err(e) => println!("❌ {}", e),
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn it_returns_the_output_field() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat")
            .match_body(mockito::Matcher::Json(
                serde_json::json!({"message": "Am I free?"}),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"output": "✅ You're free!"}"#)
            .create_async()
            .await;

        let url = format!("{}/chat", server.url());
        let output = send_message(&reqwest::Client::new(), &url, "Am I free?")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(output, "✅ You're free!");
    }

    #[tokio::test]
    async fn it_reports_the_status_on_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat")
            .with_status(502)
            .create_async()
            .await;

        let url = format!("{}/chat", server.url());
        let err = send_message(&reqwest::Client::new(), &url, "hi")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("502"));
    }
}

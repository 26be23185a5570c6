use anyhow::Result;

use crate::api::{AppState, init_tracing};
use crate::core::AppConfig;

pub async fn run(message: &str) -> Result<()> {
    init_tracing();

    let config = AppConfig::from_env()?;
    let state = AppState::from_config(config)?;
    let output = state.assistant.handle_intent(message).await;
    println!("{}", output);

    Ok(())
}

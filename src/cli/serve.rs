use anyhow::Result;

use crate::api;
use crate::core::AppConfig;

pub async fn run(host: String, port: String) -> Result<()> {
    // Before reading the config so its warnings are logged
    api::init_tracing();

    let config = AppConfig::from_env()?;
    api::serve(host, port, config).await
}

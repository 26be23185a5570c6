use anyhow::Result;
use tailortalk::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}

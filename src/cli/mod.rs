use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod ask;
pub mod chat;
pub mod serve;

#[derive(Subcommand)]
enum Command {
    /// Run the API server
    Serve {
        /// Set the server host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Set the server port
        #[arg(long, default_value = "8000")]
        port: String,
    },
    /// Chat with a running server from the terminal
    Chat {
        /// Chat endpoint, defaults to TAILOR_BACKEND_URL
        #[arg(long)]
        backend: Option<String>,
    },
    /// Send one message to the assistant without starting a server
    Ask {
        message: String,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();

    // Handle each sub command
    match args.command {
        Some(Command::Serve { host, port }) => {
            serve::run(host, port).await?;
        }
        Some(Command::Chat { backend }) => {
            chat::run(backend).await?;
        }
        Some(Command::Ask { message }) => {
            ask::run(&message).await?;
        }
        None => {}
    }

    Ok(())
}

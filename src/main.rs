//! townbot - Telegram remote control for the gt/bd town CLIs.

use clap::Parser;
use std::process::ExitCode;

use townbot::cli::Commands;
use townbot::{config, logging};

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = config::load_dotenv();
    let _guard = match logging::init() {
        Ok((guard, _)) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match dotenv {
        Ok(Some(path)) => tracing::debug!("Loaded environment from {}", path.display()),
        Ok(None) => {}
        Err(e) => tracing::warn!("Failed to load .env: {}", e),
    }
    let args = Commands::parse();

    match args.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

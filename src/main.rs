// dbmeta: database metadata and routine statement synthesis
//
// This is the main entry point for the dbmeta binary.

use anyhow::{Context, Result};
use dbmeta::cli::{handle_command, Command, CommandType};
use dbmeta::config::AppState;
use dbmeta::database::register_builtin_providers;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,dbmeta=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::from_args(&args)?;

    register_builtin_providers();

    let state = match command.command_type {
        CommandType::Connection { .. } | CommandType::Describe { .. } => {
            AppState::load().context("failed to load configuration")?
        }
        _ => AppState::default(),
    };

    let output = handle_command(&command, &state).await?;
    println!("{}", output);

    Ok(())
}

//! CLI entry point: parses arguments, loads configuration, initializes logging, and
//! dispatches to the mission-lifecycle or `serve` handler.

use anyhow::{Context, Result};
use clap::Parser;

use mediabroker::cli::{commands, Cli, Commands, MissionCommands};
use mediabroker::infrastructure::config::ConfigLoader;
use mediabroker::infrastructure::logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }
    let config = loader.load().context("failed to load configuration")?;

    let _logger_handle = logging::init(&config.logging).context("failed to initialize logging")?;

    match cli.command {
        Commands::Mission(mission_cmd) => match mission_cmd {
            MissionCommands::Create {
                name,
                task_kind,
                description,
                model_id,
                fixed_config,
                items,
                scheduled_time,
                track,
            } => {
                commands::handle_create(
                    &config,
                    name,
                    task_kind,
                    description,
                    model_id,
                    fixed_config,
                    items,
                    scheduled_time,
                    track,
                )
                .await?;
            }
            MissionCommands::List { status, page, page_size, track } => {
                commands::handle_list(&config, status, page, page_size, track).await?;
            }
            MissionCommands::Show { id, track } => {
                commands::handle_show(&config, id, track).await?;
            }
            MissionCommands::Cancel { id, track } => {
                commands::handle_cancel(&config, id, track).await?;
            }
            MissionCommands::Retry { id, track } => {
                commands::handle_retry(&config, id, track).await?;
            }
            MissionCommands::Delete { id, track } => {
                commands::handle_delete(&config, id, track).await?;
            }
        },
        Commands::Serve => {
            commands::handle_serve(&config).await?;
        }
    }

    Ok(())
}

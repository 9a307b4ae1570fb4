use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use dialoguer::Confirm;
use ding_core::error::CoreError;
use ding_core::notify::LogNotifier;
use ding_core::scheduler::Scheduler;
use ding_core::store::JsonFileStore;
use ding_core::timer::TokioTimer;
use owo_colors::{OwoColorize, Style};
use util::resolve_task_id;

mod cli;
mod commands;
mod config;
mod parser;
mod util;
mod views;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    let config = config::Config::new().unwrap_or_default();
    let store = Arc::new(JsonFileStore::new(&config.state_file));
    let (timer, alarms) = TokioTimer::new();
    let scheduler = Scheduler::new(store, Arc::new(LogNotifier), Arc::new(timer));

    if let Err(e) = sync_timezone(&scheduler, &config).await {
        handle_error(e.into());
        return;
    }

    let result = match cli.command {
        cli::Commands::Add(command) => commands::add::add_task(&scheduler, command).await,
        cli::Commands::List(command) => commands::list::list_tasks(&scheduler, command).await,
        cli::Commands::Done(command) => commands::done::done_task(&scheduler, command).await,
        cli::Commands::Snooze(command) => commands::snooze::snooze_task(&scheduler, command).await,
        cli::Commands::Delete(command) => {
            let task_id = match resolve_task_id(&scheduler, &command.id).await {
                Ok(id) => id,
                Err(e) => {
                    handle_error(e);
                    return;
                }
            };
            if !command.force {
                let title = scheduler
                    .tasks()
                    .await
                    .ok()
                    .and_then(|tasks| tasks.into_iter().find(|t| t.id == task_id))
                    .map(|t| t.title)
                    .unwrap_or_else(|| task_id.to_string());
                let confirmation = Confirm::new()
                    .with_prompt(format!("Are you sure you want to delete '{title}'?"))
                    .default(false)
                    .interact()
                    .unwrap_or(false);
                if !confirmation {
                    println!("Deletion cancelled.");
                    return;
                }
            }
            commands::delete::delete_task(&scheduler, task_id).await
        }
        cli::Commands::CatchUp(command) => commands::catchup::catch_up(&scheduler, command).await,
        cli::Commands::Rehydrate => commands::catchup::rehydrate(&scheduler).await,
        cli::Commands::Run(command) => {
            commands::run::run(&scheduler, alarms, command, &config.log_filter).await
        }
    };

    if let Err(e) = result {
        handle_error(e);
    }
}

/// Keeps the stored recurrence timezone in line with the configured
/// (or detected) one, so `ding.toml` edits take effect on next use.
async fn sync_timezone(scheduler: &Scheduler, config: &config::Config) -> Result<(), CoreError> {
    let effective = config.effective_timezone();
    let mut settings = scheduler.settings().await?;
    if settings.timezone != effective {
        settings.timezone = effective;
        scheduler.update_settings(settings, Utc::now()).await?;
    }
    Ok(())
}

fn handle_error(err: anyhow::Error) {
    let error_style = Style::new().red().bold();

    let core_error = err
        .downcast_ref::<CoreError>()
        .or_else(|| err.source().and_then(|e| e.downcast_ref::<CoreError>()));
    if let Some(core_error) = core_error {
        match core_error {
            CoreError::NotFound(s) => {
                eprintln!("{} {}", "Error:".style(error_style), s);
            }
            CoreError::AmbiguousId(matches) => {
                eprintln!("{}", "Error: Ambiguous ID.".style(error_style));
                eprintln!("Did you mean one of these?");
                for (id, title) in matches {
                    eprintln!("  {} ({})", id.yellow(), title);
                }
            }
            CoreError::InvalidInput(s) => {
                eprintln!("{} Invalid input: {}", "Error:".style(error_style), s);
            }
            CoreError::InvalidTimezone(s) => {
                eprintln!("{} Invalid timezone: {}", "Error:".style(error_style), s);
            }
            _ => eprintln!("{} {}", "Error:".style(error_style), err),
        }
    } else {
        eprintln!("{} {}", "Error:".style(error_style), err);
    }
}

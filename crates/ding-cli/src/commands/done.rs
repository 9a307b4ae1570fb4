use anyhow::Result;
use chrono::Utc;
use ding_core::scheduler::Scheduler;
use owo_colors::{OwoColorize, Style};

use crate::cli::DoneCommand;
use crate::util::resolve_task_id;

pub async fn done_task(scheduler: &Scheduler, command: DoneCommand) -> Result<()> {
    let id = resolve_task_id(scheduler, &command.id).await?;
    let task = scheduler.complete_task(id, Utc::now()).await?;
    println!(
        "{} Completed: {}",
        "✓".style(Style::new().green().bold()),
        task.title.bright_white().bold()
    );
    Ok(())
}

use anyhow::Result;
use chrono::Utc;
use chrono_humanize::Humanize;
use ding_core::scheduler::Scheduler;
use owo_colors::{OwoColorize, Style};

use crate::cli::SnoozeCommand;
use crate::util::resolve_task_id;

pub async fn snooze_task(scheduler: &Scheduler, command: SnoozeCommand) -> Result<()> {
    let id = resolve_task_id(scheduler, &command.id).await?;
    let task = scheduler
        .snooze_task(id, command.minutes, Utc::now())
        .await?;
    println!(
        "{} Snoozed {} until {}",
        "⏰".style(Style::new().yellow()),
        task.title.bright_white().bold(),
        task.due_at.humanize()
    );
    Ok(())
}

use anyhow::Result;
use chrono::Utc;
use chrono_humanize::Humanize;
use ding_core::models::{NewTaskData, RepeatRule};
use ding_core::scheduler::Scheduler;
use owo_colors::{OwoColorize, Style};

use crate::cli::{AddCommand, RepeatKind};
use crate::parser::{parse_due_date, parse_weekdays};

pub async fn add_task(scheduler: &Scheduler, command: AddCommand) -> Result<()> {
    let due_at = command.due.as_ref().map(|d| parse_due_date(d)).transpose()?;

    let repeat = match command.every {
        None => None,
        Some(RepeatKind::Daily) => Some(RepeatRule::Daily {
            interval: command.interval,
        }),
        Some(RepeatKind::Weekly) => {
            let by_weekday = command
                .on
                .as_deref()
                .map(parse_weekdays)
                .transpose()?
                .unwrap_or_default();
            Some(RepeatRule::Weekly {
                interval: command.interval,
                by_weekday,
            })
        }
        Some(RepeatKind::Monthly) => {
            if let Some(day) = command.day {
                if !(1..=31).contains(&day) {
                    return Err(anyhow::anyhow!("--day must be between 1 and 31"));
                }
            }
            Some(RepeatRule::Monthly {
                interval: command.interval,
                by_day: command.day,
            })
        }
    };
    if command.on.is_some() && !matches!(command.every, Some(RepeatKind::Weekly)) {
        return Err(anyhow::anyhow!("--on requires --every weekly"));
    }
    if command.day.is_some() && !matches!(command.every, Some(RepeatKind::Monthly)) {
        return Err(anyhow::anyhow!("--day requires --every monthly"));
    }

    let data = NewTaskData {
        title: command.title,
        note: command.note,
        due_at,
        repeat,
        priority: command.priority.map(Into::into),
        tags: command.tag,
    };

    let is_repeating = !matches!(data.repeat, None | Some(RepeatRule::None));
    let task = scheduler.create_task(data, Utc::now()).await?;

    let success_style = Style::new().green().bold();
    let kind = if is_repeating {
        "recurring reminder"
    } else {
        "reminder"
    };
    println!(
        "{} Created {}: {}",
        "✓".style(success_style),
        kind,
        task.title.bright_white().bold()
    );
    println!(
        "  ID: {}  due {}",
        task.id.to_string().yellow(),
        task.due_at.humanize()
    );
    Ok(())
}

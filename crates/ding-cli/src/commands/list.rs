use anyhow::Result;
use chrono::Utc;
use ding_core::scheduler::Scheduler;

use crate::cli::{ListCommand, SortField};
use crate::views::table::display_tasks;

pub async fn list_tasks(scheduler: &Scheduler, command: ListCommand) -> Result<()> {
    let now = Utc::now();
    let mut tasks = scheduler.tasks().await?;

    tasks.retain(|t| !t.archived);
    if command.overdue {
        tasks.retain(|t| t.is_overdue(now));
    } else if !command.all {
        tasks.retain(|t| !t.done);
    }
    if let Some(tag) = &command.tag {
        tasks.retain(|t| t.tags.iter().any(|candidate| candidate == tag));
    }
    if let Some(needle) = &command.search {
        let needle = needle.to_lowercase();
        tasks.retain(|t| {
            t.title.to_lowercase().contains(&needle)
                || t.note
                    .as_deref()
                    .is_some_and(|n| n.to_lowercase().contains(&needle))
        });
    }

    match command.sort {
        SortField::Due => tasks.sort_by_key(|t| t.due_at),
        SortField::Priority => {
            tasks.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.due_at.cmp(&b.due_at)))
        }
    }
    display_tasks(&tasks, now);
    Ok(())
}

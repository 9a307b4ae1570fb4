use anyhow::{anyhow, Result};
use ding_core::error::CoreError;
use ding_core::scheduler::Scheduler;
use uuid::Uuid;

/// Resolves a full or prefix task ID against the current task set.
pub async fn resolve_task_id(scheduler: &Scheduler, short_id: &str) -> Result<Uuid> {
    if short_id.len() < 2 {
        return Err(anyhow!(CoreError::InvalidInput(
            "Short ID must be at least 2 characters long.".to_string()
        )));
    }
    let needle = short_id.to_lowercase();
    let matches: Vec<(Uuid, String)> = scheduler
        .tasks()
        .await?
        .into_iter()
        .filter(|t| t.id.to_string().starts_with(&needle))
        .map(|t| (t.id, t.title))
        .collect();

    match matches.len() {
        1 => Ok(matches[0].0),
        0 => Err(anyhow!(CoreError::NotFound(format!(
            "No reminder found with ID prefix '{short_id}'"
        )))),
        _ => Err(anyhow!(CoreError::AmbiguousId(
            matches
                .into_iter()
                .map(|(id, title)| (id.to_string(), title))
                .collect()
        ))),
    }
}

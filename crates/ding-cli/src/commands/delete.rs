use anyhow::Result;
use chrono::Utc;
use ding_core::scheduler::Scheduler;
use owo_colors::OwoColorize;
use uuid::Uuid;

pub async fn delete_task(scheduler: &Scheduler, id: Uuid) -> Result<()> {
    scheduler.delete_task(id, Utc::now()).await?;
    println!("Deleted reminder {}.", id.to_string().yellow());
    Ok(())
}

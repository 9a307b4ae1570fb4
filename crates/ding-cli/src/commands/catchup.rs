use anyhow::Result;
use chrono::Utc;
use chrono_humanize::Humanize;
use ding_core::scheduler::Scheduler;

use crate::cli::CatchUpCommand;

pub async fn catch_up(scheduler: &Scheduler, command: CatchUpCommand) -> Result<()> {
    let report = scheduler.catch_up(Utc::now()).await?;
    if report.baseline_established {
        println!("First run: checkpoint established, nothing to catch up.");
    } else if report.notified == 0 && report.summarized == 0 {
        println!("Nothing missed.");
    } else {
        println!(
            "Caught up: {} notified, {} summarized, {} rolled forward.",
            report.notified, report.summarized, report.rolled_forward
        );
    }
    if command.verbose {
        match report.next_alarm {
            Some(at) => println!("Next alarm: {} ({})", at, at.humanize()),
            None => println!("Next alarm: none pending."),
        }
    }
    Ok(())
}

pub async fn rehydrate(scheduler: &Scheduler) -> Result<()> {
    match scheduler.rehydrate_all(Utc::now()).await? {
        Some(at) => println!("Alarm armed for {} ({}).", at, at.humanize()),
        None => println!("No pending reminder; alarm disarmed."),
    }
    Ok(())
}

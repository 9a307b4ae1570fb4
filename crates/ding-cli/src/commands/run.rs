use anyhow::Result;
use chrono::{Duration, Utc};
use ding_core::scheduler::Scheduler;
use ding_core::timer::AlarmFired;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::cli::RunCommand;

/// Wall-clock gap beyond which a missed tick is treated as a resume
/// from sleep rather than ordinary scheduler jitter.
const RESUME_GAP: i64 = 120;

const TICK_SECS: u64 = 60;

/// Foreground daemon loop: reconcile on start, then fire alarms as
/// they arrive and re-reconcile after any detected sleep gap.
pub async fn run(
    scheduler: &Scheduler,
    mut alarms: mpsc::Receiver<AlarmFired>,
    command: RunCommand,
    log_filter: &str,
) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_filter)),
        )
        .init();

    let report = if command.install {
        scheduler.on_install(Utc::now()).await?
    } else {
        scheduler.on_startup(Utc::now()).await?
    };
    tracing::info!(
        notified = report.notified,
        summarized = report.summarized,
        next_alarm = ?report.next_alarm,
        "daemon started"
    );

    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(TICK_SECS));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;
    let mut last_tick = Utc::now();

    loop {
        tokio::select! {
            fired = alarms.recv() => {
                let Some(fired) = fired else {
                    tracing::warn!("alarm channel closed; shutting down");
                    break;
                };
                let now = Utc::now();
                match scheduler.on_timer_fire(&fired.name, now).await {
                    Ok(Some(report)) => {
                        tracing::debug!(fired = report.fired, "alarm handled");
                    }
                    Ok(None) => {}
                    Err(e) => tracing::error!(error = %e, "due pass failed"),
                }
            }
            _ = ticker.tick() => {
                let now = Utc::now();
                // A tick that arrives far later than scheduled means
                // the host slept; reconcile what was missed.
                if now - last_tick > Duration::seconds(RESUME_GAP) {
                    tracing::info!("wall-clock gap detected; reconciling");
                    if let Err(e) = scheduler.on_idle_resume(now).await {
                        tracing::error!(error = %e, "resume catch-up failed");
                    }
                }
                last_tick = now;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted; shutting down");
                break;
            }
        }
    }
    Ok(())
}

//! Reconciliation passes over the task store.
//!
//! One `Scheduler` owns the store, notifier and timer seams and runs
//! every lifecycle trigger as a single serialized pass: catch-up after
//! downtime, due processing when the alarm fires, and rehydration of
//! the single system-wide alarm. Every entry point takes the pass gate
//! before touching the store, so passes never interleave.
//!
//! Within a pass, task mutations are persisted before the checkpoint
//! advances. A failure between the two re-delivers notifications on
//! the next trigger rather than losing them.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{NewTaskData, Settings, Task, DAY_MS, MIN_MS};
use crate::notify::{Notification, NotificationId, Notifier};
use crate::recurrence::{next_occurrence, select_next_alarm, RecurrenceOptions};
use crate::store::Store;
use crate::timer::{AlarmTimer, NEXT_DUE_ALARM};

/// Outcome of a catch-up pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatchUpReport {
    /// Misses notified with a full individual notification.
    pub notified: usize,
    /// Misses folded into the single summary notification.
    pub summarized: usize,
    /// Recurring tasks whose `due_at` was advanced.
    pub rolled_forward: usize,
    /// True when this pass only established the first-run baseline.
    pub baseline_established: bool,
    /// Target of the re-armed alarm, if any task is still pending.
    pub next_alarm: Option<DateTime<Utc>>,
}

/// Outcome of a due-processing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DueReport {
    /// Tasks notified as due (normally one, more under clock drift).
    pub fired: usize,
    pub rolled_forward: usize,
    pub next_alarm: Option<DateTime<Utc>>,
}

pub struct Scheduler {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    timer: Arc<dyn AlarmTimer>,
    /// Single-writer pass gate; see module docs.
    pass_gate: Mutex<()>,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        timer: Arc<dyn AlarmTimer>,
    ) -> Self {
        Self {
            store,
            notifier,
            timer,
            pass_gate: Mutex::new(()),
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle entry points
    // ------------------------------------------------------------------

    /// First-install hook: baseline the checkpoint so a brand-new
    /// install never floods notifications, then arm the alarm.
    pub async fn on_install(&self, now: DateTime<Utc>) -> Result<CatchUpReport, CoreError> {
        let _pass = self.pass_gate.lock().await;
        tracing::info!("install pass");
        self.advance_checkpoint(now).await?;
        self.catch_up_locked(now).await
    }

    pub async fn on_startup(&self, now: DateTime<Utc>) -> Result<CatchUpReport, CoreError> {
        let _pass = self.pass_gate.lock().await;
        tracing::info!("startup pass");
        self.catch_up_locked(now).await
    }

    /// Alarm-fire hook. Alarms under any name other than the one this
    /// scheduler arms are ignored.
    pub async fn on_timer_fire(
        &self,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<DueReport>, CoreError> {
        if name != NEXT_DUE_ALARM {
            tracing::debug!(name, "ignoring unknown alarm");
            return Ok(None);
        }
        let _pass = self.pass_gate.lock().await;
        self.process_due_locked(now).await.map(Some)
    }

    /// System idle-to-active transition: reconcile whatever was missed
    /// while the machine slept.
    pub async fn on_idle_resume(&self, now: DateTime<Utc>) -> Result<CatchUpReport, CoreError> {
        let _pass = self.pass_gate.lock().await;
        tracing::debug!("idle-resume pass");
        self.catch_up_locked(now).await
    }

    // ------------------------------------------------------------------
    // Explicit requests
    // ------------------------------------------------------------------

    /// Reconciles misses since the checkpoint; see module docs for the
    /// window/split semantics.
    pub async fn catch_up(&self, now: DateTime<Utc>) -> Result<CatchUpReport, CoreError> {
        let _pass = self.pass_gate.lock().await;
        self.catch_up_locked(now).await
    }

    /// Processes everything due at or before `now`, as when the alarm
    /// fires.
    pub async fn process_due_now(&self, now: DateTime<Utc>) -> Result<DueReport, CoreError> {
        let _pass = self.pass_gate.lock().await;
        self.process_due_locked(now).await
    }

    /// Recomputes and re-arms the single alarm from current task
    /// state. Idempotent.
    pub async fn rehydrate_all(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, CoreError> {
        let _pass = self.pass_gate.lock().await;
        self.rehydrate_locked(now).await
    }

    // ------------------------------------------------------------------
    // User actions
    // ------------------------------------------------------------------

    pub async fn create_task(
        &self,
        data: NewTaskData,
        now: DateTime<Utc>,
    ) -> Result<Task, CoreError> {
        if data.title.trim().is_empty() {
            return Err(CoreError::InvalidInput("task title is empty".to_string()));
        }
        let _pass = self.pass_gate.lock().await;
        // A task without an explicit due time is a quick reminder for
        // five minutes from now.
        let due_at = data
            .due_at
            .unwrap_or_else(|| now + Duration::milliseconds(5 * MIN_MS));
        let task = Task {
            title: data.title,
            note: data.note,
            due_at,
            base_at: due_at,
            repeat: data.repeat.unwrap_or_default(),
            priority: data.priority.unwrap_or_default(),
            tags: data.tags,
            created_at: now,
            updated_at: now,
            ..Default::default()
        };
        let mut tasks = self.store.load_tasks().await?;
        tasks.push(task.clone());
        self.store.replace_tasks(&tasks).await?;
        self.rehydrate_locked(now).await?;
        Ok(task)
    }

    pub async fn complete_task(&self, id: Uuid, now: DateTime<Utc>) -> Result<Task, CoreError> {
        let _pass = self.pass_gate.lock().await;
        let mut tasks = self.store.load_tasks().await?;
        let task = Self::find_mut(&mut tasks, id)?;
        task.done = true;
        task.updated_at = now;
        let completed = task.clone();
        self.store.replace_tasks(&tasks).await?;
        self.rehydrate_locked(now).await?;
        Ok(completed)
    }

    /// Pushes `due_at` out by the given minutes (default: the settings
    /// snooze). Snooze does not touch `base_at`, so the next regular
    /// occurrence keeps the anchor's wall clock.
    pub async fn snooze_task(
        &self,
        id: Uuid,
        minutes: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<Task, CoreError> {
        let _pass = self.pass_gate.lock().await;
        let settings = self.store.load_settings().await?;
        let minutes = i64::from(minutes.unwrap_or(settings.default_snooze_min).max(1));
        let mut tasks = self.store.load_tasks().await?;
        let task = Self::find_mut(&mut tasks, id)?;
        task.due_at = now + Duration::milliseconds(minutes * MIN_MS);
        task.updated_at = now;
        let snoozed = task.clone();
        self.store.replace_tasks(&tasks).await?;
        self.rehydrate_locked(now).await?;
        Ok(snoozed)
    }

    pub async fn delete_task(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), CoreError> {
        let _pass = self.pass_gate.lock().await;
        let mut tasks = self.store.load_tasks().await?;
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == before {
            return Err(CoreError::NotFound(id.to_string()));
        }
        self.store.replace_tasks(&tasks).await?;
        self.rehydrate_locked(now).await?;
        Ok(())
    }

    /// Handles a button press reported back from a task notification:
    /// button 0 marks done, button 1 snoozes (when snooze is enabled).
    /// Other indices are ignored.
    pub async fn on_notification_action(
        &self,
        task_id: Uuid,
        button_index: usize,
        notification: Option<&NotificationId>,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let _pass = self.pass_gate.lock().await;
        let settings = self.store.load_settings().await?;
        let mut tasks = self.store.load_tasks().await?;
        let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) else {
            // The task may have been deleted since the notification
            // was shown; nothing to do.
            return Ok(());
        };
        match button_index {
            0 => {
                task.done = true;
                task.updated_at = now;
            }
            1 if settings.enable_snooze => {
                let minutes = i64::from(settings.default_snooze_min.max(1));
                task.due_at = now + Duration::milliseconds(minutes * MIN_MS);
                task.updated_at = now;
            }
            _ => return Ok(()),
        }
        self.store.replace_tasks(&tasks).await?;
        if let Some(id) = notification {
            if let Err(e) = self.notifier.clear(id).await {
                tracing::warn!(error = %e, "failed to clear notification");
            }
        }
        self.rehydrate_locked(now).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read access for hosts/UI
    // ------------------------------------------------------------------

    pub async fn tasks(&self) -> Result<Vec<Task>, CoreError> {
        self.store.load_tasks().await
    }

    pub async fn settings(&self) -> Result<Settings, CoreError> {
        self.store.load_settings().await
    }

    pub async fn update_settings(
        &self,
        settings: Settings,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        {
            let _pass = self.pass_gate.lock().await;
            self.store.save_settings(&settings).await?;
            self.rehydrate_locked(now).await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Passes (pass gate held by caller)
    // ------------------------------------------------------------------

    async fn catch_up_locked(&self, now: DateTime<Utc>) -> Result<CatchUpReport, CoreError> {
        let settings = self.store.load_settings().await?;
        let Some(checkpoint) = self.store.last_checked_at().await? else {
            // First run: establish the baseline, never notify.
            tracing::info!("no checkpoint; establishing baseline");
            self.store.set_last_checked_at(now).await?;
            let next_alarm = self.rehydrate_locked(now).await?;
            return Ok(CatchUpReport {
                baseline_established: true,
                next_alarm,
                ..Default::default()
            });
        };

        // Misses older than the window are dropped silently; this
        // bounds the backlog after long downtime.
        let window_start =
            checkpoint.max(now - Duration::milliseconds(settings.catchup_window_ms.max(0)));
        let mut tasks = self.store.load_tasks().await?;
        let mut due: Vec<usize> = tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_active() && t.due_at > window_start && t.due_at <= now)
            .map(|(i, _)| i)
            .collect();
        due.sort_by_key(|&i| tasks[i].due_at);

        if due.is_empty() {
            self.advance_checkpoint(now).await?;
            let next_alarm = self.rehydrate_locked(now).await?;
            return Ok(CatchUpReport {
                next_alarm,
                ..Default::default()
            });
        }

        let limit = settings.max_individual_catchup;
        let notified = due.len().min(limit);
        let summarized = due.len() - notified;
        for &idx in due.iter().take(limit) {
            self.deliver(&Notification::for_task(&tasks[idx], &settings))
                .await;
        }
        if summarized > 0 {
            self.deliver(&Notification::summary(summarized)).await;
        }

        // Every selected task rolls forward, summarized ones included.
        // Non-repeating tasks keep their past due_at and go inert.
        let opts = RecurrenceOptions::from_settings(&settings)?;
        let mut rolled_forward = 0;
        let mut changed = false;
        for &idx in &due {
            if let Some(next) = next_occurrence(now, &tasks[idx], &opts) {
                tasks[idx].due_at = next;
                tasks[idx].updated_at = now;
                rolled_forward += 1;
                changed = true;
            }
        }
        if changed {
            self.store.replace_tasks(&tasks).await?;
        }
        self.advance_checkpoint(now).await?;
        let next_alarm = self.rehydrate_locked(now).await?;

        tracing::info!(notified, summarized, rolled_forward, "catch-up pass complete");
        Ok(CatchUpReport {
            notified,
            summarized,
            rolled_forward,
            baseline_established: false,
            next_alarm,
        })
    }

    async fn process_due_locked(&self, now: DateTime<Utc>) -> Result<DueReport, CoreError> {
        let settings = self.store.load_settings().await?;
        let opts = RecurrenceOptions::from_settings(&settings)?;
        let mut tasks = self.store.load_tasks().await?;

        // Normally exactly the alarm's target is due, but shared
        // timestamps or a late timer can make it several.
        let mut fired = 0;
        let mut rolled_forward = 0;
        let mut changed = false;
        for task in tasks.iter_mut().filter(|t| t.is_active()) {
            if task.due_at > now {
                continue;
            }
            self.deliver(&Notification::for_task(task, &settings)).await;
            fired += 1;
            if let Some(next) = next_occurrence(now, task, &opts) {
                task.due_at = next;
                task.updated_at = now;
                rolled_forward += 1;
                changed = true;
            }
        }
        if changed {
            self.store.replace_tasks(&tasks).await?;
        }
        // Checkpoint moves last so the same firing is never re-notified
        // by the next catch-up.
        self.advance_checkpoint(now).await?;
        let next_alarm = self.rehydrate_locked(now).await?;

        tracing::info!(fired, rolled_forward, "due pass complete");
        Ok(DueReport {
            fired,
            rolled_forward,
            next_alarm,
        })
    }

    /// Prunes, then re-arms the one alarm at the nearest pending due
    /// time. No candidate means no alarm: the system idles until the
    /// next lifecycle event.
    async fn rehydrate_locked(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, CoreError> {
        self.prune_completed_locked(now).await?;
        let tasks = self.store.load_tasks().await?;
        let next = select_next_alarm(&tasks, now);
        self.timer.cancel(NEXT_DUE_ALARM).await?;
        match next {
            Some(fire_at) => {
                self.timer.schedule(NEXT_DUE_ALARM, fire_at).await?;
                tracing::debug!(%fire_at, "alarm armed");
            }
            None => {
                tracing::debug!("no pending task; alarm disarmed");
            }
        }
        Ok(next)
    }

    /// Drops completed tasks past the retention window. Retention 0
    /// disables pruning.
    async fn prune_completed_locked(&self, now: DateTime<Utc>) -> Result<usize, CoreError> {
        let settings = self.store.load_settings().await?;
        let days = i64::from(settings.completed_retention_days);
        if days <= 0 {
            return Ok(0);
        }
        let cutoff = now - Duration::milliseconds(days * DAY_MS);
        let tasks = self.store.load_tasks().await?;
        let before = tasks.len();
        let kept: Vec<Task> = tasks
            .into_iter()
            .filter(|t| !t.done || t.updated_at.max(t.due_at) > cutoff)
            .collect();
        let pruned = before - kept.len();
        if pruned > 0 {
            self.store.replace_tasks(&kept).await?;
            tracing::debug!(pruned, "pruned completed tasks");
        }
        Ok(pruned)
    }

    /// The checkpoint never moves backward, even from a stale caller.
    async fn advance_checkpoint(&self, now: DateTime<Utc>) -> Result<(), CoreError> {
        let target = match self.store.last_checked_at().await? {
            Some(current) => current.max(now),
            None => now,
        };
        self.store.set_last_checked_at(target).await
    }

    /// Delivery failure is logged and swallowed: a dropped
    /// notification still leaves the task visible as overdue in-app.
    async fn deliver(&self, notification: &Notification) {
        if let Err(e) = self.notifier.notify(notification).await {
            tracing::warn!(error = %e, "notification delivery failed");
        }
    }

    fn find_mut(tasks: &mut [Task], id: Uuid) -> Result<&mut Task, CoreError> {
        tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| CoreError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::CaptureNotifier;
    use crate::store::{CheckpointStore, MemoryStore, TaskStore};
    use crate::timer::RecordingTimer;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn scheduler() -> (Scheduler, Arc<MemoryStore>, Arc<CaptureNotifier>, Arc<RecordingTimer>) {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(CaptureNotifier::new());
        let timer = Arc::new(RecordingTimer::new());
        let scheduler = Scheduler::new(store.clone(), notifier.clone(), timer.clone());
        (scheduler, store, notifier, timer)
    }

    #[tokio::test]
    async fn checkpoint_never_moves_backward() {
        let (scheduler, store, _, _) = scheduler();
        let later = utc(2024, 6, 1, 12, 0);
        let earlier = utc(2024, 6, 1, 11, 0);
        scheduler.catch_up(later).await.unwrap();
        scheduler.catch_up(earlier).await.unwrap();
        assert_eq!(store.last_checked_at().await.unwrap(), Some(later));
    }

    #[tokio::test]
    async fn prune_respects_retention_window() {
        let (scheduler, store, _, _) = scheduler();
        let now = utc(2024, 6, 1, 12, 0);
        let old_done = Task {
            done: true,
            due_at: now - Duration::days(40),
            updated_at: now - Duration::days(40),
            ..Default::default()
        };
        let recent_done = Task {
            done: true,
            due_at: now - Duration::days(2),
            updated_at: now - Duration::days(2),
            ..Default::default()
        };
        let active = Task {
            due_at: now - Duration::days(100),
            updated_at: now - Duration::days(100),
            ..Default::default()
        };
        store
            .replace_tasks(&[old_done, recent_done.clone(), active.clone()])
            .await
            .unwrap();

        scheduler.rehydrate_all(now).await.unwrap();
        let remaining = store.load_tasks().await.unwrap();
        let ids: Vec<Uuid> = remaining.iter().map(|t| t.id).collect();
        assert_eq!(remaining.len(), 2);
        assert!(ids.contains(&recent_done.id));
        assert!(ids.contains(&active.id));
    }

    #[tokio::test]
    async fn zero_retention_disables_pruning() {
        let (scheduler, store, _, _) = {
            let mut settings = Settings::default();
            settings.completed_retention_days = 0;
            let store = Arc::new(MemoryStore::with_settings(settings));
            let notifier = Arc::new(CaptureNotifier::new());
            let timer = Arc::new(RecordingTimer::new());
            let s = Scheduler::new(store.clone(), notifier.clone(), timer.clone());
            (s, store, notifier, timer)
        };
        let now = utc(2024, 6, 1, 12, 0);
        let ancient_done = Task {
            done: true,
            due_at: now - Duration::days(400),
            updated_at: now - Duration::days(400),
            ..Default::default()
        };
        store.replace_tasks(&[ancient_done]).await.unwrap();
        scheduler.rehydrate_all(now).await.unwrap();
        assert_eq!(store.load_tasks().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_task_requires_title() {
        let (scheduler, _, _, _) = scheduler();
        let err = scheduler
            .create_task(NewTaskData::default(), utc(2024, 1, 1, 0, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn quick_task_defaults_to_five_minutes_out() {
        let (scheduler, _, _, timer) = scheduler();
        let now = utc(2024, 1, 1, 9, 0);
        let task = scheduler
            .create_task(
                NewTaskData {
                    title: "quick".to_string(),
                    ..Default::default()
                },
                now,
            )
            .await
            .unwrap();
        assert_eq!(task.due_at, utc(2024, 1, 1, 9, 5));
        assert_eq!(task.base_at, task.due_at);
        assert_eq!(timer.armed_at(NEXT_DUE_ALARM), Some(task.due_at));
    }
}

//! End-to-end reconciliation scenarios over the in-memory store, the
//! capturing notifier and the recording timer.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use ding_core::models::{NewTaskData, RepeatRule, Settings, Task, HOUR_MS};
use ding_core::notify::{CaptureNotifier, NotificationKind};
use ding_core::scheduler::Scheduler;
use ding_core::store::{CheckpointStore, MemoryStore, TaskStore};
use ding_core::timer::{RecordingTimer, NEXT_DUE_ALARM};
use uuid::Uuid;

struct Harness {
    scheduler: Scheduler,
    store: Arc<MemoryStore>,
    notifier: Arc<CaptureNotifier>,
    timer: Arc<RecordingTimer>,
}

fn harness() -> Harness {
    harness_with(Settings::default())
}

fn harness_with(settings: Settings) -> Harness {
    let store = Arc::new(MemoryStore::with_settings(settings));
    let notifier = Arc::new(CaptureNotifier::new());
    let timer = Arc::new(RecordingTimer::new());
    let scheduler = Scheduler::new(store.clone(), notifier.clone(), timer.clone());
    Harness {
        scheduler,
        store,
        notifier,
        timer,
    }
}

fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

fn one_shot(title: &str, due_at: DateTime<Utc>) -> Task {
    Task {
        title: title.to_string(),
        due_at,
        base_at: due_at,
        ..Default::default()
    }
}

fn daily(title: &str, due_at: DateTime<Utc>) -> Task {
    Task {
        repeat: RepeatRule::Daily { interval: 1 },
        ..one_shot(title, due_at)
    }
}

#[tokio::test]
async fn first_catch_up_establishes_baseline_without_notifying() {
    let h = harness();
    let now = utc(2024, 6, 1, 12, 0);
    // An overdue task exists, but the very first pass must not flood a
    // fresh install with notifications.
    h.store
        .replace_tasks(&[one_shot("old", now - Duration::hours(2))])
        .await
        .unwrap();

    let report = h.scheduler.catch_up(now).await.unwrap();
    assert!(report.baseline_established);
    assert_eq!(report.notified, 0);
    assert!(h.notifier.delivered().is_empty());
    assert_eq!(h.store.last_checked_at().await.unwrap(), Some(now));
}

#[tokio::test]
async fn catch_up_notifies_misses_inside_window_once() {
    let h = harness();
    let checkpoint = utc(2024, 6, 1, 8, 0);
    let now = utc(2024, 6, 1, 12, 0);
    h.store.set_last_checked_at(checkpoint).await.unwrap();

    let missed = one_shot("dentist", utc(2024, 6, 1, 10, 0));
    let future = one_shot("groceries", utc(2024, 6, 1, 18, 0));
    h.store
        .replace_tasks(&[missed.clone(), future.clone()])
        .await
        .unwrap();

    let report = h.scheduler.catch_up(now).await.unwrap();
    assert_eq!(report.notified, 1);
    assert_eq!(report.summarized, 0);

    let delivered = h.notifier.task_notifications();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].kind, NotificationKind::Task(missed.id));

    // A second catch-up from the advanced checkpoint re-notifies nothing.
    let report = h.scheduler.catch_up(now + Duration::minutes(1)).await.unwrap();
    assert_eq!(report.notified, 0);
    assert_eq!(h.notifier.task_notifications().len(), 1);
}

#[tokio::test]
async fn catch_up_drops_misses_older_than_window() {
    let mut settings = Settings::default();
    settings.catchup_window_ms = 2 * HOUR_MS;
    let h = harness_with(settings);

    let now = utc(2024, 6, 2, 12, 0);
    // Checkpoint far in the past; the window, not the checkpoint,
    // bounds eligibility.
    h.store
        .set_last_checked_at(utc(2024, 6, 1, 0, 0))
        .await
        .unwrap();
    let stale = one_shot("stale", now - Duration::hours(5));
    let fresh = one_shot("fresh", now - Duration::hours(1));
    h.store
        .replace_tasks(&[stale.clone(), fresh.clone()])
        .await
        .unwrap();

    let report = h.scheduler.catch_up(now).await.unwrap();
    assert_eq!(report.notified, 1);
    let delivered = h.notifier.task_notifications();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].kind, NotificationKind::Task(fresh.id));
}

#[tokio::test]
async fn catch_up_batches_overflow_into_one_summary() {
    let mut settings = Settings::default();
    settings.max_individual_catchup = 2;
    let h = harness_with(settings);

    let now = utc(2024, 6, 1, 12, 0);
    h.store
        .set_last_checked_at(utc(2024, 6, 1, 6, 0))
        .await
        .unwrap();
    let tasks: Vec<Task> = (0u32..5)
        .map(|i| one_shot(&format!("miss {i}"), utc(2024, 6, 1, 7, i)))
        .collect();
    h.store.replace_tasks(&tasks).await.unwrap();

    let report = h.scheduler.catch_up(now).await.unwrap();
    assert_eq!(report.notified, 2);
    assert_eq!(report.summarized, 3);

    // Exactly k individual notifications, targeting the earliest misses.
    let individual = h.notifier.task_notifications();
    assert_eq!(individual.len(), 2);
    assert_eq!(individual[0].kind, NotificationKind::Task(tasks[0].id));
    assert_eq!(individual[1].kind, NotificationKind::Task(tasks[1].id));

    // Exactly one summary carrying only the overflow count.
    let summaries = h.notifier.summary_notifications();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].kind, NotificationKind::Summary { missed: 3 });
}

#[tokio::test]
async fn catch_up_rolls_summarized_tasks_forward_too() {
    let mut settings = Settings::default();
    settings.max_individual_catchup = 1;
    let h = harness_with(settings);

    let now = utc(2024, 6, 1, 12, 0);
    h.store
        .set_last_checked_at(utc(2024, 6, 1, 6, 0))
        .await
        .unwrap();
    let tasks = vec![
        daily("first", utc(2024, 6, 1, 7, 0)),
        daily("second", utc(2024, 6, 1, 8, 0)),
        daily("third", utc(2024, 6, 1, 9, 0)),
    ];
    h.store.replace_tasks(&tasks).await.unwrap();

    let report = h.scheduler.catch_up(now).await.unwrap();
    assert_eq!(report.notified, 1);
    assert_eq!(report.summarized, 2);
    assert_eq!(report.rolled_forward, 3);

    // Every selected task advanced one day, summarized ones included.
    let stored = h.store.load_tasks().await.unwrap();
    assert_eq!(stored[0].due_at, utc(2024, 6, 2, 7, 0));
    assert_eq!(stored[1].due_at, utc(2024, 6, 2, 8, 0));
    assert_eq!(stored[2].due_at, utc(2024, 6, 2, 9, 0));
}

#[tokio::test]
async fn missed_one_shot_goes_inert_not_rescheduled() {
    let h = harness();
    let now = utc(2024, 6, 1, 12, 0);
    h.store
        .set_last_checked_at(utc(2024, 6, 1, 6, 0))
        .await
        .unwrap();
    let missed = one_shot("one-shot", utc(2024, 6, 1, 9, 0));
    h.store.replace_tasks(&[missed.clone()]).await.unwrap();

    let report = h.scheduler.catch_up(now).await.unwrap();
    assert_eq!(report.notified, 1);
    assert_eq!(report.rolled_forward, 0);

    // due_at stays in the past; the task is inert until the user acts,
    // and no alarm is armed for it.
    let stored = h.store.load_tasks().await.unwrap();
    assert_eq!(stored[0].due_at, missed.due_at);
    assert!(!stored[0].done);
    assert_eq!(h.timer.armed_count(), 0);
}

#[tokio::test]
async fn rehydrate_arms_single_alarm_at_nearest_due() {
    let h = harness();
    let now = utc(2024, 6, 1, 12, 0);
    let t1 = utc(2024, 6, 1, 14, 0);
    let t2 = utc(2024, 6, 1, 18, 0);
    h.store
        .replace_tasks(&[one_shot("later", t2), one_shot("sooner", t1)])
        .await
        .unwrap();

    let next = h.scheduler.rehydrate_all(now).await.unwrap();
    assert_eq!(next, Some(t1));
    assert_eq!(h.timer.armed_count(), 1);
    assert_eq!(h.timer.armed_at(NEXT_DUE_ALARM), Some(t1));
}

#[tokio::test]
async fn rehydrate_is_idempotent() {
    let h = harness();
    let now = utc(2024, 6, 1, 12, 0);
    let due = utc(2024, 6, 1, 15, 0);
    h.store.replace_tasks(&[one_shot("solo", due)]).await.unwrap();

    let first = h.scheduler.rehydrate_all(now).await.unwrap();
    let second = h.scheduler.rehydrate_all(now).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(h.timer.armed_count(), 1);
    assert_eq!(h.timer.armed_at(NEXT_DUE_ALARM), Some(due));
    // The old alarm is cleared before each re-arm.
    assert_eq!(h.timer.cancel_calls(), 2);
    assert_eq!(h.timer.schedule_calls(), 2);
}

#[tokio::test]
async fn rehydrate_disarms_when_nothing_pending() {
    let h = harness();
    let now = utc(2024, 6, 1, 12, 0);
    h.store
        .replace_tasks(&[one_shot("past", now - Duration::hours(1))])
        .await
        .unwrap();

    let next = h.scheduler.rehydrate_all(now).await.unwrap();
    assert_eq!(next, None);
    assert_eq!(h.timer.armed_count(), 0);
}

#[tokio::test]
async fn due_processing_fires_rolls_forward_and_rearms() {
    let h = harness();
    let due = utc(2024, 6, 1, 9, 0);
    let task = daily("standup", due);
    h.store.replace_tasks(&[task.clone()]).await.unwrap();

    let now = due + Duration::seconds(1);
    let report = h.scheduler.on_timer_fire(NEXT_DUE_ALARM, now).await.unwrap().unwrap();
    assert_eq!(report.fired, 1);
    assert_eq!(report.rolled_forward, 1);

    let next_due = utc(2024, 6, 2, 9, 0);
    assert_eq!(report.next_alarm, Some(next_due));
    assert_eq!(h.timer.armed_at(NEXT_DUE_ALARM), Some(next_due));
    assert_eq!(h.store.last_checked_at().await.unwrap(), Some(now));

    let delivered = h.notifier.task_notifications();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].kind, NotificationKind::Task(task.id));
}

#[tokio::test]
async fn late_timer_fire_picks_up_everything_due() {
    let h = harness();
    let now = utc(2024, 6, 1, 12, 0);
    // Two tasks came due while the timer was delayed.
    h.store
        .replace_tasks(&[
            daily("a", utc(2024, 6, 1, 9, 0)),
            one_shot("b", utc(2024, 6, 1, 11, 0)),
            one_shot("untouched", utc(2024, 6, 1, 20, 0)),
        ])
        .await
        .unwrap();

    let report = h.scheduler.process_due_now(now).await.unwrap();
    assert_eq!(report.fired, 2);
    assert_eq!(report.rolled_forward, 1);
    assert_eq!(report.next_alarm, Some(utc(2024, 6, 1, 20, 0)));
}

#[tokio::test]
async fn due_processing_updates_checkpoint_so_catch_up_stays_quiet() {
    let h = harness();
    let due = utc(2024, 6, 1, 9, 0);
    h.store.replace_tasks(&[one_shot("once", due)]).await.unwrap();
    h.store
        .set_last_checked_at(utc(2024, 6, 1, 8, 0))
        .await
        .unwrap();

    let fire_time = due + Duration::minutes(1);
    h.scheduler.process_due_now(fire_time).await.unwrap();
    assert_eq!(h.notifier.task_notifications().len(), 1);

    // The idle-resume catch-up right after must not re-notify.
    h.scheduler
        .on_idle_resume(fire_time + Duration::minutes(5))
        .await
        .unwrap();
    assert_eq!(h.notifier.task_notifications().len(), 1);
}

#[tokio::test]
async fn unknown_alarm_name_is_ignored() {
    let h = harness();
    h.store
        .replace_tasks(&[one_shot("due", utc(2024, 6, 1, 9, 0))])
        .await
        .unwrap();
    let report = h
        .scheduler
        .on_timer_fire("some-other-alarm", utc(2024, 6, 1, 10, 0))
        .await
        .unwrap();
    assert!(report.is_none());
    assert!(h.notifier.delivered().is_empty());
}

#[tokio::test]
async fn notification_failure_still_advances_task_state() {
    let h = harness();
    let due = utc(2024, 6, 1, 9, 0);
    h.store.replace_tasks(&[daily("flaky", due)]).await.unwrap();
    h.notifier.set_failing(true);

    let now = due + Duration::minutes(1);
    let report = h.scheduler.process_due_now(now).await.unwrap();
    assert_eq!(report.fired, 1);
    assert_eq!(report.rolled_forward, 1);
    assert_eq!(
        h.store.load_tasks().await.unwrap()[0].due_at,
        utc(2024, 6, 2, 9, 0)
    );
}

#[tokio::test]
async fn archived_and_done_tasks_never_fire() {
    let h = harness();
    let now = utc(2024, 6, 1, 12, 0);
    let mut archived = one_shot("archived", now - Duration::hours(1));
    archived.archived = true;
    let mut done = one_shot("done", now - Duration::hours(1));
    done.done = true;
    h.store.replace_tasks(&[archived, done]).await.unwrap();

    let report = h.scheduler.process_due_now(now).await.unwrap();
    assert_eq!(report.fired, 0);
    assert!(h.notifier.delivered().is_empty());
    assert_eq!(h.timer.armed_count(), 0);
}

#[tokio::test]
async fn notification_done_button_completes_task() {
    let h = harness();
    let now = utc(2024, 6, 1, 12, 0);
    let task = one_shot("chore", now + Duration::hours(1));
    h.store.replace_tasks(&[task.clone()]).await.unwrap();

    h.scheduler
        .on_notification_action(task.id, 0, None, now)
        .await
        .unwrap();
    let stored = h.store.load_tasks().await.unwrap();
    assert!(stored[0].done);
    // Nothing pending any more, so the alarm is disarmed.
    assert_eq!(h.timer.armed_count(), 0);
}

#[tokio::test]
async fn notification_snooze_button_respects_enable_flag() {
    let mut settings = Settings::default();
    settings.default_snooze_min = 15;
    let h = harness_with(settings);
    let now = utc(2024, 6, 1, 12, 0);
    let task = one_shot("nap", now - Duration::minutes(1));
    h.store.replace_tasks(&[task.clone()]).await.unwrap();

    h.scheduler
        .on_notification_action(task.id, 1, None, now)
        .await
        .unwrap();
    assert_eq!(
        h.store.load_tasks().await.unwrap()[0].due_at,
        now + Duration::minutes(15)
    );

    // With snooze disabled the button press is a no-op.
    let mut settings = Settings::default();
    settings.enable_snooze = false;
    let h = harness_with(settings);
    let task = one_shot("nap", now - Duration::minutes(1));
    h.store.replace_tasks(&[task.clone()]).await.unwrap();
    h.scheduler
        .on_notification_action(task.id, 1, None, now)
        .await
        .unwrap();
    assert_eq!(h.store.load_tasks().await.unwrap()[0].due_at, task.due_at);
}

#[tokio::test]
async fn notification_action_for_deleted_task_is_a_noop() {
    let h = harness();
    let now = utc(2024, 6, 1, 12, 0);
    h.scheduler
        .on_notification_action(Uuid::now_v7(), 0, None, now)
        .await
        .unwrap();
    assert!(h.store.load_tasks().await.unwrap().is_empty());
}

#[tokio::test]
async fn snooze_leaves_anchor_untouched() {
    let h = harness();
    let now = utc(2024, 6, 1, 12, 0);
    let task = daily("water plants", utc(2024, 6, 1, 9, 0));
    h.store.replace_tasks(&[task.clone()]).await.unwrap();

    let snoozed = h
        .scheduler
        .snooze_task(task.id, Some(30), now)
        .await
        .unwrap();
    assert_eq!(snoozed.due_at, now + Duration::minutes(30));
    assert_eq!(snoozed.base_at, task.base_at);
    assert_eq!(h.timer.armed_at(NEXT_DUE_ALARM), Some(snoozed.due_at));
}

#[tokio::test]
async fn install_then_startup_produces_no_duplicate_noise() {
    let h = harness();
    let install_at = utc(2024, 6, 1, 9, 0);
    h.store
        .replace_tasks(&[one_shot("preexisting overdue", utc(2024, 6, 1, 8, 0))])
        .await
        .unwrap();

    let report = h.scheduler.on_install(install_at).await.unwrap();
    assert_eq!(report.notified + report.summarized, 0);

    // Startup an hour later: the overdue task predates the install
    // checkpoint and stays silent.
    let report = h
        .scheduler
        .on_startup(install_at + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(report.notified, 0);
    assert!(h.notifier.delivered().is_empty());
}

#[tokio::test]
async fn create_with_due_date_arms_alarm_and_lists() {
    let h = harness();
    let now = utc(2024, 6, 1, 9, 0);
    let due = utc(2024, 6, 2, 7, 30);
    let created = h
        .scheduler
        .create_task(
            NewTaskData {
                title: "flight check-in".to_string(),
                note: Some("seat selection".to_string()),
                due_at: Some(due),
                repeat: Some(RepeatRule::None),
                tags: vec!["travel".to_string()],
                ..Default::default()
            },
            now,
        )
        .await
        .unwrap();

    assert_eq!(created.due_at, due);
    assert_eq!(h.timer.armed_at(NEXT_DUE_ALARM), Some(due));

    let listed = h.scheduler.tasks().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].tags, vec!["travel".to_string()]);

    h.scheduler.delete_task(created.id, now).await.unwrap();
    assert!(h.scheduler.tasks().await.unwrap().is_empty());
    assert_eq!(h.timer.armed_count(), 0);
}

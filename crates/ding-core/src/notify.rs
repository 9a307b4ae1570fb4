//! Notification delivery seam.
//!
//! The scheduler renders a [`Notification`] and hands it to a
//! [`Notifier`]. Delivery failure is never fatal to a pass: the task
//! still rolls forward and shows up in-app as overdue.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Settings, Task};

/// Errors that can occur during notification delivery.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification backend failed: {0}")]
    Backend(String),

    #[error("Unknown notification id: {0}")]
    UnknownId(String),
}

/// Opaque handle for a delivered notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationId(pub String);

/// What a notification is about. Button indices are reported back
/// against task notifications (0 = done, 1 = snooze when enabled).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    Task(Uuid),
    Summary { missed: usize },
}

/// A rendered notification ready for delivery.
#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    /// Labeled action buttons, in index order.
    pub buttons: Vec<String>,
    pub require_interaction: bool,
}

impl Notification {
    /// Builds the individual notification for a due task. The due time
    /// is rendered as local wall clock in the settings timezone.
    pub fn for_task(task: &Task, settings: &Settings) -> Self {
        let tz: Tz = settings.timezone.parse().unwrap_or(chrono_tz::UTC);
        let when = task.due_at.with_timezone(&tz).format("%Y-%m-%d %H:%M");
        let body = match &task.note {
            Some(note) if !note.is_empty() => format!("{note}\n({when})"),
            _ => format!("{when}"),
        };
        let mut buttons = vec!["Done".to_string()];
        if settings.enable_snooze {
            buttons.push(format!("Snooze {} min", settings.default_snooze_min));
        }
        Self {
            kind: NotificationKind::Task(task.id),
            title: task.title.clone(),
            body,
            buttons,
            require_interaction: settings.notification_require_interaction,
        }
    }

    /// Builds the combined catch-up summary. Carries only a count and
    /// no action buttons.
    pub fn summary(missed: usize) -> Self {
        Self {
            kind: NotificationKind::Summary { missed },
            title: "Missed reminders".to_string(),
            body: format!("{missed} reminders were due while ding was not running"),
            buttons: Vec::new(),
            require_interaction: false,
        }
    }
}

/// Trait for notification backends.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification, returning an id usable with `clear`.
    async fn notify(&self, notification: &Notification) -> Result<NotificationId, NotifyError>;

    /// Dismiss a previously delivered notification.
    async fn clear(&self, id: &NotificationId) -> Result<(), NotifyError>;
}

/// Notifier that writes to the tracing log. The daemon's default when
/// no desktop backend is wired up.
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<NotificationId, NotifyError> {
        match &notification.kind {
            NotificationKind::Task(task_id) => {
                tracing::info!(%task_id, title = %notification.title, body = %notification.body, "reminder due");
                Ok(NotificationId(format!("task::{task_id}::{}", Utc::now().timestamp_millis())))
            }
            NotificationKind::Summary { missed } => {
                tracing::info!(missed, "missed-reminder summary");
                Ok(NotificationId(format!("summary::{}", Utc::now().timestamp_millis())))
            }
        }
    }

    async fn clear(&self, _id: &NotificationId) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Test notifier that records every delivery.
#[derive(Default)]
pub struct CaptureNotifier {
    delivered: Mutex<Vec<Notification>>,
    cleared: Mutex<Vec<NotificationId>>,
    /// When set, `notify` fails; used to exercise degraded delivery.
    fail: Mutex<bool>,
}

impl CaptureNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().expect("notifier poisoned").clone()
    }

    pub fn cleared(&self) -> Vec<NotificationId> {
        self.cleared.lock().expect("notifier poisoned").clone()
    }

    pub fn task_notifications(&self) -> Vec<Notification> {
        self.delivered()
            .into_iter()
            .filter(|n| matches!(n.kind, NotificationKind::Task(_)))
            .collect()
    }

    pub fn summary_notifications(&self) -> Vec<Notification> {
        self.delivered()
            .into_iter()
            .filter(|n| matches!(n.kind, NotificationKind::Summary { .. }))
            .collect()
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().expect("notifier poisoned") = fail;
    }
}

#[async_trait]
impl Notifier for CaptureNotifier {
    async fn notify(&self, notification: &Notification) -> Result<NotificationId, NotifyError> {
        if *self.fail.lock().expect("notifier poisoned") {
            return Err(NotifyError::Backend("capture notifier set to fail".to_string()));
        }
        let mut delivered = self.delivered.lock().expect("notifier poisoned");
        delivered.push(notification.clone());
        Ok(NotificationId(format!("capture::{}", delivered.len())))
    }

    async fn clear(&self, id: &NotificationId) -> Result<(), NotifyError> {
        self.cleared.lock().expect("notifier poisoned").push(id.clone());
        Ok(())
    }
}

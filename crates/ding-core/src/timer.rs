//! External one-shot timer seam.
//!
//! The scheduler maintains one named alarm pointed at the nearest
//! pending due time. Delivery is at-least-once and may be late; the
//! due processor tolerates both.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::CoreError;

/// The single system-wide alarm name.
pub const NEXT_DUE_ALARM: &str = "next-due";

#[async_trait]
pub trait AlarmTimer: Send + Sync {
    /// Arms (or re-arms) the named alarm. Scheduling over an existing
    /// name replaces it.
    async fn schedule(&self, name: &str, fire_at: DateTime<Utc>) -> Result<(), CoreError>;

    /// Cancels the named alarm. Cancelling a name that is not armed
    /// is not an error.
    async fn cancel(&self, name: &str) -> Result<(), CoreError>;
}

/// A fired alarm, delivered to the host's event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmFired {
    pub name: String,
    pub scheduled_for: DateTime<Utc>,
}

/// Tokio-backed timer: each armed alarm is a task sleeping until its
/// deadline, then sending an [`AlarmFired`] message. The host drains
/// the receiver and calls back into the scheduler, which keeps passes
/// serialized.
pub struct TokioTimer {
    tx: mpsc::Sender<AlarmFired>,
    armed: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl TokioTimer {
    pub fn new() -> (Self, mpsc::Receiver<AlarmFired>) {
        let (tx, rx) = mpsc::channel(16);
        (
            Self {
                tx,
                armed: Mutex::new(HashMap::new()),
            },
            rx,
        )
    }
}

#[async_trait]
impl AlarmTimer for TokioTimer {
    async fn schedule(&self, name: &str, fire_at: DateTime<Utc>) -> Result<(), CoreError> {
        let delay = (fire_at - Utc::now())
            .to_std()
            .unwrap_or(StdDuration::ZERO);
        let deadline = tokio::time::Instant::now() + delay;
        let tx = self.tx.clone();
        let alarm_name = name.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let fired = AlarmFired {
                name: alarm_name.clone(),
                scheduled_for: fire_at,
            };
            if tx.send(fired).await.is_err() {
                tracing::debug!(name = %alarm_name, "alarm fired after host shut down");
            }
        });

        let mut armed = self
            .armed
            .lock()
            .map_err(|_| CoreError::Timer("timer state poisoned".to_string()))?;
        if let Some(previous) = armed.insert(name.to_string(), handle) {
            previous.abort();
        }
        Ok(())
    }

    async fn cancel(&self, name: &str) -> Result<(), CoreError> {
        let mut armed = self
            .armed
            .lock()
            .map_err(|_| CoreError::Timer("timer state poisoned".to_string()))?;
        if let Some(handle) = armed.remove(name) {
            handle.abort();
        }
        Ok(())
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        if let Ok(mut armed) = self.armed.lock() {
            for (_, handle) in armed.drain() {
                handle.abort();
            }
        }
    }
}

/// Timer that only records what was armed. Tests assert the
/// single-alarm invariant against it.
#[derive(Default)]
pub struct RecordingTimer {
    state: Mutex<RecordingState>,
}

#[derive(Default)]
struct RecordingState {
    armed: HashMap<String, DateTime<Utc>>,
    schedule_calls: usize,
    cancel_calls: usize,
}

impl RecordingTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently armed target for `name`, if any.
    pub fn armed_at(&self, name: &str) -> Option<DateTime<Utc>> {
        self.state.lock().expect("timer poisoned").armed.get(name).copied()
    }

    pub fn armed_count(&self) -> usize {
        self.state.lock().expect("timer poisoned").armed.len()
    }

    pub fn schedule_calls(&self) -> usize {
        self.state.lock().expect("timer poisoned").schedule_calls
    }

    pub fn cancel_calls(&self) -> usize {
        self.state.lock().expect("timer poisoned").cancel_calls
    }
}

#[async_trait]
impl AlarmTimer for RecordingTimer {
    async fn schedule(&self, name: &str, fire_at: DateTime<Utc>) -> Result<(), CoreError> {
        let mut state = self.state.lock().expect("timer poisoned");
        state.schedule_calls += 1;
        state.armed.insert(name.to_string(), fire_at);
        Ok(())
    }

    async fn cancel(&self, name: &str) -> Result<(), CoreError> {
        let mut state = self.state.lock().expect("timer poisoned");
        state.cancel_calls += 1;
        state.armed.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test(start_paused = true)]
    async fn tokio_timer_fires_after_deadline() {
        let (timer, mut rx) = TokioTimer::new();
        let fire_at = Utc::now() + Duration::seconds(30);
        timer.schedule(NEXT_DUE_ALARM, fire_at).await.unwrap();

        tokio::time::advance(StdDuration::from_secs(31)).await;
        let fired = rx.recv().await.expect("alarm should fire");
        assert_eq!(fired.name, NEXT_DUE_ALARM);
        assert_eq!(fired.scheduled_for, fire_at);
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_the_previous_alarm() {
        let (timer, mut rx) = TokioTimer::new();
        timer
            .schedule(NEXT_DUE_ALARM, Utc::now() + Duration::seconds(10))
            .await
            .unwrap();
        let later = Utc::now() + Duration::seconds(60);
        timer.schedule(NEXT_DUE_ALARM, later).await.unwrap();

        tokio::time::advance(StdDuration::from_secs(61)).await;
        let fired = rx.recv().await.expect("alarm should fire");
        assert_eq!(fired.scheduled_for, later);
        // The replaced alarm must not also fire.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_alarm_never_fires() {
        let (timer, mut rx) = TokioTimer::new();
        timer
            .schedule(NEXT_DUE_ALARM, Utc::now() + Duration::seconds(5))
            .await
            .unwrap();
        timer.cancel(NEXT_DUE_ALARM).await.unwrap();

        tokio::time::advance(StdDuration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn past_deadline_fires_immediately() {
        let (timer, mut rx) = TokioTimer::new();
        timer
            .schedule(NEXT_DUE_ALARM, Utc::now() - Duration::seconds(5))
            .await
            .unwrap();
        tokio::time::advance(StdDuration::from_millis(1)).await;
        assert!(rx.recv().await.is_some());
    }
}

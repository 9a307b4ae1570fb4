use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Milliseconds in a minute.
pub const MIN_MS: i64 = 60 * 1000;
/// Milliseconds in an hour.
pub const HOUR_MS: i64 = 60 * MIN_MS;
/// Milliseconds in a fixed 24-hour day. Daily recurrence steps are
/// defined over this, not over calendar days.
pub const DAY_MS: i64 = 24 * HOUR_MS;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid priority: {0}")]
pub struct ParsePriorityError(String);

impl FromStr for Priority {
    type Err = ParsePriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            _ => Err(ParsePriorityError(s.to_string())),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Normal => write!(f, "normal"),
            Priority::High => write!(f, "high"),
        }
    }
}

/// Repetition pattern for a task. A tag the deserializer does not
/// recognize falls back to `None`: a malformed rule means "no further
/// occurrences", never an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RepeatRule {
    Daily {
        interval: u32,
    },
    Weekly {
        interval: u32,
        /// Weekdays 0..=6 (Sunday = 0). Empty means "the anchor's own
        /// weekday"; out-of-range entries are ignored at evaluation.
        #[serde(default)]
        by_weekday: Vec<u8>,
    },
    Monthly {
        interval: u32,
        /// Target day-of-month 1..=31, clamped to the month's actual
        /// length. Absent means "the anchor's day-of-month".
        #[serde(default)]
        by_day: Option<u8>,
    },
    // serde requires the catch-all variant to come last.
    #[serde(other)]
    None,
}

impl RepeatRule {
    pub fn is_none(&self) -> bool {
        matches!(self, RepeatRule::None)
    }
}

impl Default for RepeatRule {
    fn default() -> Self {
        RepeatRule::None
    }
}

/// Week-start convention used for weekly week-index computation only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    Sunday,
    Monday,
}

impl Default for WeekStart {
    fn default() -> Self {
        WeekStart::Sunday
    }
}

impl WeekStart {
    /// Days to subtract from a weekday number (Sunday = 0) to reach
    /// the start of its week.
    pub fn shift_for(self, weekday_from_sunday: u8) -> u8 {
        let anchor = match self {
            WeekStart::Sunday => 0,
            WeekStart::Monday => 1,
        };
        (weekday_from_sunday + 7 - anchor) % 7
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid week start: {0}")]
pub struct ParseWeekStartError(String);

impl FromStr for WeekStart {
    type Err = ParseWeekStartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sunday" | "sun" | "0" => Ok(WeekStart::Sunday),
            "monday" | "mon" | "1" => Ok(WeekStart::Monday),
            _ => Err(ParseWeekStartError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub note: Option<String>,
    /// Next time this task should fire. Mutated on every rollforward
    /// and by snooze.
    pub due_at: DateTime<Utc>,
    /// Anchor fixed at creation (or last edit). Its time-of-day (and,
    /// for monthly, day-of-month) is preserved across occurrences.
    pub base_at: DateTime<Utc>,
    #[serde(default)]
    pub repeat: RepeatRule,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Scheduling-relevant liveness: done and archived tasks are
    /// terminal for the scheduler.
    pub fn is_active(&self) -> bool {
        !self.done && !self.archived
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.due_at <= now
    }
}

impl Default for Task {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            title: String::new(),
            note: None,
            due_at: now,
            base_at: now,
            repeat: RepeatRule::None,
            priority: Priority::Normal,
            tags: Vec::new(),
            done: false,
            archived: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Data for creating a new task.
#[derive(Debug, Clone, Default)]
pub struct NewTaskData {
    pub title: String,
    pub note: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub repeat: Option<RepeatRule>,
    pub priority: Option<Priority>,
    pub tags: Vec<String>,
}

fn default_snooze_min() -> u32 {
    10
}
fn default_enable_snooze() -> bool {
    true
}
fn default_catchup_window_ms() -> i64 {
    12 * HOUR_MS
}
fn default_max_individual_catchup() -> usize {
    5
}
fn default_retention_days() -> u32 {
    30
}
fn default_timezone() -> String {
    "UTC".to_string()
}

/// User settings. Every field carries a default so a partial stored
/// document merges over the baseline rather than failing to load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub default_snooze_min: u32,
    pub enable_snooze: bool,
    pub notification_require_interaction: bool,
    pub week_starts_on: WeekStart,
    pub catchup_window_ms: i64,
    pub max_individual_catchup: usize,
    /// Completed tasks older than this are pruned; 0 disables pruning.
    pub completed_retention_days: u32,
    /// IANA zone used for wall-clock recurrence fields.
    pub timezone: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_snooze_min: default_snooze_min(),
            enable_snooze: default_enable_snooze(),
            notification_require_interaction: false,
            week_starts_on: WeekStart::Sunday,
            catchup_window_ms: default_catchup_window_ms(),
            max_individual_catchup: default_max_individual_catchup(),
            completed_retention_days: default_retention_days(),
            timezone: default_timezone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_rule_unknown_tag_falls_back_to_none() {
        let rule: RepeatRule = serde_json::from_str(r#"{"type":"fortnightly","interval":2}"#)
            .expect("unknown tags must deserialize");
        assert_eq!(rule, RepeatRule::None);
    }

    #[test]
    fn repeat_rule_none_round_trips_through_catch_all() {
        let json = serde_json::to_string(&RepeatRule::None).unwrap();
        assert_eq!(json, r#"{"type":"none"}"#);
        let back: RepeatRule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RepeatRule::None);
    }

    #[test]
    fn repeat_rule_round_trips() {
        let rule = RepeatRule::Weekly {
            interval: 2,
            by_weekday: vec![1, 3, 5],
        };
        let json = serde_json::to_string(&rule).unwrap();
        let back: RepeatRule = serde_json::from_str(&json).unwrap();
        assert_eq!(rule, back);
    }

    #[test]
    fn weekly_missing_by_weekday_defaults_empty() {
        let rule: RepeatRule =
            serde_json::from_str(r#"{"type":"weekly","interval":1}"#).unwrap();
        assert_eq!(
            rule,
            RepeatRule::Weekly {
                interval: 1,
                by_weekday: vec![]
            }
        );
    }

    #[test]
    fn settings_partial_document_merges_over_defaults() {
        let s: Settings = serde_json::from_str(r#"{"default_snooze_min": 25}"#).unwrap();
        assert_eq!(s.default_snooze_min, 25);
        assert_eq!(s.max_individual_catchup, 5);
        assert_eq!(s.catchup_window_ms, 12 * HOUR_MS);
        assert_eq!(s.week_starts_on, WeekStart::Sunday);
    }

    #[test]
    fn week_start_shift() {
        // Wednesday (3) is 3 days past a Sunday start, 2 past a Monday start.
        assert_eq!(WeekStart::Sunday.shift_for(3), 3);
        assert_eq!(WeekStart::Monday.shift_for(3), 2);
        // Sunday under a Monday start belongs to the previous week.
        assert_eq!(WeekStart::Monday.shift_for(0), 6);
    }

    #[test]
    fn task_activity_classification() {
        let now = Utc::now();
        let mut task = Task {
            due_at: now - chrono::Duration::hours(1),
            ..Default::default()
        };
        assert!(task.is_active());
        assert!(task.is_overdue(now));
        task.done = true;
        assert!(!task.is_active());
        assert!(!task.is_overdue(now));
    }
}

//! Pure recurrence evaluation.
//!
//! `next_occurrence` computes the next fire time for a task strictly
//! after a reference instant, preserving the anchor's wall-clock
//! fields in a configurable timezone. It has no side effects; callers
//! own applying the result to `due_at`.

use chrono::offset::LocalResult;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::CoreError;
use crate::models::{RepeatRule, Settings, Task, WeekStart, DAY_MS};

/// Safety bound for the weekly day-by-day scan.
const WEEKLY_SCAN_DAYS: i64 = 2 * 365;
/// Safety bound for the monthly candidate iteration.
const MONTHLY_SCAN_MONTHS: i64 = 240;

/// Evaluation context: week-start convention and the zone whose
/// wall-clock fields anchor occurrences.
#[derive(Debug, Clone, Copy)]
pub struct RecurrenceOptions {
    pub week_starts_on: WeekStart,
    pub timezone: Tz,
}

impl Default for RecurrenceOptions {
    fn default() -> Self {
        Self {
            week_starts_on: WeekStart::Sunday,
            timezone: chrono_tz::UTC,
        }
    }
}

impl RecurrenceOptions {
    pub fn from_settings(settings: &Settings) -> Result<Self, CoreError> {
        let timezone: Tz = settings
            .timezone
            .parse()
            .map_err(|_| CoreError::InvalidTimezone(settings.timezone.clone()))?;
        Ok(Self {
            week_starts_on: settings.week_starts_on,
            timezone,
        })
    }
}

/// Returns the next occurrence of `task` strictly after `now`, or
/// `None` for non-repeating tasks (and for rules that find nothing
/// within their safety bound).
pub fn next_occurrence(
    now: DateTime<Utc>,
    task: &Task,
    opts: &RecurrenceOptions,
) -> Option<DateTime<Utc>> {
    match &task.repeat {
        RepeatRule::None => None,
        RepeatRule::Daily { interval } => next_daily(now, task.base_at, *interval),
        RepeatRule::Weekly {
            interval,
            by_weekday,
        } => next_weekly(now, task.base_at, *interval, by_weekday, opts),
        RepeatRule::Monthly { interval, by_day } => {
            next_monthly(now, task.base_at, *interval, *by_day, &opts.timezone)
        }
    }
}

/// Derived alarm state: the minimum future `due_at` among active
/// tasks. The single external alarm is always recomputable from this.
pub fn select_next_alarm(tasks: &[Task], now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    tasks
        .iter()
        .filter(|t| t.is_active() && t.due_at > now)
        .map(|t| t.due_at)
        .min()
}

/// Daily steps are fixed 24-hour spans of epoch milliseconds, so the
/// smallest `base + k*interval*DAY > now` has a closed form.
fn next_daily(now: DateTime<Utc>, base: DateTime<Utc>, interval: u32) -> Option<DateTime<Utc>> {
    let step = i64::from(interval.max(1)) * DAY_MS;
    let base_ms = base.timestamp_millis();
    let now_ms = now.timestamp_millis();
    let diff = now_ms - base_ms;
    let steps = if diff <= 0 { 0 } else { (diff + step - 1).div_euclid(step) };
    let mut candidate = base_ms + steps * step;
    if candidate <= now_ms {
        candidate += step;
    }
    DateTime::<Utc>::from_timestamp_millis(candidate)
}

fn next_weekly(
    now: DateTime<Utc>,
    base: DateTime<Utc>,
    interval: u32,
    by_weekday: &[u8],
    opts: &RecurrenceOptions,
) -> Option<DateTime<Utc>> {
    let interval = i64::from(interval.max(1));
    let tz = &opts.timezone;
    let base_local = base.with_timezone(tz);

    let mut days: Vec<u8> = by_weekday.iter().copied().filter(|d| *d <= 6).collect();
    if days.is_empty() {
        days.push(base_local.weekday().num_days_from_sunday() as u8);
    }
    days.sort_unstable();
    days.dedup();

    let base_week = start_of_week(base_local.date_naive(), opts.week_starts_on);
    let base_time = base_local.time();

    // Day-by-day forward search from "now"'s day, bounded to 2 years.
    let mut cursor = now.with_timezone(tz).date_naive();
    for _ in 0..=WEEKLY_SCAN_DAYS {
        let dow = cursor.weekday().num_days_from_sunday() as u8;
        if days.binary_search(&dow).is_ok() {
            let weeks_between =
                (start_of_week(cursor, opts.week_starts_on) - base_week).num_days() / 7;
            if weeks_between % interval == 0 {
                let candidate = resolve_local(tz, cursor.and_time(base_time));
                if candidate > now {
                    return Some(candidate);
                }
            }
        }
        cursor = cursor.succ_opt()?;
    }
    None
}

fn next_monthly(
    now: DateTime<Utc>,
    base: DateTime<Utc>,
    interval: u32,
    by_day: Option<u8>,
    tz: &Tz,
) -> Option<DateTime<Utc>> {
    let interval = i64::from(interval.max(1));
    let base_local = base.with_timezone(tz);
    let now_local = now.with_timezone(tz);

    let target_day = match by_day {
        Some(d) => u32::from(d.clamp(1, 31)),
        None => base_local.day(),
    };
    let base_time = base_local.time();

    let months_base = i64::from(base_local.year()) * 12 + i64::from(base_local.month0());
    let months_now = i64::from(now_local.year()) * 12 + i64::from(now_local.month0());

    // Closed-form starting index, then linear month steps.
    let diff = months_now - months_base;
    let mut k = if diff <= 0 { 0 } else { (diff + interval - 1).div_euclid(interval) };
    while k < MONTHLY_SCAN_MONTHS {
        let total = months_base + k * interval;
        let year = total.div_euclid(12) as i32;
        let month0 = total.rem_euclid(12) as u32;
        let day = target_day.min(last_day_of_month(year, month0)?);
        let date = NaiveDate::from_ymd_opt(year, month0 + 1, day)?;
        let candidate = resolve_local(tz, date.and_time(base_time));
        if candidate > now {
            return Some(candidate);
        }
        k += 1;
    }
    None
}

/// 00:00 of the week containing `date` under the given convention.
fn start_of_week(date: NaiveDate, week_starts_on: WeekStart) -> NaiveDate {
    let dow = date.weekday().num_days_from_sunday() as u8;
    date - Duration::days(i64::from(week_starts_on.shift_for(dow)))
}

fn last_day_of_month(year: i32, month0: u32) -> Option<u32> {
    let (next_year, next_month0) = if month0 == 11 {
        (year + 1, 0)
    } else {
        (year, month0 + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month0 + 1, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
}

/// Projects a naive local wall-clock time back to UTC. Ambiguous
/// fall-back times resolve to the earlier instant; times inside a
/// spring-forward gap shift one hour later. Exact DST behavior is a
/// stated non-goal.
fn resolve_local(tz: &Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => match tz.from_local_datetime(&(naive + Duration::hours(1))) {
            LocalResult::Single(dt) => dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
            LocalResult::None => Utc.from_utc_datetime(&naive),
        },
    }
}

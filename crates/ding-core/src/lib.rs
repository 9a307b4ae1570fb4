//! # Ding Core Library
//!
//! The scheduling engine behind the `ding` reminder daemon: recurring
//! due-date evaluation, catch-up reconciliation after downtime, and
//! rehydration of a single system-wide alarm.
//!
//! ## Features
//!
//! - **Recurrence evaluation**: daily/weekly/monthly rules anchored to
//!   a fixed base time whose wall-clock fields are preserved across
//!   occurrences (closed-form daily stepping, week-index gating,
//!   day-of-month clamping)
//! - **Catch-up reconciliation**: missed due times inside a bounded
//!   window are notified individually up to a limit, the rest folded
//!   into one summary; recurring tasks roll forward exactly once per
//!   pass
//! - **Single-alarm invariant**: at most one external timer exists at
//!   any time, always recomputable from the task set
//! - **Serialized passes**: every lifecycle trigger runs to completion
//!   under one pass gate before the next is considered
//!
//! ## Core Modules
//!
//! - [`models`]: tasks, repeat rules and settings
//! - [`recurrence`]: the pure next-occurrence evaluator
//! - [`scheduler`]: reconciliation passes and lifecycle entry points
//! - [`store`]: persistence seams and the JSON file store
//! - [`notify`]: notification delivery seam
//! - [`timer`]: the external one-shot alarm seam
//! - [`error`]: error types
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chrono::Utc;
//! use ding_core::{
//!     error::CoreError, notify::LogNotifier, scheduler::Scheduler, store::JsonFileStore,
//!     timer::TokioTimer,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), CoreError> {
//!     let store = Arc::new(JsonFileStore::new("ding.json"));
//!     let (timer, mut alarms) = TokioTimer::new();
//!     let scheduler = Scheduler::new(store, Arc::new(LogNotifier), Arc::new(timer));
//!
//!     scheduler.on_startup(Utc::now()).await?;
//!     while let Some(alarm) = alarms.recv().await {
//!         scheduler.on_timer_fire(&alarm.name, Utc::now()).await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod models;
pub mod notify;
pub mod recurrence;
pub mod scheduler;
pub mod store;
pub mod timer;

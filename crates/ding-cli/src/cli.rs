use clap::{Parser, Subcommand, ValueEnum};
use ding_core::models::Priority;

/// A reminder daemon and CLI with recurring tasks and downtime catch-up
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Add a new reminder
    Add(AddCommand),
    /// List reminders
    List(ListCommand),
    /// Mark a reminder as done
    Done(DoneCommand),
    /// Push a reminder's due time out by some minutes
    Snooze(SnoozeCommand),
    /// Delete a reminder
    Delete(DeleteCommand),
    /// Reconcile reminders missed while ding was not running
    CatchUp(CatchUpCommand),
    /// Recompute and re-arm the next-due alarm
    Rehydrate,
    /// Run the reminder daemon in the foreground
    Run(RunCommand),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityArg {
    Low,
    Normal,
    High,
}

impl From<PriorityArg> for Priority {
    fn from(value: PriorityArg) -> Self {
        match value {
            PriorityArg::Low => Priority::Low,
            PriorityArg::Normal => Priority::Normal,
            PriorityArg::High => Priority::High,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Due,
    Priority,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatKind {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    /// The title of the reminder
    pub title: String,
    /// An optional note shown in the notification body
    #[clap(short, long)]
    pub note: Option<String>,
    /// When the reminder is due (e.g. "tomorrow 9am", "friday 17:30")
    #[clap(short, long)]
    pub due: Option<String>,
    /// Repeat frequency
    #[clap(long, value_enum)]
    pub every: Option<RepeatKind>,
    /// Repeat interval (every N days/weeks/months)
    #[clap(long, default_value_t = 1, requires = "every")]
    pub interval: u32,
    /// Days of week for weekly repeats (mon,tue,... or "weekdays")
    #[clap(long, requires = "every")]
    pub on: Option<String>,
    /// Day of month for monthly repeats (1-31, clamped to month length)
    #[clap(long, requires = "every")]
    pub day: Option<u8>,
    /// The priority of the reminder
    #[clap(long, value_enum)]
    pub priority: Option<PriorityArg>,
    /// Tags to attach
    #[clap(short, long, num_args = 1..)]
    pub tag: Vec<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct ListCommand {
    /// Include done reminders
    #[clap(long)]
    pub all: bool,
    /// Show only overdue reminders
    #[clap(long, conflicts_with = "all")]
    pub overdue: bool,
    /// Filter by tag
    #[clap(short, long)]
    pub tag: Option<String>,
    /// Filter by a substring of the title or note
    #[clap(short, long)]
    pub search: Option<String>,
    /// Sort order
    #[clap(long, value_enum, default_value = "due")]
    pub sort: SortField,
}

#[derive(Parser, Debug, Clone)]
pub struct DoneCommand {
    /// The ID (or unique ID prefix) of the reminder
    pub id: String,
}

#[derive(Parser, Debug, Clone)]
pub struct SnoozeCommand {
    /// The ID (or unique ID prefix) of the reminder
    pub id: String,
    /// Minutes to snooze for (default: the configured snooze)
    #[clap(short, long)]
    pub minutes: Option<u32>,
}

#[derive(Parser, Debug, Clone)]
pub struct DeleteCommand {
    /// The ID (or unique ID prefix) of the reminder
    pub id: String,
    /// Skip the confirmation prompt
    #[clap(short, long)]
    pub force: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct CatchUpCommand {
    /// Print the pass report
    #[clap(short, long)]
    pub verbose: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct RunCommand {
    /// Treat this start as a fresh install (baseline the checkpoint)
    #[clap(long)]
    pub install: bool,
}

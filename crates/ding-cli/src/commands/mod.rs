pub mod add;
pub mod catchup;
pub mod delete;
pub mod done;
pub mod list;
pub mod run;
pub mod snooze;

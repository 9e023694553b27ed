pub mod common;
pub mod completions;
pub mod config;
pub mod memo;
pub mod note;
pub mod purge;
pub mod reminders;
pub mod show;
pub mod status;
pub mod watch;

use studia_core::DateKey;

use crate::cli::RemindersCommands;
use crate::commands::common::{describe_ack, read_piped_stdin, resolve_date, AppContext};
use crate::error::CliError;

pub async fn run_reminders(
    context: &AppContext,
    command: RemindersCommands,
) -> Result<(), CliError> {
    match command {
        RemindersCommands::Set { date, reminders } => {
            let date = resolve_date(date.as_deref())?;
            let buffer = if reminders.is_empty() {
                read_piped_stdin()?.unwrap_or_default()
            } else {
                reminders.join("\n")
            };
            set_reminders(context, date, buffer).await
        }
    }
}

/// Replace the reminders from a buffer holding one reminder per line.
pub async fn set_reminders(
    context: &AppContext,
    date: DateKey,
    buffer: String,
) -> Result<(), CliError> {
    let mut view = context.day_view(date).await?;
    view.set_reminder_buffer(buffer);
    let ack = view.commit_reminders().await?;
    context.persist_store()?;
    println!("{date}: reminders {}", describe_ack(ack));
    Ok(())
}

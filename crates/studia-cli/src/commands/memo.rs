use studia_core::DateKey;

use crate::cli::MemoCommands;
use crate::commands::common::{describe_ack, read_piped_stdin, resolve_date, AppContext};
use crate::error::CliError;

pub async fn run_memo(context: &AppContext, command: MemoCommands) -> Result<(), CliError> {
    match command {
        MemoCommands::Set { date, text } => {
            let date = resolve_date(date.as_deref())?;
            let memo = if text.is_empty() {
                read_piped_stdin()?.unwrap_or_default()
            } else {
                text.join(" ")
            };
            set_memo(context, date, &memo).await
        }
    }
}

pub async fn set_memo(context: &AppContext, date: DateKey, memo: &str) -> Result<(), CliError> {
    let mut view = context.day_view(date).await?;
    view.set_memo_buffer(memo);
    let ack = view.commit_memo().await?;
    context.persist_store()?;
    println!("{date}: memo {}", describe_ack(ack));
    Ok(())
}

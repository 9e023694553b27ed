use crate::commands::common::{describe_ack, AppContext};
use crate::error::CliError;

pub async fn run_purge(context: &AppContext, confirmed: bool) -> Result<(), CliError> {
    if !confirmed {
        return Err(CliError::ConfirmationRequired);
    }

    let ack = context.repository().delete_user_data().await?;
    context.persist_store()?;
    println!("All records deleted, {}", describe_ack(ack));
    Ok(())
}

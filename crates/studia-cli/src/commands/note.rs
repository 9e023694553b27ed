use studia_core::DateKey;

use crate::cli::NoteCommands;
use crate::commands::common::{
    capture_editor_input_with_initial, describe_ack, normalize_content, note_draft,
    resolve_date, resolve_note_content, AppContext,
};
use crate::error::CliError;

pub async fn run_note(context: &AppContext, command: NoteCommands) -> Result<(), CliError> {
    match command {
        NoteCommands::Add {
            date,
            subject,
            content,
        } => {
            let date = resolve_date(date.as_deref())?;
            let content = resolve_note_content(&content)?;
            add_note(context, date, subject.as_deref(), content).await
        }
        NoteCommands::Edit {
            index,
            date,
            subject,
            content,
        } => {
            let date = resolve_date(date.as_deref())?;
            edit_note(context, date, index, subject.as_deref(), &content).await
        }
        NoteCommands::Delete { index, date } => {
            let date = resolve_date(date.as_deref())?;
            delete_note(context, date, index).await
        }
    }
}

pub async fn add_note(
    context: &AppContext,
    date: DateKey,
    subject: Option<&str>,
    content: String,
) -> Result<(), CliError> {
    let mut view = context.day_view(date).await?;
    view.begin_note_add();
    *view.note_draft_mut() = note_draft(subject, content);

    let Some(ack) = view.commit_note().await? else {
        return Err(CliError::EmptyContent);
    };
    context.persist_store()?;
    println!("{date}: note {}", describe_ack(ack));
    Ok(())
}

pub async fn edit_note(
    context: &AppContext,
    date: DateKey,
    index: usize,
    subject: Option<&str>,
    content_parts: &[String],
) -> Result<(), CliError> {
    let mut view = context.day_view(date).await?;
    view.begin_note_edit(index)?;

    let content = match normalize_content(&content_parts.join(" ")) {
        Some(content) => content,
        None => capture_editor_input_with_initial(&view.note_draft().content)?
            .ok_or(CliError::EmptyEditedContent)?,
    };
    let draft = match subject {
        Some(subject) => note_draft(Some(subject), content),
        None => {
            let mut draft = view.note_draft().clone();
            draft.content = content;
            draft
        }
    };
    *view.note_draft_mut() = draft;

    let Some(ack) = view.commit_note().await? else {
        return Err(CliError::EmptyEditedContent);
    };
    context.persist_store()?;
    println!("{date}: note {index} {}", describe_ack(ack));
    Ok(())
}

pub async fn delete_note(context: &AppContext, date: DateKey, index: usize) -> Result<(), CliError> {
    let mut view = context.day_view(date).await?;
    let ack = view.delete_note(index).await?;
    context.persist_store()?;
    println!("{date}: note {index} deleted, {}", describe_ack(ack));
    Ok(())
}

use std::path::{Path, PathBuf};

use clap::Parser;
use pretty_assertions::assert_eq;
use studia_core::{DateKey, MemoryBackend, NoteEntry, SubjectChoice, SyncState, WriteAck};

use crate::cli::{
    Cli, Commands, CompletionShell, ConfigKey, ExportFormat, GlobalArgs, NoteCommands,
};
use crate::commands::common::{
    default_editor, describe_ack, normalize_content, note_draft, resolve_date_from, AppContext,
};
use crate::commands::completions::completion_script;
use crate::commands::config::{apply_config_value, parse_flag};
use crate::commands::memo::set_memo;
use crate::commands::note::{add_note, delete_note, edit_note};
use crate::commands::purge::run_purge;
use crate::commands::reminders::set_reminders;
use crate::commands::show::{resolve_output_path, run_show};
use crate::commands::status::{collect_status, format_status_lines};
use crate::config_profiles::CliConfig;
use crate::error::CliError;

fn day(raw: &str) -> DateKey {
    DateKey::parse(raw).unwrap()
}

fn global_args(dir: &Path, offline: bool) -> GlobalArgs {
    GlobalArgs {
        store: Some(dir.join("store.json")),
        cache: Some(dir.join("cache.db")),
        user: Some("alice".to_string()),
        offline,
    }
}

async fn open_context(dir: &Path, offline: bool) -> AppContext {
    AppContext::open_with_config(&global_args(dir, offline), &CliConfig::default())
        .await
        .unwrap()
}

fn stored_day(dir: &Path, date: &str) -> serde_json::Value {
    let backend = MemoryBackend::load_file(&dir.join("store.json")).unwrap();
    backend.tree()["calendar"]["alice"][date].clone()
}

#[test]
fn parses_note_add_with_global_options_after_subcommand() {
    let cli = Cli::try_parse_from([
        "studia", "note", "add", "-d", "20240105", "-s", "수학", "다항함수", "정리", "--user",
        "alice", "--offline",
    ])
    .unwrap();

    assert_eq!(cli.global.user.as_deref(), Some("alice"));
    assert!(cli.global.offline);
    let Commands::Note {
        command:
            NoteCommands::Add {
                date,
                subject,
                content,
            },
    } = cli.command
    else {
        panic!("expected note add");
    };
    assert_eq!(date.as_deref(), Some("20240105"));
    assert_eq!(subject.as_deref(), Some("수학"));
    assert_eq!(content, vec!["다항함수".to_string(), "정리".to_string()]);
}

#[test]
fn parses_show_format_and_config_keys() {
    let cli = Cli::try_parse_from(["studia", "show", "yesterday", "--format", "json"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Show {
            format: ExportFormat::Json,
            ..
        }
    ));

    let cli =
        Cli::try_parse_from(["studia", "config", "set", "offline-persistence", "off"]).unwrap();
    assert!(matches!(cli.command, Commands::Config { .. }));

    assert!(Cli::try_parse_from(["studia", "note", "delete"]).is_err());
}

#[test]
fn resolve_date_accepts_keys_iso_dates_and_words() {
    let today = day("20240301");

    assert_eq!(resolve_date_from(None, today).unwrap(), today);
    assert_eq!(resolve_date_from(Some(" "), today).unwrap(), today);
    assert_eq!(resolve_date_from(Some("20240105"), today).unwrap(), day("20240105"));
    assert_eq!(resolve_date_from(Some("2024-01-05"), today).unwrap(), day("20240105"));
    assert_eq!(resolve_date_from(Some("Yesterday"), today).unwrap(), day("20240229"));
    assert_eq!(resolve_date_from(Some("tomorrow"), today).unwrap(), day("20240302"));
    assert!(matches!(
        resolve_date_from(Some("next week"), today),
        Err(CliError::InvalidDate(_))
    ));
}

#[test]
fn note_draft_maps_preset_and_free_subjects() {
    let preset = note_draft(Some("영어"), "vocab".to_string());
    assert_eq!(preset.subject, SubjectChoice::Preset("영어".to_string()));

    let other = note_draft(Some(" 물리 "), "forces".to_string());
    assert_eq!(other.subject, SubjectChoice::Other);
    assert_eq!(other.to_entry(), NoteEntry::new("물리", "forces"));

    let default = note_draft(None, "x".to_string());
    assert_eq!(default.subject, SubjectChoice::default());
}

#[test]
fn normalize_content_trims_and_rejects_empty() {
    assert_eq!(normalize_content("  hello  "), Some("hello".to_string()));
    assert_eq!(normalize_content(" \n\t "), None);
    assert_eq!(
        normalize_content("line one\nline two\n"),
        Some("line one\nline two".to_string())
    );
}

#[test]
fn default_editor_is_defined() {
    assert!(!default_editor().is_empty());
}

#[test]
fn describe_ack_distinguishes_queued_writes() {
    assert_eq!(describe_ack(WriteAck::Committed), "saved");
    assert_eq!(describe_ack(WriteAck::Queued), "queued (offline)");
}

#[test]
fn apply_config_value_sets_and_unsets_file_settings() {
    let mut config = CliConfig::default();

    apply_config_value(&mut config, ConfigKey::User, " bob ").unwrap();
    apply_config_value(&mut config, ConfigKey::Store, "/srv/store.json").unwrap();
    assert_eq!(config.default_user.as_deref(), Some("bob"));
    assert_eq!(config.store_path, Some(PathBuf::from("/srv/store.json")));

    apply_config_value(&mut config, ConfigKey::User, "").unwrap();
    assert_eq!(config.default_user, None);

    assert!(matches!(
        apply_config_value(&mut config, ConfigKey::OfflinePersistence, "true"),
        Err(CliError::Config(_))
    ));
}

#[test]
fn parse_flag_accepts_common_spellings() {
    assert_eq!(parse_flag(" ON "), Some(true));
    assert_eq!(parse_flag("0"), Some(false));
    assert_eq!(parse_flag("maybe"), None);
}

#[test]
fn completion_script_names_the_binary() {
    let script = String::from_utf8(completion_script(CompletionShell::Bash)).unwrap();
    assert!(script.contains("studia"));
}

#[test]
fn resolve_output_path_names_files_inside_directories() {
    let dir = tempfile::tempdir().unwrap();
    let date = day("20240105");

    assert_eq!(
        resolve_output_path(dir.path(), date, ExportFormat::Markdown),
        dir.path().join("studia-20240105.md")
    );
    let explicit = dir.path().join("out.json");
    assert_eq!(
        resolve_output_path(&explicit, date, ExportFormat::Json),
        explicit
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn open_requires_a_user() {
    let dir = tempfile::tempdir().unwrap();
    let mut global = global_args(dir.path(), false);
    global.user = Some("  ".to_string());

    let result = AppContext::open_with_config(&global, &CliConfig::default()).await;
    assert!(matches!(result, Err(CliError::MissingUser)));
}

#[tokio::test(flavor = "multi_thread")]
async fn editing_commands_write_through_to_the_store_file() {
    let dir = tempfile::tempdir().unwrap();
    let date = day("20240105");
    let context = open_context(dir.path(), false).await;

    add_note(&context, date, Some("국어"), "first".to_string())
        .await
        .unwrap();
    add_note(&context, date, Some("수학"), "second".to_string())
        .await
        .unwrap();
    add_note(&context, date, None, "third".to_string())
        .await
        .unwrap();
    edit_note(&context, date, 1, None, &["revised".to_string()])
        .await
        .unwrap();
    delete_note(&context, date, 0).await.unwrap();
    set_memo(&context, date, "review chapter 3").await.unwrap();
    set_reminders(&context, date, "• bring notebook\n\nquiz".to_string())
        .await
        .unwrap();

    let record = context.repository().read(date).await.unwrap();
    assert_eq!(
        record.notes,
        vec![
            NoteEntry::new("수학", "revised"),
            NoteEntry::new("국어", "third"),
        ]
    );
    assert_eq!(record.memo, "review chapter 3");
    assert_eq!(
        record.reminders,
        vec!["bring notebook".to_string(), "quiz".to_string()]
    );

    let stored = stored_day(dir.path(), "20240105");
    assert_eq!(stored["note"][0]["content"], "revised");
    assert_eq!(stored["memo"], "review chapter 3");

    let missing = edit_note(&context, date, 5, None, &["x".to_string()]).await;
    assert!(matches!(missing, Err(CliError::Core(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_writes_are_queued_then_replayed_on_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let date = day("20240105");

    let offline = open_context(dir.path(), true).await;
    set_memo(&offline, date, "written on the train").await.unwrap();
    let report = collect_status(&offline);
    assert!(!report.online);
    assert_eq!(report.pending_writes, 1);
    assert!(format_status_lines(&report).contains(&"connection: offline".to_string()));
    drop(offline);

    assert_eq!(stored_day(dir.path(), "20240105"), serde_json::Value::Null);

    let online = open_context(dir.path(), false).await;
    assert_eq!(*online.client.sync_state().borrow(), SyncState::Synced);
    assert_eq!(online.client.pending_count(), 0);
    assert_eq!(
        stored_day(dir.path(), "20240105")["memo"],
        "written on the train"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn replayed_writes_survive_a_read_only_run() {
    let dir = tempfile::tempdir().unwrap();
    let date = day("20240105");

    let offline = open_context(dir.path(), true).await;
    set_memo(&offline, date, "written on the train").await.unwrap();
    drop(offline);

    let reader = open_context(dir.path(), false).await;
    run_show(&reader, date, ExportFormat::Json, None)
        .await
        .unwrap();
    drop(reader);

    let later = open_context(dir.path(), false).await;
    assert_eq!(later.client.pending_count(), 0);
    assert_eq!(
        later.repository().read(date).await.unwrap().memo,
        "written on the train"
    );
    assert_eq!(
        stored_day(dir.path(), "20240105")["memo"],
        "written on the train"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn purge_requires_confirmation() {
    let dir = tempfile::tempdir().unwrap();
    let date = day("20240105");
    let context = open_context(dir.path(), false).await;
    set_memo(&context, date, "keep?").await.unwrap();

    assert!(matches!(
        run_purge(&context, false).await,
        Err(CliError::ConfirmationRequired)
    ));
    run_purge(&context, true).await.unwrap();

    assert!(context.repository().read(date).await.unwrap().is_empty());
    assert_eq!(stored_day(dir.path(), "20240105"), serde_json::Value::Null);
}

use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::NaiveDate;
use studia_core::db::{
    Database, LibSqlPendingWriteRepository, LibSqlPreferencesRepository, PendingWriteRepository,
    PreferencesRepository,
};
use studia_core::models::PRESET_SUBJECTS;
use studia_core::{
    ClientConfig, ConfigHandle, DateKey, DayViewModel, MemoryBackend, NoteDraft, RecordRepository,
    SessionHandle, SubjectChoice, SyncClient, SyncState, UserId, WriteAck,
};

use crate::cli::GlobalArgs;
use crate::config_profiles::CliConfig;
use crate::error::CliError;

const REPLAY_SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything a command needs: a connected client for the selected user
/// plus the files backing it.
pub struct AppContext {
    pub client: SyncClient,
    pub store_path: PathBuf,
    pub cache_path: PathBuf,
}

impl AppContext {
    pub async fn open(global: &GlobalArgs) -> Result<Self, CliError> {
        let config = CliConfig::load().map_err(CliError::Config)?;
        Self::open_with_config(global, &config).await
    }

    pub async fn open_with_config(
        global: &GlobalArgs,
        config: &CliConfig,
    ) -> Result<Self, CliError> {
        let user = config
            .resolve_user(global.user.clone())
            .ok_or(CliError::MissingUser)?;
        let user = UserId::new(user)?;
        let store_path = config.resolve_store_path(global.store.clone());
        let cache_path = config.resolve_cache_path(global.cache.clone());

        let backend = MemoryBackend::load_file(&store_path)?;
        let database = Database::open(&cache_path).await?;
        let preferences = LibSqlPreferencesRepository::new(database.connection())
            .load()
            .await?;
        let client_config = ClientConfig {
            cache_path: Some(cache_path.clone()),
            ..ClientConfig::default()
        }
        .with_preferences(&preferences);
        let queued = if client_config.offline_persistence {
            LibSqlPendingWriteRepository::new(database.connection())
                .list()
                .await?
                .len()
        } else {
            0
        };

        let client = SyncClient::connect(
            backend,
            SessionHandle::signed_in(user),
            ConfigHandle::new(client_config),
            Some(database),
        )
        .await?;
        let context = Self {
            client,
            store_path,
            cache_path,
        };
        if queued > 0 {
            context.settle_replay(queued).await?;
        }
        if global.offline {
            context.client.go_offline();
        }

        Ok(context)
    }

    /// Writes queued by an earlier run are replayed while connecting. Wait
    /// for their acknowledgements, report refusals, then save the store file.
    async fn settle_replay(&self, queued: usize) -> Result<(), CliError> {
        let mut failures = self.client.write_failures();
        let mut sync_state = self.client.sync_state();
        let settled = tokio::time::timeout(
            REPLAY_SETTLE_TIMEOUT,
            sync_state.wait_for(|state| *state != SyncState::Syncing),
        )
        .await
        .is_ok_and(|result| result.is_ok());
        if !settled {
            tracing::warn!("Replayed writes are still unacknowledged; saving the store as is");
        }

        while let Ok(failure) = failures.try_recv() {
            eprintln!(
                "Queued change to {} was rejected: {}",
                failure.path, failure.message
            );
        }
        tracing::info!("Replayed {queued} queued writes");
        self.persist_store()
    }

    pub fn repository(&self) -> RecordRepository {
        RecordRepository::new(self.client.clone())
    }

    /// Open the day view the editing commands drive.
    pub async fn day_view(&self, date: DateKey) -> Result<DayViewModel, CliError> {
        Ok(DayViewModel::open(self.repository(), date).await?)
    }

    /// Write the remote tree back to the emulator file.
    pub fn persist_store(&self) -> Result<(), CliError> {
        self.client.backend().save_file(&self.store_path)?;
        Ok(())
    }
}

pub fn resolve_date(input: Option<&str>) -> Result<DateKey, CliError> {
    resolve_date_from(input, DateKey::today()?)
}

/// Parse a user-supplied day relative to `today`.
pub fn resolve_date_from(input: Option<&str>, today: DateKey) -> Result<DateKey, CliError> {
    let Some(raw) = input.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(today);
    };

    match raw.to_ascii_lowercase().as_str() {
        "today" => return Ok(today),
        "yesterday" => return Ok(today.previous()),
        "tomorrow" => return Ok(today.next()),
        _ => {}
    }

    if let Ok(date) = DateKey::parse(raw) {
        return Ok(date);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| DateKey::new(date).ok())
        .ok_or_else(|| CliError::InvalidDate(raw.to_string()))
}

/// Build an editor draft, mapping preset labels onto the preset choice.
pub fn note_draft(subject: Option<&str>, content: String) -> NoteDraft {
    let subject = subject.map(str::trim).unwrap_or_default();
    if subject.is_empty() || PRESET_SUBJECTS.contains(&subject) {
        let subject = if subject.is_empty() {
            SubjectChoice::default()
        } else {
            SubjectChoice::Preset(subject.to_string())
        };
        NoteDraft {
            subject,
            other_subject: String::new(),
            content,
        }
    } else {
        NoteDraft {
            subject: SubjectChoice::Other,
            other_subject: subject.to_string(),
            content,
        }
    }
}

pub const fn describe_ack(ack: WriteAck) -> &'static str {
    match ack {
        WriteAck::Committed => "saved",
        WriteAck::Queued => "queued (offline)",
    }
}

pub fn resolve_note_content(content_parts: &[String]) -> Result<String, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(content);
    }

    if let Some(content) = read_piped_stdin()? {
        return Ok(content);
    }

    if let Some(content) = capture_editor_input_with_initial("")? {
        return Ok(content);
    }

    Err(CliError::EmptyContent)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_note_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let note_content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&note_content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    let mut parts = editor.split_whitespace();
    let Some(program) = parts.next() else {
        return Err(CliError::EditorFailed("empty EDITOR command".into()));
    };

    let status = Command::new(program).args(parts).arg(file_path).status()?;
    if status.success() {
        Ok(())
    } else {
        Err(CliError::EditorFailed(format!(
            "`{editor}` exited with status {status}"
        )))
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

pub fn create_temp_note_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("studia-note-{}-{now}.md", std::process::id()))
}

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "studia")]
#[command(about = "Keep per-day study notes, memos and reminders from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Remote store emulator file (JSON tree)
    #[arg(long, global = true, value_name = "PATH", env = "STUDIA_STORE_PATH")]
    pub store: Option<PathBuf>,

    /// Local cache database for offline persistence
    #[arg(long, global = true, value_name = "PATH", env = "STUDIA_CACHE_PATH")]
    pub cache: Option<PathBuf>,

    /// Signed-in user id
    #[arg(long, global = true, value_name = "ID", env = "STUDIA_USER")]
    pub user: Option<String>,

    /// Queue writes locally instead of sending them
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print a day record
    Show {
        /// Date as YYYYMMDD, YYYY-MM-DD, today, yesterday or tomorrow
        date: Option<String>,
        /// Output format
        #[arg(long, value_enum, default_value_t = ExportFormat::Markdown)]
        format: ExportFormat,
        /// Write to a file, or into a directory under a generated name
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Print a day record and every change to it until interrupted
    Watch {
        /// Date as YYYYMMDD, YYYY-MM-DD, today, yesterday or tomorrow
        date: Option<String>,
        /// Stop after this many updates
        #[arg(long, value_name = "N")]
        count: Option<usize>,
    },
    /// Add, edit or delete subject notes
    Note {
        #[command(subcommand)]
        command: NoteCommands,
    },
    /// Replace the memo of a day
    Memo {
        #[command(subcommand)]
        command: MemoCommands,
    },
    /// Replace the reminders of a day
    Reminders {
        #[command(subcommand)]
        command: RemindersCommands,
    },
    /// Delete every record of the signed-in user
    Purge {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Show connection, queue and configuration state
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change CLI configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Write output to a file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum NoteCommands {
    /// Append a note (reads stdin or opens $EDITOR when no content is given)
    Add {
        /// Day to add to
        #[arg(short, long)]
        date: Option<String>,
        /// Subject label
        #[arg(short, long)]
        subject: Option<String>,
        /// Note content
        content: Vec<String>,
    },
    /// Overwrite the note at a position
    Edit {
        /// Position of the note, starting at 0
        index: usize,
        /// Day the note belongs to
        #[arg(short, long)]
        date: Option<String>,
        /// New subject label; keeps the current one when omitted
        #[arg(short, long)]
        subject: Option<String>,
        /// New content (opens $EDITOR with the current content when omitted)
        content: Vec<String>,
    },
    /// Remove the note at a position
    Delete {
        /// Position of the note, starting at 0
        index: usize,
        /// Day the note belongs to
        #[arg(short, long)]
        date: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum MemoCommands {
    /// Replace the memo; no text (and no piped input) clears it
    Set {
        #[arg(short, long)]
        date: Option<String>,
        text: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum RemindersCommands {
    /// Replace the reminders, one per argument or one per piped line
    Set {
        #[arg(short, long)]
        date: Option<String>,
        reminders: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Change a configuration value
    Set {
        #[arg(value_enum)]
        key: ConfigKey,
        value: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ConfigKey {
    /// Default user id
    User,
    /// Default emulator file
    Store,
    /// Default cache database
    Cache,
    /// Keep queued writes and cached days across runs
    OfflinePersistence,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl From<ExportFormat> for studia_core::export::ExportFormat {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Json => Self::Json,
            ExportFormat::Markdown => Self::Markdown,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

use std::path::{Path, PathBuf};

use studia_core::db::{Database, LibSqlPreferencesRepository, PreferencesRepository};
use studia_core::util::normalize_text_option;

use crate::cli::{ConfigCommands, ConfigKey, GlobalArgs};
use crate::config_profiles::{default_config_path, CliConfig};
use crate::error::CliError;

pub async fn run_config(command: ConfigCommands, global: &GlobalArgs) -> Result<(), CliError> {
    run_config_at(command, global, &default_config_path()).await
}

pub async fn run_config_at(
    command: ConfigCommands,
    global: &GlobalArgs,
    config_path: &Path,
) -> Result<(), CliError> {
    let mut config = CliConfig::load_from_path(config_path).map_err(CliError::Config)?;
    match command {
        ConfigCommands::Show => {
            let cache_path = config.resolve_cache_path(global.cache.clone());
            let database = Database::open(&cache_path).await?;
            let preferences = LibSqlPreferencesRepository::new(database.connection())
                .load()
                .await?;

            println!("config: {}", config_path.display());
            println!(
                "user: {}",
                config
                    .resolve_user(global.user.clone())
                    .as_deref()
                    .unwrap_or("(none)")
            );
            println!(
                "store: {}",
                config.resolve_store_path(global.store.clone()).display()
            );
            println!("cache: {}", cache_path.display());
            println!("offline-persistence: {}", preferences.offline_persistence);
            Ok(())
        }
        ConfigCommands::Set {
            key: ConfigKey::OfflinePersistence,
            value,
        } => {
            let enabled = parse_flag(&value).ok_or_else(|| {
                CliError::Config(format!("expected true or false for offline-persistence, got '{value}'"))
            })?;
            let cache_path = config.resolve_cache_path(global.cache.clone());
            let database = Database::open(&cache_path).await?;
            let repository = LibSqlPreferencesRepository::new(database.connection());
            let mut preferences = repository.load().await?;
            preferences.offline_persistence = enabled;
            repository.save(&preferences).await?;
            println!("offline-persistence: {enabled}");
            Ok(())
        }
        ConfigCommands::Set { key, value } => {
            apply_config_value(&mut config, key, &value)?;
            config
                .save_to_path(config_path)
                .map_err(CliError::Config)?;
            println!("{}", config_path.display());
            Ok(())
        }
    }
}

/// Update a file-backed setting. An empty value unsets it.
pub fn apply_config_value(
    config: &mut CliConfig,
    key: ConfigKey,
    value: &str,
) -> Result<(), CliError> {
    let value = normalize_text_option(Some(value.to_string()));
    match key {
        ConfigKey::User => config.default_user = value,
        ConfigKey::Store => config.store_path = value.map(PathBuf::from),
        ConfigKey::Cache => config.cache_path = value.map(PathBuf::from),
        ConfigKey::OfflinePersistence => {
            return Err(CliError::Config(
                "offline-persistence is stored in the cache database".to_string(),
            ));
        }
    }
    Ok(())
}

pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

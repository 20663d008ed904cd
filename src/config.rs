use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::sync::DEFAULT_MATCH_WINDOW_MS;

pub const DEFAULT_CONFIG_PATH: &str = "config/utrabajo.json";
pub const DEFAULT_DATABASE_PATH: &str = "data/utrabajo.db";

pub const ENV_USER: &str = "UTRABAJO_USER";
pub const ENV_DATABASE: &str = "UTRABAJO_DB";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Signed-in user; chats are listed from this user's point of view.
    pub user_id: Option<String>,
    pub database_path: String,
    /// Tolerance between local and server timestamps of the same message.
    pub match_window_ms: i64,
    /// Capacity of the worker <-> screen channels.
    pub channel_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            user_id: None,
            database_path: DEFAULT_DATABASE_PATH.to_string(),
            match_window_ms: DEFAULT_MATCH_WINDOW_MS,
            channel_capacity: 100,
        }
    }
}

impl AppConfig {
    /// `UTRABAJO_USER` / `UTRABAJO_DB` win over the file.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var(ENV_USER).ok(),
            std::env::var(ENV_DATABASE).ok(),
        );
    }

    fn apply_overrides(&mut self, user: Option<String>, database: Option<String>) {
        if let Some(user) = user.filter(|u| !u.trim().is_empty()) {
            self.user_id = Some(user);
        }
        if let Some(database) = database.filter(|d| !d.trim().is_empty()) {
            self.database_path = database;
        }
    }
}

pub fn load_config(path: &str) -> AppConfig {
    let path = Path::new(path);
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Failed to parse config file {}: {err}", path.display());
                AppConfig::default()
            }
        },
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            AppConfig::default()
        }
    }
}

pub fn save_config(path: &str, config: &AppConfig) -> std::io::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)
}

/// Remember `user_id` as the default user of later runs.
pub fn persist_user(path: &str, user_id: &str) {
    let mut config = load_config(path);
    config.user_id = Some(user_id.to_string());

    if let Err(err) = save_config(path, &config) {
        log::error!("Failed to write config {}: {err}", path);
    } else {
        log::info!("Persisted user {} to {}", user_id, path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_config("/definitely/not/here.json");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.match_window_ms, 5_000);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cfg.json");
        fs::write(&path, r#"{"user_id": "s1"}"#).expect("write");

        let config = load_config(path.to_str().expect("utf8 path"));
        assert_eq!(config.user_id.as_deref(), Some("s1"));
        assert_eq!(config.database_path, DEFAULT_DATABASE_PATH);
    }

    #[test]
    fn unparsable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cfg.json");
        fs::write(&path, "{not json").expect("write");
        assert_eq!(
            load_config(path.to_str().expect("utf8 path")),
            AppConfig::default()
        );
    }

    #[test]
    fn persist_user_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("cfg.json");
        let path = path.to_str().expect("utf8 path");

        persist_user(path, "k7");
        assert_eq!(load_config(path).user_id.as_deref(), Some("k7"));
    }

    #[test]
    fn blank_overrides_are_ignored() {
        let mut config = AppConfig::default();
        config.apply_overrides(Some("  ".into()), Some("/tmp/x.db".into()));
        assert_eq!(config.user_id, None);
        assert_eq!(config.database_path, "/tmp/x.db");
    }
}

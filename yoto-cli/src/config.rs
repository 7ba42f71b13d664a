//! CLI settings handling.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use yoto_core::credentials::CredentialStore;
use yoto_core::device_flow::DEFAULT_SLOW_DOWN_INCREMENT;
use yoto_core::transcode::{DEFAULT_MAX_ATTEMPTS, DEFAULT_TRANSCODE_INTERVAL};
use yoto_core::{ClientConfig, Clock, TranscodePoller, TranscodeSource};

/// OAuth client registered for this CLI.
pub const DEFAULT_CLIENT_ID: &str = "A1c4Noo77MdN7CB8QjUOvwtdyMZnSwkd";

/// Environment variable naming an alternate settings file.
pub const SETTINGS_ENV: &str = "YOTO_SETTINGS";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// OAuth client ID used for login.
    pub client_id: String,

    /// Logging level when neither `RUST_LOG` nor `--verbose` is given.
    pub log_level: String,

    /// Override for the credential file location.
    pub credentials_path: Option<PathBuf>,

    /// Endpoints and OAuth parameters.
    pub api: ClientConfig,

    pub polling: PollingSettings,

    /// Path to the settings file that was loaded.
    #[serde(skip)]
    pub settings_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            log_level: "warn".to_string(),
            credentials_path: None,
            api: ClientConfig::default(),
            polling: PollingSettings::default(),
            settings_path: PathBuf::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    /// Seconds added to the login poll interval on `slow_down`.
    pub slow_down_increment_secs: u64,

    pub transcode_interval_secs: u64,

    pub transcode_max_attempts: u32,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            slow_down_increment_secs: DEFAULT_SLOW_DOWN_INCREMENT.as_secs(),
            transcode_interval_secs: DEFAULT_TRANSCODE_INTERVAL.as_secs(),
            transcode_max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl PollingSettings {
    pub fn slow_down_increment(&self) -> Duration {
        Duration::from_secs(self.slow_down_increment_secs)
    }

    pub fn transcode_poller<'a, S, C>(&self, source: &'a S, clock: &'a C) -> TranscodePoller<'a, S, C>
    where
        S: TranscodeSource + ?Sized,
        C: Clock + ?Sized,
    {
        TranscodePoller::new(source, clock)
            .with_interval(Duration::from_secs(self.transcode_interval_secs))
            .with_max_attempts(self.transcode_max_attempts)
    }
}

impl Settings {
    /// The credential file, honouring `credentials_path`.
    pub fn credential_store(&self) -> Result<CredentialStore> {
        match &self.credentials_path {
            Some(path) => Ok(CredentialStore::at(path)),
            None => CredentialStore::open().context("Failed to locate credential file"),
        }
    }
}

/// Load settings from `YOTO_SETTINGS` or the default location.
///
/// A missing file yields defaults.
pub fn load_settings() -> Result<Settings> {
    let path = match std::env::var_os(SETTINGS_ENV) {
        Some(path) => PathBuf::from(path),
        None => default_settings_path(),
    };
    load_settings_from(&path)
}

pub fn load_settings_from(path: &Path) -> Result<Settings> {
    let mut settings = if path.exists() {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {:?}", path))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse settings from {:?}", path))?
    } else {
        Settings::default()
    };

    settings.settings_path = path.to_path_buf();
    Ok(settings)
}

fn default_settings_path() -> PathBuf {
    project_dirs()
        .map(|d| d.config_dir().join("settings.toml"))
        .unwrap_or_else(|| PathBuf::from("yoto-settings.toml"))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "yotoplay", "yoto-cli")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");

        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.client_id, DEFAULT_CLIENT_ID);
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.api, ClientConfig::default());
        assert_eq!(settings.polling, PollingSettings::default());
        assert_eq!(settings.settings_path, path);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            r#"
log_level = "debug"
credentials_path = "/tmp/yoto-creds.json"

[api]
api_base_url = "http://localhost:8080"

[polling]
slow_down_increment_secs = 0
"#,
        )
        .unwrap();

        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.client_id, DEFAULT_CLIENT_ID);
        assert_eq!(settings.api.api_base_url, "http://localhost:8080");
        assert_eq!(settings.api.auth_base_url, ClientConfig::default().auth_base_url);
        assert_eq!(settings.polling.slow_down_increment(), Duration::ZERO);
        assert_eq!(settings.polling.transcode_max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(
            settings.credential_store().unwrap().path(),
            Path::new("/tmp/yoto-creds.json")
        );
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "polling = 3").unwrap();

        let err = load_settings_from(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse settings"));
    }
}

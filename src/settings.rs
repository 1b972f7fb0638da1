use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use tracing::warn;

const APP_DIR: &str = "taskboard-sync";
const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";
const MIN_REQUEST_TIMEOUT_MS: u64 = 500;
const MAX_REQUEST_TIMEOUT_MS: u64 = 120_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the task board backend.
    pub server_url: String,
    /// Per-request timeout. `0` leaves requests unbounded.
    pub request_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            request_timeout_ms: 0,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push(APP_DIR);
        path.push("settings.toml");
        Some(path)
    }

    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        Self::load_from_path(&path)
    }

    pub fn load_from_path(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) => {
                warn!(
                    "failed to read settings config '{}': {}",
                    path.display(),
                    error
                );
                return Self::default();
            }
        };

        match toml::from_str::<Self>(&contents) {
            Ok(mut settings) => {
                settings.validate();
                settings
            }
            Err(error) => {
                warn!(
                    "failed to parse settings config '{}': {}",
                    path.display(),
                    error
                );
                Self::default()
            }
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path().ok_or_else(|| anyhow!("unable to determine config path"))?;
        self.save_to_path(&path)
    }

    pub fn save_to_path(&self, path: &Path) -> anyhow::Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow!("invalid settings config path"))?;
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory '{}'", parent.display()))?;

        let mut validated = self.clone();
        validated.validate();
        let contents =
            toml::to_string_pretty(&validated).context("failed to serialize settings to TOML")?;

        let file_name = path
            .file_name()
            .ok_or_else(|| anyhow!("invalid settings config file name"))?
            .to_string_lossy()
            .to_string();
        let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

        fs::write(&tmp_path, contents).with_context(|| {
            format!(
                "failed to write temporary settings file '{}'",
                tmp_path.display()
            )
        })?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "failed to rename settings file '{}' to '{}'",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }

    /// Replaces `server_url` with a command-line override, validated the same
    /// way a configured value is.
    pub fn with_server_override(mut self, server_url: Option<&str>) -> Self {
        if let Some(server_url) = server_url {
            self.server_url = server_url.to_string();
            self.validate();
        }
        self
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }

    fn validate(&mut self) {
        if self.request_timeout_ms > 0 {
            self.request_timeout_ms = self
                .request_timeout_ms
                .clamp(MIN_REQUEST_TIMEOUT_MS, MAX_REQUEST_TIMEOUT_MS);
        }

        let trimmed = self.server_url.trim().trim_end_matches('/');
        self.server_url = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            warn!(
                "invalid server_url '{}' in settings config; falling back to {}",
                self.server_url, DEFAULT_SERVER_URL
            );
            DEFAULT_SERVER_URL.to_string()
        };
    }
}

//! Daemon settings.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use mailnotify_core::{CoordinatorConfig, ProviderSettings};
use serde::{Deserialize, Serialize};

/// Environment variable overriding the database path.
pub const DATABASE_ENV: &str = "MAILNOTIFY_DB";

/// Settings that persist across sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Mail database. Defaults to the user data directory.
    pub database_path: Option<PathBuf>,
    /// Debounce window for change signals, in seconds.
    pub debounce_secs: u64,
    /// Minimum time between audible alerts for one account, in seconds.
    pub min_alert_interval_secs: u64,
    /// Extra provider defaults.
    pub providers: Vec<ProviderSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: None,
            debounce_secs: 15,
            min_alert_interval_secs: 60,
            providers: Vec::new(),
        }
    }
}

impl Settings {
    /// Default settings file location.
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mailnotify")
            .join("settings.json")
    }

    /// Load settings from the default location.
    pub async fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::path()).await
    }

    /// Load settings from `path`, falling back to defaults if it does not exist.
    pub async fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;

        let settings: Self = serde_json::from_str(&contents)
            .with_context(|| format!("invalid settings in {}", path.display()))?;
        if settings.debounce_secs == 0 {
            anyhow::bail!("debounce_secs in {} must be at least 1", path.display());
        }
        Ok(settings)
    }

    /// Database path, honoring [`DATABASE_ENV`].
    pub fn database_path(&self) -> PathBuf {
        self.database_path_with(std::env::var_os(DATABASE_ENV))
    }

    fn database_path_with(&self, env: Option<OsString>) -> PathBuf {
        if let Some(path) = env.filter(|p| !p.is_empty()) {
            return PathBuf::from(path);
        }

        self.database_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("mailnotify")
                .join("mail.db")
        })
    }

    /// Coordinator settings.
    pub const fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            debounce: Duration::from_secs(self.debounce_secs),
        }
    }

    /// Minimum time between audible alerts.
    pub const fn min_alert_interval(&self) -> Duration {
        Duration::from_secs(self.min_alert_interval_secs)
    }
}

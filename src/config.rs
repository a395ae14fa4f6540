use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Application-level constants
pub const APP_NAME: &str = "Dosekeeper";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const SETTINGS_FILE_NAME: &str = "settings.json";
const DATABASE_FILE_NAME: &str = "medicines.db";

/// Upper bound on the wake-up execution window, in seconds.
pub const MAX_EXECUTION_WINDOW_SECS: u64 = 600;

/// Application data directory: `<local data dir>/Dosekeeper`, or `./Dosekeeper`
/// when the platform reports none.
pub fn app_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

pub fn settings_path() -> PathBuf {
    app_data_dir().join(SETTINGS_FILE_NAME)
}

pub fn default_database_path() -> PathBuf {
    app_data_dir().join(DATABASE_FILE_NAME)
}

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "dosekeeper_lib=info,dosekeeper=info,warn"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Settings I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// User-tunable reminder settings, stored as JSON next to the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderSettings {
    /// Local hour at which refill reminders fire.
    pub refill_hour: u32,
    pub refill_minute: u32,
    /// Wall-clock budget for handling one wake-up.
    pub execution_window_secs: u64,
    pub database_path: Option<PathBuf>,
    pub log_filter: Option<String>,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            refill_hour: 9,
            refill_minute: 0,
            execution_window_secs: 10,
            database_path: None,
            log_filter: None,
        }
    }
}

impl ReminderSettings {
    pub fn refill_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.refill_hour, self.refill_minute, 0).unwrap_or_default()
    }

    pub fn execution_window(&self) -> Duration {
        Duration::from_secs(self.execution_window_secs)
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(default_database_path)
    }

    pub fn log_filter(&self) -> &str {
        self.log_filter
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or(default_log_filter())
    }
}

/// Clamp and trim every field so the rest of the crate can trust it.
pub fn validate(mut settings: ReminderSettings) -> ReminderSettings {
    if settings.refill_hour > 23 {
        warn!(
            "settings: refill_hour {} out of range, clamping",
            settings.refill_hour
        );
        settings.refill_hour = 23;
    }
    if settings.refill_minute > 59 {
        warn!(
            "settings: refill_minute {} out of range, clamping",
            settings.refill_minute
        );
        settings.refill_minute = 59;
    }
    settings.execution_window_secs = settings
        .execution_window_secs
        .clamp(1, MAX_EXECUTION_WINDOW_SECS);

    settings.database_path = settings
        .database_path
        .filter(|p| !p.as_os_str().is_empty());
    settings.log_filter = settings.log_filter.and_then(|f| {
        let trimmed = f.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    });
    settings
}

/// Parse the settings file without validating or logging, so it can run
/// before tracing is installed. `None` when the file does not exist.
pub fn read_settings(path: &Path) -> Result<Option<ReminderSettings>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// Log where the settings came from and validate them.
pub fn resolve_settings(path: &Path, stored: Option<ReminderSettings>) -> ReminderSettings {
    match stored {
        Some(settings) => {
            debug!("loaded settings from {}", path.display());
            validate(settings)
        }
        None => {
            info!("no settings file at {}, using defaults", path.display());
            ReminderSettings::default()
        }
    }
}

/// Load settings from `path`. A missing file yields defaults.
pub fn load_settings(path: &Path) -> Result<ReminderSettings, ConfigError> {
    Ok(resolve_settings(path, read_settings(path)?))
}

pub fn save_settings(path: &Path, input: ReminderSettings) -> Result<ReminderSettings, ConfigError> {
    let validated = validate(input);

    info!("saving settings to {}", path.display());

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let serialized = serde_json::to_string_pretty(&validated)?;
    std::fs::write(path, serialized).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(validated)
}

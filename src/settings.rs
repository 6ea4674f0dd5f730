use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::session::{SessionConfig, DEFAULT_FOCUS_SECONDS};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserSettings {
    /// IANA zone name for the stats view; `None` means the system zone.
    timezone: Option<String>,
    focus_duration_sec: u64,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            timezone: None,
            focus_duration_sec: DEFAULT_FOCUS_SECONDS,
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn timezone(&self) -> Option<String> {
        self.data.read().unwrap().timezone.clone()
    }

    pub fn focus_duration_sec(&self) -> u64 {
        self.data.read().unwrap().focus_duration_sec
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            default_duration_sec: self.focus_duration_sec(),
            ..SessionConfig::default()
        }
    }

    pub fn update_timezone(&self, timezone: Option<String>) -> Result<()> {
        let mut guard = self.data.write().unwrap();
        guard.timezone = timezone;
        self.persist(&guard)
    }

    pub fn update_focus_duration(&self, focus_duration_sec: u64) -> Result<()> {
        let mut guard = self.data.write().unwrap();
        guard.focus_duration_sec = focus_duration_sec;
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

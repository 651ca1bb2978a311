//! Notification configuration.
//!
//! Loaded once at startup from `~/.config/chime/config.toml`. Every field
//! has a default so a missing file or a partial file both work; a present
//! but malformed file is an error (silently ignoring a user's config is
//! worse than failing loudly).

use std::path::{Path, PathBuf};

use fs_err as fs;
use serde::Deserialize;

use crate::arbiter::Classification;
use crate::error::{ChimeError, Result};

const CONFIG_DIR: &str = "chime";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NotifyConfig {
    #[serde(default)]
    pub global: GlobalSettings,
    #[serde(default)]
    pub events: EventTable,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalSettings {
    /// Sound volume, 0-100. Zero disables sound entirely.
    #[serde(default = "default_volume")]
    pub volume: u8,
    /// Desktop notification timeout in seconds (ignored on platforms where
    /// the OS controls notification duration).
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u32,
    /// Base URL of the host API used to look up session titles. Absent
    /// means no lookup collaborator; every uncached session falls back to
    /// the default title.
    #[serde(default)]
    pub host_url: Option<String>,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            timeout_seconds: default_timeout_seconds(),
            host_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct EventTable {
    #[serde(default)]
    pub permission: EventSettings,
    #[serde(default)]
    pub completion: EventSettings,
    #[serde(default)]
    pub delegated_completion: EventSettings,
    #[serde(default)]
    pub error: EventSettings,
}

impl EventTable {
    pub fn for_classification(&self, classification: Classification) -> &EventSettings {
        match classification {
            Classification::Permission => &self.permission,
            Classification::Completion => &self.completion,
            Classification::DelegatedCompletion => &self.delegated_completion,
            Classification::Error => &self.error,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventSettings {
    /// Show a desktop notification for this classification.
    #[serde(default = "default_true")]
    pub notify: bool,
    /// Play a sound for this classification.
    #[serde(default = "default_true")]
    pub sound: bool,
    /// Message template; `{title}` expands to the session title. Absent
    /// means the built-in template for the classification.
    #[serde(default)]
    pub message: Option<String>,
    /// Sound file override. Absolute, or relative to the chime sounds dir.
    #[serde(default)]
    pub sound_file: Option<PathBuf>,
    /// Notification image override.
    #[serde(default)]
    pub image: Option<PathBuf>,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            notify: true,
            sound: true,
            message: None,
            sound_file: None,
            image: None,
        }
    }
}

impl NotifyConfig {
    /// Load configuration, preferring `override_path` when given. A
    /// missing file yields full defaults.
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let path = match override_path {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(&path).map_err(|err| ChimeError::Io {
            context: format!("reading {}", path.display()),
            source: err,
        })?;
        toml::from_str(&raw).map_err(|err| ChimeError::ConfigMalformed {
            path,
            details: err.to_string(),
        })
    }

    pub fn message_for(&self, classification: Classification, session_title: &str) -> String {
        let settings = self.events.for_classification(classification);
        let template = settings
            .message
            .as_deref()
            .unwrap_or_else(|| default_message(classification));
        template.replace("{title}", session_title)
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

fn default_message(classification: Classification) -> &'static str {
    match classification {
        Classification::Permission => "{title} is asking for permission",
        Classification::Completion => "{title} finished its task",
        Classification::DelegatedCompletion => "{title} finished a delegated task",
        Classification::Error => "{title} hit an error",
    }
}

fn default_volume() -> u8 {
    100
}

fn default_timeout_seconds() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

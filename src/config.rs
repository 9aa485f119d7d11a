use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::journal::MAX_RECORD_COUNT;

const APP_DIR: &str = "com.w0nk1.skipwatch";

fn default_skip_label() -> String {
    "跳过".to_string()
}

fn default_launcher_app() -> String {
    "com.android.launcher3".to_string()
}

fn default_platform_app() -> String {
    "android".to_string()
}

fn default_trusted_namespace() -> String {
    "com.android.".to_string()
}

fn default_journal_capacity() -> usize {
    MAX_RECORD_COUNT
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Exact label a skip control must carry.
    #[serde(default = "default_skip_label")]
    pub skip_label: String,
    /// Identity of the process hosting the detector; its own UI is ignored.
    #[serde(default)]
    pub host_app: String,
    #[serde(default = "default_launcher_app")]
    pub launcher_app: String,
    #[serde(default = "default_platform_app")]
    pub platform_app: String,
    /// Identity prefix reserved for trusted system apps.
    #[serde(default = "default_trusted_namespace")]
    pub trusted_namespace: String,
    #[serde(default = "default_journal_capacity")]
    pub journal_capacity: usize,
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            skip_label: default_skip_label(),
            host_app: String::new(),
            launcher_app: default_launcher_app(),
            platform_app: default_platform_app(),
            trusted_namespace: default_trusted_namespace(),
            journal_capacity: default_journal_capacity(),
            state_dir: None,
        }
    }
}

impl WatchConfig {
    /// True for apps whose trees are never inspected.
    pub fn is_ignored_app(&self, app: &str) -> bool {
        (!self.host_app.is_empty() && app == self.host_app)
            || app == self.launcher_app
            || app == self.platform_app
            || (!self.trusted_namespace.is_empty() && app.starts_with(&self.trusted_namespace))
    }

    /// Configured state directory, or the per-user default.
    pub fn resolved_state_dir(&self) -> Option<PathBuf> {
        self.state_dir.clone().or_else(default_state_dir)
    }
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.json"))
}

pub fn default_state_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join(APP_DIR))
}

/// Read the config at `path`. Missing or unreadable files fall back to defaults.
pub fn load(path: &Path) -> WatchConfig {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            warn!(path = %path.display(), %err, "config is corrupt, using defaults");
            WatchConfig::default()
        }),
        Err(_) => WatchConfig::default(),
    }
}

pub fn save(path: &Path, config: &WatchConfig) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    let json = serde_json::to_string_pretty(config).map_err(|e| e.to_string())?;
    std::fs::write(path, json).map_err(|e| e.to_string())
}

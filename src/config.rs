//! Configuration for the watcher and its logging.
//!
//! Layered the usual way:
//! - Default values
//! - TOML configuration file (`watchmux.toml`)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `WATCHMUX_` and use double
//! underscores to separate nested levels:
//! - `WATCHMUX_WATCHER__BACKEND=poll` sets `watcher.backend`
//! - `WATCHMUX_WATCHER__POLL_INTERVAL_MS=250` sets `watcher.poll_interval_ms`
//! - `WATCHMUX_LOGGING__DEFAULT=debug` sets `logging.default`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::watcher::WatchError;

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE: &str = "watchmux.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "WATCHMUX_";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Settings {
    /// Watcher backend settings
    #[serde(default)]
    pub watcher: WatcherConfig,

    /// Logging levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which `notify` implementation backs the watcher.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Platform-native notifications (inotify, FSEvents, ReadDirectoryChangesW).
    #[default]
    Native,
    /// Periodic stat polling, for filesystems without native support.
    Poll,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatcherConfig {
    /// Notification backend
    #[serde(default)]
    pub backend: BackendKind,

    /// Poll interval in milliseconds (poll backend only)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Hash file contents to detect changes (poll backend only)
    #[serde(default)]
    pub compare_contents: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level for all targets
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `watchmux = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_poll_interval_ms() -> u64 {
    500
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            poll_interval_ms: default_poll_interval_ms(),
            compare_contents: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from defaults, `./watchmux.toml` and the environment.
    pub fn load() -> Result<Self, WatchError> {
        Self::load_from(PathBuf::from(CONFIG_FILE))
    }

    /// Load configuration using a specific TOML file.
    ///
    /// A missing file is not an error; defaults and env still apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, WatchError> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels; single underscore
            // stays part of the field name.
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(|e| WatchError::Config {
                reason: e.to_string(),
            })
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), WatchError> {
        let path = path.as_ref();
        let config_err = |reason: String| WatchError::Config { reason };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| config_err(e.to_string()))?;
            }
        }

        let toml_string = toml::to_string_pretty(self).map_err(|e| config_err(e.to_string()))?;
        std::fs::write(path, toml_string).map_err(|e| config_err(e.to_string()))
    }
}

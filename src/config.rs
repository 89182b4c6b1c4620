//! Configuration management
//!
//! Handles TOML settings parsing and validation. The settings file is read
//! once at startup and turned into an immutable [`PolicyConfig`].

use crate::constants::{GLOBAL_SETTINGS_FILE, LOCAL_SETTINGS_FILE};
use crate::models::{DeviceId, DeviceSet};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Policy for one run
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyConfig {
    /// Delay between two enumerations
    pub poll_interval: Duration,
    /// Devices accepted without consulting the unlock probe
    pub whitelist: DeviceSet,
    /// Delegated kill command, replaces the built-in strategy
    pub kill_command: Option<String>,
    /// Probe reporting an unlocked session through exit status 0
    pub unlock_command: Option<String>,
    /// Whether a disappearing known device triggers a kill while locked
    pub kill_on_missing: bool,
    /// Log kill decisions without acting on them
    pub simulate: bool,
}

/// Everything loaded from the settings file
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub policy: PolicyConfig,
    /// Event log file; console only when absent
    pub log_file: Option<PathBuf>,
}

/// Errors raised while loading settings
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no settings file found (looked in {})", display_paths(.searched))]
    NotFound { searched: Vec<PathBuf> },

    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("missing required setting '{0}'")]
    MissingField(&'static str),

    #[error("invalid sleep interval {0}: must be a positive number of seconds")]
    InvalidSleep(f64),

    #[error("invalid kill_on_missing value {0}: must be 0 or 1")]
    InvalidKillOnMissing(i64),

    #[error("whitelist entry '{0}' contains whitespace")]
    InvalidWhitelistEntry(String),
}

#[derive(Debug, Deserialize)]
struct SettingsFile {
    config: RawSettings,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSettings {
    sleep: Option<f64>,
    whitelist: Option<WhitelistField>,
    kill_cmd: Option<String>,
    unlock_cmd: Option<String>,
    kill_on_missing: Option<i64>,
    log_file: Option<String>,
}

/// Whitelist written either as one space-separated string or as an array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WhitelistField {
    Text(String),
    List(Vec<String>),
}

impl Settings {
    /// Locate and load the settings file.
    ///
    /// An explicit path is used as-is; otherwise the working directory is
    /// searched before the system-wide location.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, PathBuf), ConfigError> {
        let path = locate(explicit)?;
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let settings = Self::from_toml_str(&text, &path)?;
        Ok((settings, path))
    }

    /// Parse and validate settings text. `origin` is only used in errors.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let file: SettingsFile = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        file.config.validate()
    }
}

impl PolicyConfig {
    /// Copy of this policy with simulation forced on or off
    pub fn with_simulate(mut self, simulate: bool) -> Self {
        self.simulate = simulate;
        self
    }
}

impl RawSettings {
    fn validate(self) -> Result<Settings, ConfigError> {
        let sleep = self.sleep.ok_or(ConfigError::MissingField("sleep"))?;
        if sleep <= 0.0 {
            return Err(ConfigError::InvalidSleep(sleep));
        }
        let poll_interval =
            Duration::try_from_secs_f64(sleep).map_err(|_| ConfigError::InvalidSleep(sleep))?;

        let whitelist: DeviceSet = match self.whitelist.ok_or(ConfigError::MissingField("whitelist"))? {
            WhitelistField::Text(text) => text.split_whitespace().map(DeviceId::from).collect(),
            WhitelistField::List(entries) => entries
                .into_iter()
                .map(|entry| entry.trim().to_string())
                .filter(|entry| !entry.is_empty())
                .map(|entry| {
                    if entry.contains(char::is_whitespace) {
                        Err(ConfigError::InvalidWhitelistEntry(entry))
                    } else {
                        Ok(DeviceId::from(entry))
                    }
                })
                .collect::<Result<DeviceSet, _>>()?,
        };

        let kill_on_missing = match self
            .kill_on_missing
            .ok_or(ConfigError::MissingField("kill_on_missing"))?
        {
            0 => false,
            1 => true,
            other => return Err(ConfigError::InvalidKillOnMissing(other)),
        };

        Ok(Settings {
            policy: PolicyConfig {
                poll_interval,
                whitelist,
                kill_command: non_empty(self.kill_cmd),
                unlock_command: non_empty(self.unlock_cmd),
                kill_on_missing,
                simulate: false,
            },
            log_file: non_empty(self.log_file).map(PathBuf::from),
        })
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn locate(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    let searched: Vec<PathBuf> = [LOCAL_SETTINGS_FILE, GLOBAL_SETTINGS_FILE]
        .iter()
        .map(PathBuf::from)
        .collect();

    if let Some(found) = searched.iter().find(|candidate| candidate.is_file()) {
        return Ok(found.clone());
    }
    Err(ConfigError::NotFound { searched })
}

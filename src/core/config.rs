//! Configuration: TOML file + env var fallback + defaults.

use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, TwError};

/// Environment variable naming a config file, consulted when no explicit
/// path is given.
pub const CONFIG_ENV: &str = "TWATCH_CONFIG";

/// Full treewatch configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub watch: WatchConfig,
    pub output: OutputConfig,
}

/// Watch-manager knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WatchConfig {
    /// Directory basenames that are never watched, merged with the CLI list.
    pub ignore: Vec<String>,
    /// How many maximum-size kernel records one drain of the event buffer
    /// can hold.
    pub max_buffered_events: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            ignore: Vec::new(),
            max_buffered_events: 4096,
        }
    }
}

/// Printer knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OutputConfig {
    /// Colorize event kinds on terminals.
    pub color: bool,
    /// Bounded capacity of the printer channel.
    pub channel_capacity: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            color: true,
            channel_capacity: 1024,
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// Precedence: explicit path, then `$TWATCH_CONFIG`, then built-in
    /// defaults. An explicit path that does not exist is an error; an unset
    /// or dangling env var is not.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(TwError::MissingConfig {
                    path: path.to_path_buf(),
                });
            }
            return Self::from_file(path);
        }

        if let Ok(env_path) = env::var(CONFIG_ENV)
            && !env_path.is_empty()
        {
            let path = Path::new(&env_path);
            if path.exists() {
                return Self::from_file(path);
            }
        }

        Ok(Self::default())
    }

    fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| TwError::ConfigParse {
            context: "read",
            details: format!("{}: {e}", path.display()),
        })?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the watcher cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.watch.max_buffered_events == 0 {
            return Err(TwError::ConfigParse {
                context: "watch",
                details: "max_buffered_events must be positive".to_string(),
            });
        }
        if self.output.channel_capacity == 0 {
            return Err(TwError::ConfigParse {
                context: "output",
                details: "channel_capacity must be positive".to_string(),
            });
        }
        Ok(())
    }
}

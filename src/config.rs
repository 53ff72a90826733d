//! Process settings read from the environment (a `.env` file is honoured).

use std::path::PathBuf;

use crate::logging::LogChannels;
use crate::runner::DEFAULT_SHELL;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:6666";
pub const DEFAULT_CONFIG_PATH: &str = "config.yml";
pub const DEFAULT_LOG_DIR: &str = ".";

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_address: String,
    /// Script registry file
    pub config_path: PathBuf,
    pub shell: PathBuf,
    /// Directory holding `error.log`
    pub log_dir: PathBuf,
    pub log_channels: LogChannels,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            bind_address: var("BIND_ADDRESS", DEFAULT_BIND_ADDRESS),
            config_path: var("HOOK_CONFIG", DEFAULT_CONFIG_PATH).into(),
            shell: var("SHELL_PATH", DEFAULT_SHELL).into(),
            log_dir: var("LOG_DIR", DEFAULT_LOG_DIR).into(),
            log_channels: lookup("LOG_CHANNELS")
                .map(|v| LogChannels::parse(&v))
                .unwrap_or_default(),
        }
    }
}

use std::io;
use std::process::ExitStatus;

/// Custom error type for merge_hook operations
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("Failed to read request body: {0}")]
    BodyRead(String),

    #[error("Failed to decode webhook payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to open error log in '{path}': {message}")]
    LogFile { path: String, message: String },

    #[error("Failed to start script '{script}': {source}")]
    ScriptLaunch {
        script: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to wait for script process {pid}: {source}")]
    ScriptWait {
        pid: u32,
        #[source]
        source: io::Error,
    },

    #[error("Script process {pid} exited unsuccessfully: {status}")]
    ScriptFailed { pid: u32, status: ExitStatus },

    #[error("YAML parsing error: {0}")]
    YamlParseError(#[from] serde_yaml::Error),

    #[error("TOML parsing error: {0}")]
    TomlParseError(#[from] toml::de::Error),
}

/// Helper type for Results that use HookError
pub type Result<T> = std::result::Result<T, HookError>;

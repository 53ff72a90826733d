//! Script registry: maps the last segment of a webhook URL to a script path.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{error, info};

use crate::error::HookError;

/// Read-only lookup table loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct ScriptRegistry {
    scripts: HashMap<String, String>,
}

impl ScriptRegistry {
    pub fn new(scripts: HashMap<String, String>) -> Self {
        Self { scripts }
    }

    /// Load the registry from a file.
    /// `.toml` files are parsed as a TOML table, anything else as a YAML mapping.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HookError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            HookError::ConfigError(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        let scripts: HashMap<String, String> = if is_toml {
            toml::from_str(&raw)?
        } else if raw.trim().is_empty() {
            // an empty YAML document is `null`, not a mapping
            HashMap::new()
        } else {
            serde_yaml::from_str(&raw)?
        };

        Ok(Self::new(scripts))
    }

    /// Load the registry, falling back to an empty one when the file is
    /// missing or malformed. Every lookup then misses.
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(registry) => {
                info!(
                    "Loaded {} script(s) from config file {:?}",
                    registry.len(),
                    path
                );
                registry
            }
            Err(e) => {
                error!("Failed to load config file {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Returns the script configured for `key`.
    /// Blank entries count as unconfigured.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.scripts
            .get(key)
            .map(String::as_str)
            .filter(|script| !script.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

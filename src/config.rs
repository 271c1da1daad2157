//! Shell configuration using Figment.
//!
//! Layers, later ones winning:
//! 1. built-in defaults
//! 2. a TOML file (`labshell.toml` unless another path is given)
//! 3. environment variables prefixed with `LABSHELL_`
//!    (e.g. `LABSHELL_LOG_LEVEL=debug`)
//!
//! ```toml
//! log_level = "info"
//! log_format = "compact"
//! plugin_paths = ["shell_plugins"]
//! ```

use crate::logging::OutputFormat;
use crate::plugin::ConfigLoadError;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "labshell.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "LABSHELL_";

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Top-level shell configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShellConfig {
    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Log output format.
    pub log_format: OutputFormat,
    /// Plugin files or directories run when no path is given on the
    /// command line.
    pub plugin_paths: Vec<PathBuf>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: OutputFormat::Compact,
            plugin_paths: vec![PathBuf::from("shell_plugins")],
        }
    }
}

impl ShellConfig {
    /// Load from `labshell.toml` (if present) and the environment.
    pub fn load() -> Result<Self, ConfigLoadError> {
        Self::extract(Self::figment(Path::new(DEFAULT_CONFIG_FILE)))
    }

    /// Load from an explicit file, which must exist, and the environment.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigLoadError::NotFound(path.display().to_string()));
        }
        Self::extract(Self::figment(path))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigLoadError> {
        figment
            .extract()
            .map_err(|e| ConfigLoadError::ParseError(e.to_string()))
    }

    /// Provider stack: defaults, then `path` (skipped if missing), then env.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(ShellConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).only(&["log_level", "log_format", "plugin_paths"]))
    }

    /// Validate values serde cannot check.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if !VALID_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigLoadError::ValidationError(format!(
                "invalid log_level '{}', must be one of: {}",
                self.log_level,
                VALID_LEVELS.join(", ")
            )));
        }
        Ok(())
    }
}

//! Shell plugins: TOML startup documents run against the registry.
//!
//! A plugin declares instruments to create and derived variables to add to
//! composite instruments:
//!
//! ```toml
//! [[instruments]]
//! name = "dmm1"
//! type = "example"
//! [instruments.params]
//! address = "GPIB::1"
//!
//! [[scaled]]
//! target = "combined"
//! name = "magnet"
//! source = "dmm1"
//! parameter = "ch1_output"
//! scale = 0.02
//! offset = -0.13
//! units = "mT"
//!
//! [[combined]]
//! target = "combined"
//! name = "waveoffset"
//! format = "%.04f"
//! [[combined.terms]]
//! instrument = "dmm1"
//! parameter = "ch2_output"
//! ```
//!
//! Sections run in a fixed order: all instruments, then scaled variables,
//! then combined variables, each in document order. The first failure stops
//! the plugin and is returned; nothing is rolled back.

use anyhow::{Context, Result};
use figment::{
    providers::{Format, Toml},
    Figment,
};
use labshell_core::error::InstrumentError;
use labshell_hardware::{InstrumentHandle, InstrumentRegistry};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::Instrument as _;

/// Error types for config and plugin loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    /// File or directory not found
    #[error("Config file not found: {0}")]
    NotFound(String),

    /// File read error
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    /// Parse error (invalid TOML or wrong shape)
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    /// Validation error
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

fn default_scale() -> f64 {
    1.0
}

fn empty_table() -> toml::Value {
    toml::Value::Table(toml::map::Map::new())
}

/// `[[instruments]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstrumentEntry {
    /// Registry name.
    pub name: String,
    /// Instrument type tag.
    #[serde(rename = "type")]
    pub instrument_type: String,
    /// Construction parameters handed to the factory.
    #[serde(default = "empty_table")]
    pub params: toml::Value,
}

/// `[[scaled]]` entry: `target.name = source.parameter * scale + offset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScaledEntry {
    /// Composite instrument receiving the variable.
    pub target: String,
    /// Variable name.
    pub name: String,
    /// Source instrument.
    pub source: String,
    /// Parameter on the source.
    pub parameter: String,
    /// Multiplicative factor.
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Additive offset.
    #[serde(default)]
    pub offset: f64,
    /// Display units.
    #[serde(default)]
    pub units: String,
}

/// One `[[combined.terms]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TermEntry {
    /// Source instrument.
    pub instrument: String,
    /// Parameter on the source.
    pub parameter: String,
    /// Multiplicative factor.
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Additive offset.
    #[serde(default)]
    pub offset: f64,
}

/// `[[combined]]` entry: weighted sum of terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CombinedEntry {
    /// Composite instrument receiving the variable.
    pub target: String,
    /// Variable name.
    pub name: String,
    /// printf-style display format; empty for the default.
    #[serde(default)]
    pub format: String,
    /// Terms, evaluated in order.
    #[serde(default)]
    pub terms: Vec<TermEntry>,
}

/// A parsed shell plugin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShellPlugin {
    /// Instruments to create.
    pub instruments: Vec<InstrumentEntry>,
    /// Scaled variables to add.
    pub scaled: Vec<ScaledEntry>,
    /// Combined variables to add.
    pub combined: Vec<CombinedEntry>,
}

/// What a plugin run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PluginSummary {
    /// Instruments created.
    pub instruments: usize,
    /// Scaled variables added.
    pub scaled: usize,
    /// Combined variables added.
    pub combined: usize,
}

impl std::str::FromStr for ShellPlugin {
    type Err = ConfigLoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_figment(Figment::new().merge(Toml::string(s)))
    }
}

impl ShellPlugin {
    /// Load a plugin from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ConfigLoadError::NotFound(path.display().to_string()).into());
        }
        tracing::debug!(path = %path.display(), "loading shell plugin");
        Self::from_figment(Figment::new().merge(Toml::file(path)))
            .with_context(|| format!("Failed to load shell plugin: {}", path.display()))
    }

    fn from_figment(figment: Figment) -> Result<Self, ConfigLoadError> {
        let plugin: Self = figment
            .extract()
            .map_err(|e| ConfigLoadError::ParseError(e.to_string()))?;
        plugin.validate()?;
        Ok(plugin)
    }

    /// Structural checks that do not need a registry.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        let blank = |what: &str, value: &str| {
            if value.trim().is_empty() {
                Err(ConfigLoadError::ValidationError(format!(
                    "{} must not be empty",
                    what
                )))
            } else {
                Ok(())
            }
        };
        for entry in &self.instruments {
            blank("instruments.name", &entry.name)?;
            blank("instruments.type", &entry.instrument_type)?;
            if !entry.params.is_table() {
                return Err(ConfigLoadError::ValidationError(format!(
                    "instruments.params of '{}' must be a table",
                    entry.name
                )));
            }
        }
        for entry in &self.scaled {
            blank("scaled.target", &entry.target)?;
            blank("scaled.name", &entry.name)?;
            blank("scaled.source", &entry.source)?;
        }
        for entry in &self.combined {
            blank("combined.target", &entry.target)?;
            blank("combined.name", &entry.name)?;
            for term in &entry.terms {
                blank("combined.terms.instrument", &term.instrument)?;
            }
        }
        Ok(())
    }

    /// Run the plugin against a registry.
    pub async fn apply(&self, registry: &InstrumentRegistry) -> Result<PluginSummary> {
        let mut summary = PluginSummary::default();

        for entry in &self.instruments {
            registry
                .create(&entry.name, &entry.instrument_type, entry.params.clone())
                .await
                .with_context(|| {
                    format!(
                        "creating instrument '{}' of type '{}'",
                        entry.name, entry.instrument_type
                    )
                })?;
            summary.instruments += 1;
        }

        for entry in &self.scaled {
            let context = || format!("adding scaled variable '{}.{}'", entry.target, entry.name);
            let target = lookup(registry, &entry.target).with_context(context)?;
            let source = lookup(registry, &entry.source).with_context(context)?;
            target
                .add_variable_scaled(
                    &entry.name,
                    &source,
                    &entry.parameter,
                    entry.scale,
                    entry.offset,
                    &entry.units,
                )
                .with_context(context)?;
            summary.scaled += 1;
        }

        for entry in &self.combined {
            let context = || format!("adding combined variable '{}.{}'", entry.target, entry.name);
            let target = lookup(registry, &entry.target).with_context(context)?;
            let terms = entry
                .terms
                .iter()
                .map(|t| Ok(lookup(registry, &t.instrument)?.term(&t.parameter, t.scale, t.offset)))
                .collect::<Result<Vec<_>>>()
                .with_context(context)?;
            target
                .add_variable_combined(&entry.name, terms, &entry.format)
                .with_context(context)?;
            summary.combined += 1;
        }

        Ok(summary)
    }
}

fn lookup(registry: &InstrumentRegistry, name: &str) -> Result<InstrumentHandle> {
    registry.get(name).ok_or_else(|| {
        InstrumentError::InvalidConfig(format!("no instrument named '{}'", name)).into()
    })
}

/// Load and run one plugin file.
pub async fn run_plugin_file(path: &Path, registry: &InstrumentRegistry) -> Result<PluginSummary> {
    let plugin = ShellPlugin::from_file(path)?;
    let span = tracing::info_span!("plugin", path = %path.display());
    let summary = plugin
        .apply(registry)
        .instrument(span)
        .await
        .with_context(|| format!("shell plugin {} failed", path.display()))?;
    tracing::info!(
        path = %path.display(),
        instruments = summary.instruments,
        scaled = summary.scaled,
        combined = summary.combined,
        "ran shell plugin"
    );
    Ok(summary)
}

/// `*.toml` files directly inside `dir`, sorted by file name.
pub fn plugin_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ConfigLoadError::NotFound(dir.display().to_string()).into());
    }
    let mut files = Vec::new();
    let entries = std::fs::read_dir(dir)
        .map_err(|e| ConfigLoadError::ReadError(format!("{}: {}", dir.display(), e)))?;
    for entry in entries {
        let path = entry
            .map_err(|e| ConfigLoadError::ReadError(format!("{}: {}", dir.display(), e)))?
            .path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Run every plugin in `dir` in file-name order, stopping at the first
/// failure.
pub async fn run_plugin_dir(dir: &Path, registry: &InstrumentRegistry) -> Result<Vec<PathBuf>> {
    let files = plugin_files(dir)?;
    if files.is_empty() {
        tracing::warn!(dir = %dir.display(), "no shell plugins found");
    }
    for file in &files {
        run_plugin_file(file, registry).await?;
    }
    Ok(files)
}

/// Run a plugin file, or every plugin in a directory.
pub async fn run_path(path: &Path, registry: &InstrumentRegistry) -> Result<Vec<PathBuf>> {
    if path.is_dir() {
        run_plugin_dir(path, registry).await
    } else {
        run_plugin_file(path, registry).await?;
        Ok(vec![path.to_path_buf()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const MINIMAL: &str = r#"
        [[instruments]]
        name = "dsgen"
        type = "dummy_signal_generator"

        [[instruments]]
        name = "combined"
        type = "virtual_composite"

        [[scaled]]
        target = "combined"
        name = "twice_offset"
        source = "dsgen"
        parameter = "offset"
        scale = 2.0
    "#;

    #[test]
    fn test_parse_defaults() {
        let plugin = ShellPlugin::from_str(MINIMAL).unwrap();
        assert_eq!(plugin.instruments.len(), 2);
        assert_eq!(plugin.instruments[0].params, empty_table());
        assert_eq!(plugin.scaled[0].offset, 0.0);
        assert_eq!(plugin.scaled[0].units, "");
        assert!(plugin.combined.is_empty());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            ShellPlugin::from_str("[[instruments]]\nname = \"x\""),
            Err(ConfigLoadError::ParseError(_))
        ));
        assert!(matches!(
            ShellPlugin::from_str("[[instruments]]\nname = \"\"\ntype = \"example\""),
            Err(ConfigLoadError::ValidationError(_))
        ));
        assert!(matches!(
            ShellPlugin::from_str("[[sensors]]\nname = \"x\""),
            Err(ConfigLoadError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn test_apply() {
        let registry = InstrumentRegistry::with_default_factories();
        let summary = ShellPlugin::from_str(MINIMAL)
            .unwrap()
            .apply(&registry)
            .await
            .unwrap();
        assert_eq!(
            summary,
            PluginSummary {
                instruments: 2,
                scaled: 1,
                combined: 0
            }
        );

        registry.get("dsgen").unwrap().set("offset", 1.5).await.unwrap();
        let value = registry.get("combined").unwrap().get("twice_offset").await.unwrap();
        assert_eq!(value, 3.0);
    }

    #[tokio::test]
    async fn test_apply_stops_at_first_failure() {
        let registry = InstrumentRegistry::with_default_factories();
        let plugin = ShellPlugin::from_str(
            r#"
            [[instruments]]
            name = "dsgen"
            type = "dummy_signal_generator"

            [[instruments]]
            name = "dsgen"
            type = "virtual_composite"

            [[instruments]]
            name = "later"
            type = "virtual_composite"
            "#,
        )
        .unwrap();

        let err = plugin.apply(&registry).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InstrumentError>(),
            Some(InstrumentError::DuplicateName(_))
        ));
        assert_eq!(registry.names(), vec!["dsgen"]);
    }

    #[tokio::test]
    async fn test_missing_target() {
        let registry = InstrumentRegistry::with_default_factories();
        let plugin = ShellPlugin::from_str(
            r#"
            [[scaled]]
            target = "nowhere"
            name = "x"
            source = "nowhere"
            parameter = "p"
            "#,
        )
        .unwrap();
        let err = plugin.apply(&registry).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InstrumentError>(),
            Some(InstrumentError::InvalidConfig(_))
        ));
        let message = format!("{:#}", err);
        assert!(message.contains("adding scaled variable 'nowhere.x'"), "{message}");
        assert!(message.contains("no instrument named 'nowhere'"), "{message}");
    }

    #[tokio::test]
    async fn test_missing_term_instrument() {
        let registry = InstrumentRegistry::with_default_factories();
        let plugin = ShellPlugin::from_str(
            r#"
            [[instruments]]
            name = "combined"
            type = "virtual_composite"

            [[combined]]
            target = "combined"
            name = "sum"
            terms = [{ instrument = "dsgen", parameter = "wave" }]
            "#,
        )
        .unwrap();
        let err = plugin.apply(&registry).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InstrumentError>(),
            Some(InstrumentError::InvalidConfig(_))
        ));
        let message = format!("{:#}", err);
        assert!(message.contains("adding combined variable 'combined.sum'"), "{message}");
        assert!(message.contains("no instrument named 'dsgen'"), "{message}");
        assert!(registry.get("combined").unwrap().variable_names().unwrap().is_empty());
    }
}

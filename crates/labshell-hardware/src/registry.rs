//! Instrument registry.
//!
//! Central hub for instrument lifecycle: factories are registered by type tag,
//! instruments are created by name from a type and a TOML table of
//! construction parameters.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    InstrumentRegistry                     │
//! │  factories: type tag ──► Box<dyn InstrumentFactory>       │
//! │  instruments: name ──► InstrumentHandle                   │
//! ├──────────────────────────────────────────────────────────┤
//! │  example | dummy_signal_generator | virtual_composite ... │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let registry = InstrumentRegistry::with_default_factories();
//! let dmm = registry
//!     .create("dmm1", "example", construction_params([("address", "GPIB::1")]))
//!     .await?;
//! let combined = registry
//!     .create("combined", "virtual_composite", no_params())
//!     .await?;
//! combined.add_variable_scaled("magnet", &dmm, "ch1_output", 0.02, -0.13, "mT")?;
//! ```

use crate::composite::VirtualCompositeFactory;
use crate::handle::InstrumentHandle;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use labshell_core::driver::InstrumentFactory;
use labshell_core::error::{AppResult, DriverError, DriverErrorKind, InstrumentError};
use labshell_core::parameter::ParameterInfo;
use labshell_driver_mock::FactoryRegistry;
use serde::Serialize;

// =============================================================================
// Listing types
// =============================================================================

/// A registered instrument type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeInfo {
    /// Type tag used in `create`.
    pub instrument_type: String,
    /// Human-readable name.
    pub name: String,
}

/// Summary of a registered instrument.
#[derive(Debug, Clone, Serialize)]
pub struct InstrumentInfo {
    /// Registry name.
    pub name: String,
    /// Type tag.
    pub instrument_type: String,
    /// Parameter metadata.
    pub parameters: Vec<ParameterInfo>,
}

/// Build a construction-parameter table from key/value pairs.
pub fn construction_params<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> toml::Value
where
    K: Into<String>,
    V: Into<toml::Value>,
{
    toml::Value::Table(
        pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect(),
    )
}

/// Empty construction-parameter table.
pub fn no_params() -> toml::Value {
    toml::Value::Table(toml::map::Map::new())
}

// =============================================================================
// InstrumentRegistry
// =============================================================================

/// Registry of instrument factories and named instruments.
///
/// `Send + Sync`; share it behind an `Arc`. No map guard is held across an
/// `.await`.
pub struct InstrumentRegistry {
    factories: DashMap<String, Box<dyn InstrumentFactory>>,
    instruments: DashMap<String, InstrumentHandle>,
}

impl InstrumentRegistry {
    /// Create an empty registry with no factories.
    pub fn new() -> Self {
        Self {
            factories: DashMap::new(),
            instruments: DashMap::new(),
        }
    }

    /// Create a registry with `virtual_composite` and the simulated drivers.
    pub fn with_default_factories() -> Self {
        let registry = Self::new();
        registry.register_factory(Box::new(VirtualCompositeFactory));
        labshell_driver_mock::register_all(&registry);
        registry
    }

    /// Register a factory under its type tag, replacing any previous one.
    pub fn register_factory(&self, factory: Box<dyn InstrumentFactory>) {
        let instrument_type = factory.instrument_type().to_string();
        tracing::debug!(instrument_type = %instrument_type, name = factory.name(), "registered factory");
        if self
            .factories
            .insert(instrument_type.clone(), factory)
            .is_some()
        {
            tracing::warn!(instrument_type = %instrument_type, "replaced existing factory");
        }
    }

    /// Registered instrument types, sorted by tag.
    pub fn types(&self) -> Vec<TypeInfo> {
        let mut types: Vec<TypeInfo> = self
            .factories
            .iter()
            .map(|entry| TypeInfo {
                instrument_type: entry.key().clone(),
                name: entry.value().name().to_string(),
            })
            .collect();
        types.sort_by(|a, b| a.instrument_type.cmp(&b.instrument_type));
        types
    }

    /// Construct and register a named instrument.
    ///
    /// # Errors
    /// - [`InstrumentError::DuplicateName`] if `name` is taken
    /// - [`InstrumentError::UnknownType`] if no factory handles `instrument_type`
    /// - [`InstrumentError::InvalidConfig`] if the factory rejects `params`
    /// - [`InstrumentError::Driver`] if building the instance fails
    pub async fn create(
        &self,
        name: &str,
        instrument_type: &str,
        params: toml::Value,
    ) -> AppResult<InstrumentHandle> {
        if name.trim().is_empty() {
            return Err(InstrumentError::InvalidConfig(
                "instrument name must not be empty".into(),
            ));
        }
        if self.instruments.contains_key(name) {
            return Err(InstrumentError::DuplicateName(name.to_string()));
        }
        if !params.is_table() {
            return Err(InstrumentError::InvalidConfig(format!(
                "construction parameters for '{}' must be a table",
                name
            )));
        }

        let build = {
            let factory = self
                .factories
                .get(instrument_type)
                .ok_or_else(|| InstrumentError::UnknownType(instrument_type.to_string()))?;
            factory.validate(&params).map_err(|e| {
                InstrumentError::InvalidConfig(format!("{} ({}): {:#}", name, instrument_type, e))
            })?;
            factory.build(name.to_string(), params)
        };

        let instrument = build.await.map_err(|e| {
            DriverError::new(
                instrument_type,
                DriverErrorKind::Initialization,
                format!("failed to create '{}': {:#}", name, e),
            )
        })?;
        let handle = InstrumentHandle::new(instrument);

        match self.instruments.entry(name.to_string()) {
            Entry::Occupied(_) => Err(InstrumentError::DuplicateName(name.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(handle.clone());
                tracing::info!(instrument = name, instrument_type, "created instrument");
                Ok(handle)
            }
        }
    }

    /// Look up an instrument by name.
    pub fn get(&self, name: &str) -> Option<InstrumentHandle> {
        self.instruments.get(name).map(|entry| entry.value().clone())
    }

    /// Check if an instrument is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.instruments.contains_key(name)
    }

    /// Number of registered instruments.
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    /// Check if the registry holds no instruments.
    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Registered instrument names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.instruments.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Summaries of all instruments, sorted by name.
    pub fn list(&self) -> Vec<InstrumentInfo> {
        self.names()
            .into_iter()
            .filter_map(|name| self.get(&name))
            .map(|handle| InstrumentInfo {
                name: handle.name().to_string(),
                instrument_type: handle.instrument_type().to_string(),
                parameters: handle.parameters(),
            })
            .collect()
    }

    /// Unregister an instrument.
    ///
    /// Composites that already reference it keep their own handle to the
    /// instance.
    pub fn remove(&self, name: &str) -> Option<InstrumentHandle> {
        let removed = self.instruments.remove(name).map(|(_, handle)| handle);
        if removed.is_some() {
            tracing::info!(instrument = name, "removed instrument");
        }
        removed
    }
}

impl Default for InstrumentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FactoryRegistry for InstrumentRegistry {
    fn register_factory(&self, factory: Box<dyn InstrumentFactory>) {
        InstrumentRegistry::register_factory(self, factory);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> toml::Value {
        no_params()
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let registry = InstrumentRegistry::with_default_factories();
        let handle = registry
            .create("dmm1", "example", construction_params([("address", "GPIB::1")]))
            .await
            .unwrap();
        assert_eq!(handle.instrument_type(), "example");
        assert!(registry.contains("dmm1"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("dmm1").unwrap().name(), "dmm1");
        assert!(registry.get("dmm2").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_name() {
        let registry = InstrumentRegistry::with_default_factories();
        registry.create("dsgen", "dummy_signal_generator", empty()).await.unwrap();
        let err = registry
            .create("dsgen", "virtual_composite", empty())
            .await
            .unwrap_err();
        assert!(matches!(err, InstrumentError::DuplicateName(ref n) if n == "dsgen"));
        assert_eq!(registry.get("dsgen").unwrap().instrument_type(), "dummy_signal_generator");
    }

    #[tokio::test]
    async fn test_unknown_type() {
        let registry = InstrumentRegistry::with_default_factories();
        assert!(matches!(
            registry.create("x", "lockin_sr830", empty()).await,
            Err(InstrumentError::UnknownType(_))
        ));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_params() {
        let registry = InstrumentRegistry::with_default_factories();
        assert!(matches!(
            registry.create("dmm1", "example", empty()).await,
            Err(InstrumentError::InvalidConfig(_))
        ));
        assert!(matches!(
            registry.create("dmm1", "example", toml::Value::Integer(3)).await,
            Err(InstrumentError::InvalidConfig(_))
        ));
        assert!(matches!(
            registry.create("", "example", empty()).await,
            Err(InstrumentError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_types_sorted() {
        let registry = InstrumentRegistry::with_default_factories();
        let tags: Vec<String> = registry.types().into_iter().map(|t| t.instrument_type).collect();
        assert_eq!(tags, vec!["dummy_signal_generator", "example", "virtual_composite"]);
        assert!(InstrumentRegistry::new().types().is_empty());
    }

    #[tokio::test]
    async fn test_names_list_remove() {
        let registry = InstrumentRegistry::with_default_factories();
        registry.create("zeta", "virtual_composite", empty()).await.unwrap();
        registry.create("alpha", "dummy_signal_generator", empty()).await.unwrap();
        assert_eq!(registry.names(), vec!["alpha", "zeta"]);

        let list = registry.list();
        assert_eq!(list[0].instrument_type, "dummy_signal_generator");
        assert_eq!(list[0].parameters.len(), 5);
        assert!(list[1].parameters.is_empty());

        assert!(registry.remove("alpha").is_some());
        assert!(registry.remove("alpha").is_none());
        assert_eq!(registry.names(), vec!["zeta"]);
    }
}

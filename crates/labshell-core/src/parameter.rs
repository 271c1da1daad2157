//! Parameter metadata and value storage.
//!
//! Every instrument exposes named scalar parameters. [`ParameterInfo`]
//! describes one of them (access flags, units, limits, display format) and
//! is what the registry hands out for introspection. [`ParameterStore`] is
//! the value table simulated drivers keep behind their parameters.
//!
//! # Example
//!
//! ```rust
//! use labshell_core::parameter::{ParameterInfo, ParameterStore};
//!
//! let mut store = ParameterStore::new("dmm1");
//! store.register(
//!     ParameterInfo::new("ch1_output")
//!         .with_units("V")
//!         .with_range(-10.0, 10.0),
//!     0.0,
//! );
//!
//! store.set("ch1_output", 2.5).unwrap();
//! assert_eq!(store.get("ch1_output").unwrap(), 2.5);
//! assert!(store.set("ch1_output", 11.0).is_err());
//! ```

use crate::error::{AppResult, InstrumentError};
use crate::format::NumberFormat;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whether a parameter can be read, written, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    /// GET | SET
    #[default]
    ReadWrite,
    /// GET only (e.g. a measured value or a combined variable)
    ReadOnly,
    /// SET only (e.g. a trigger command)
    WriteOnly,
}

impl Access {
    /// Parameter supports reads.
    pub fn is_readable(self) -> bool {
        !matches!(self, Access::WriteOnly)
    }

    /// Parameter supports writes.
    pub fn is_writable(self) -> bool {
        !matches!(self, Access::ReadOnly)
    }

    /// Short flag label used in listings ("GET|SET", "GET", "SET").
    pub fn label(self) -> &'static str {
        match self {
            Access::ReadWrite => "GET|SET",
            Access::ReadOnly => "GET",
            Access::WriteOnly => "SET",
        }
    }
}

/// Description of one instrument parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterInfo {
    /// Parameter name, unique within its instrument.
    pub name: String,
    /// Access flags.
    #[serde(default)]
    pub access: Access,
    /// Display unit (e.g. "V", "mT").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    /// Inclusive lower limit for writes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Inclusive upper limit for writes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Display format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<NumberFormat>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParameterInfo {
    /// Create a read/write parameter with no units, limits or format.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            access: Access::ReadWrite,
            units: None,
            min: None,
            max: None,
            format: None,
            description: None,
        }
    }

    /// Mark as read-only.
    pub fn read_only(mut self) -> Self {
        self.access = Access::ReadOnly;
        self
    }

    /// Mark as write-only.
    pub fn write_only(mut self) -> Self {
        self.access = Access::WriteOnly;
        self
    }

    /// Set display units.
    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    /// Set inclusive write limits.
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Set lower write limit only.
    pub fn with_min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    /// Set display format.
    pub fn with_format(mut self, format: NumberFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Set description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Check a candidate value against the finite-ness and range constraints.
    pub fn validate(&self, value: f64) -> AppResult<()> {
        if !value.is_finite() {
            return Err(InstrumentError::InvalidValue(format!(
                "{} must be finite, got {}",
                self.name, value
            )));
        }
        let min = self.min.unwrap_or(f64::NEG_INFINITY);
        let max = self.max.unwrap_or(f64::INFINITY);
        if value < min || value > max {
            return Err(InstrumentError::OutOfRange {
                parameter: self.name.clone(),
                value,
                min,
                max,
            });
        }
        Ok(())
    }

    /// Render a value with this parameter's format and units.
    ///
    /// Without a format the value uses `f64`'s `Display`.
    pub fn display(&self, value: f64) -> String {
        let rendered = match &self.format {
            Some(format) => format.render(value),
            None => value.to_string(),
        };
        match &self.units {
            Some(units) => format!("{} {}", rendered, units),
            None => rendered,
        }
    }
}

/// Named parameter values for one instrument.
///
/// Parameters are kept in name order. Writes are validated against the
/// registered [`ParameterInfo`] before being stored.
#[derive(Debug)]
pub struct ParameterStore {
    instrument: String,
    infos: BTreeMap<String, ParameterInfo>,
    values: RwLock<BTreeMap<String, f64>>,
}

impl ParameterStore {
    /// Create an empty store for the named instrument.
    pub fn new(instrument: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            infos: BTreeMap::new(),
            values: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register a parameter with its initial value.
    pub fn register(&mut self, info: ParameterInfo, initial: f64) {
        self.values.get_mut().insert(info.name.clone(), initial);
        self.infos.insert(info.name.clone(), info);
    }

    /// Name of the owning instrument.
    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// Look up parameter metadata.
    pub fn info(&self, name: &str) -> AppResult<&ParameterInfo> {
        self.infos
            .get(name)
            .ok_or_else(|| InstrumentError::unknown_parameter(&self.instrument, name))
    }

    /// All parameter metadata in name order.
    pub fn infos(&self) -> Vec<ParameterInfo> {
        self.infos.values().cloned().collect()
    }

    /// List parameter names in order.
    pub fn names(&self) -> Vec<&str> {
        self.infos.keys().map(String::as_str).collect()
    }

    /// Read the stored value, honouring access flags.
    pub fn get(&self, name: &str) -> AppResult<f64> {
        let info = self.info(name)?;
        if !info.access.is_readable() {
            return Err(InstrumentError::NotReadable {
                instrument: self.instrument.clone(),
                parameter: name.to_string(),
            });
        }
        Ok(self.raw(name))
    }

    /// Validate and store a value, honouring access flags.
    pub fn set(&self, name: &str, value: f64) -> AppResult<()> {
        let info = self.info(name)?;
        if !info.access.is_writable() {
            return Err(InstrumentError::ReadOnly {
                instrument: self.instrument.clone(),
                parameter: name.to_string(),
            });
        }
        info.validate(value)?;
        self.values.write().insert(name.to_string(), value);
        Ok(())
    }

    /// Stored value regardless of access flags (0.0 if unregistered).
    ///
    /// Drivers use this to update measured read-only values.
    pub fn raw(&self, name: &str) -> f64 {
        self.values.read().get(name).copied().unwrap_or(0.0)
    }

    /// Overwrite a stored value without access or range checks.
    pub fn update(&self, name: &str, value: f64) {
        self.values.write().insert(name.to_string(), value);
    }
}

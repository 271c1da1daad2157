//! Shared handle to a registered instrument.

use labshell_core::capabilities::{DerivedVariables, Instrument, VariableTerm};
use labshell_core::error::{AppResult, InstrumentError};
use labshell_core::format::NumberFormat;
use labshell_core::parameter::ParameterInfo;
use std::sync::Arc;

/// Cheaply clonable reference to an instrument owned by the registry.
///
/// All clones refer to the same instance. Derived-variable registration is
/// only available on composite instruments; on anything else it fails with
/// [`InstrumentError::UnsupportedOperation`].
#[derive(Clone)]
pub struct InstrumentHandle {
    inner: Arc<dyn Instrument>,
}

impl std::fmt::Debug for InstrumentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentHandle")
            .field("name", &self.name())
            .field("type", &self.instrument_type())
            .finish()
    }
}

impl InstrumentHandle {
    /// Wrap an instrument.
    pub fn new(inner: Arc<dyn Instrument>) -> Self {
        Self { inner }
    }

    /// Registry name.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Type tag.
    pub fn instrument_type(&self) -> &str {
        self.inner.instrument_type()
    }

    /// Underlying instrument.
    pub fn instrument(&self) -> Arc<dyn Instrument> {
        Arc::clone(&self.inner)
    }

    /// Parameter metadata.
    pub fn parameters(&self) -> Vec<ParameterInfo> {
        self.inner.parameters()
    }

    /// Metadata for one parameter.
    pub fn parameter(&self, name: &str) -> AppResult<ParameterInfo> {
        self.inner
            .parameter(name)
            .ok_or_else(|| InstrumentError::unknown_parameter(self.name(), name))
    }

    /// True for instruments that accept derived variables.
    pub fn is_composite(&self) -> bool {
        self.inner.as_composite().is_some()
    }

    /// Read a parameter.
    pub async fn get(&self, parameter: &str) -> AppResult<f64> {
        self.inner.get(parameter).await
    }

    /// Write a parameter.
    pub async fn set(&self, parameter: &str, value: f64) -> AppResult<()> {
        self.inner.set(parameter, value).await
    }

    /// Read a parameter and render it with its format and units.
    pub async fn format_value(&self, parameter: &str) -> AppResult<String> {
        let info = self.parameter(parameter)?;
        let value = self.inner.get(parameter).await?;
        Ok(info.display(value))
    }

    /// Build a term reading `parameter` on this instrument.
    pub fn term(&self, parameter: impl Into<String>, scale: f64, offset: f64) -> VariableTerm {
        VariableTerm::new(self.instrument(), parameter, scale, offset)
    }

    fn composite(&self, operation: &str) -> AppResult<&dyn DerivedVariables> {
        self.inner
            .as_composite()
            .ok_or_else(|| InstrumentError::unsupported(self.name(), operation))
    }

    /// Register `name = source.parameter * scale + offset` on this composite.
    ///
    /// An empty `units` string leaves the variable unitless.
    pub fn add_variable_scaled(
        &self,
        name: &str,
        source: &InstrumentHandle,
        parameter: &str,
        scale: f64,
        offset: f64,
        units: &str,
    ) -> AppResult<()> {
        let composite = self.composite("add_variable_scaled")?;
        let units = (!units.is_empty()).then(|| units.to_string());
        composite.add_variable_scaled(name, source.term(parameter, scale, offset), units)
    }

    /// Register a weighted sum of terms on this composite.
    ///
    /// `format` is a printf-style number format such as `%.04f`; an empty
    /// string keeps the default rendering.
    pub fn add_variable_combined(
        &self,
        name: &str,
        terms: Vec<VariableTerm>,
        format: &str,
    ) -> AppResult<()> {
        let composite = self.composite("add_variable_combined")?;
        let format = if format.is_empty() {
            None
        } else {
            Some(NumberFormat::parse(format)?)
        };
        composite.add_variable_combined(name, terms, format)
    }

    /// Names of derived variables on this composite.
    pub fn variable_names(&self) -> AppResult<Vec<String>> {
        Ok(self.composite("variable_names")?.variable_names())
    }
}

//! Instrument capability traits.
//!
//! Every registered instrument implements [`Instrument`]: named scalar
//! parameters that can be listed, read and written. Composite (virtual)
//! instruments additionally implement [`DerivedVariables`], reached through
//! [`Instrument::as_composite`] instead of downcasting.
//!
//! # Design
//!
//! Each trait:
//! - Is async (uses #[async_trait]) where it touches instrument state
//! - Is thread-safe (requires Send + Sync)
//! - Returns [`AppResult`] so callers can match on the error kind

use crate::error::{AppResult, InstrumentError};
use crate::format::NumberFormat;
use crate::parameter::ParameterInfo;
use async_trait::async_trait;
use std::sync::Arc;

// =============================================================================
// Instrument
// =============================================================================

/// A named instrument with scalar parameters.
///
/// # Contract
/// - `name()` is the registry name and never changes
/// - `parameters()` is a snapshot; composites may grow after creation
/// - `get`/`set` fail with [`InstrumentError::UnknownParameter`] for names not
///   listed by `parameters()`
#[async_trait]
pub trait Instrument: Send + Sync {
    /// Registry name (e.g. "dmm1").
    fn name(&self) -> &str;

    /// Type tag the instrument was created with (e.g. "example").
    fn instrument_type(&self) -> &str;

    /// Metadata for all parameters, in a stable order.
    fn parameters(&self) -> Vec<ParameterInfo>;

    /// Metadata for one parameter.
    fn parameter(&self, name: &str) -> Option<ParameterInfo> {
        self.parameters().into_iter().find(|p| p.name == name)
    }

    /// Check that a parameter exists.
    fn has_parameter(&self, name: &str) -> bool {
        self.parameter(name).is_some()
    }

    /// Read a parameter.
    async fn get(&self, parameter: &str) -> AppResult<f64>;

    /// Write a parameter.
    async fn set(&self, parameter: &str, value: f64) -> AppResult<()>;

    /// Composite capability, if this instrument supports derived variables.
    fn as_composite(&self) -> Option<&dyn DerivedVariables> {
        None
    }
}

// =============================================================================
// Derived variables
// =============================================================================

/// One affine term of a derived variable: `source.parameter * scale + offset`.
#[derive(Clone)]
pub struct VariableTerm {
    /// Instrument the raw value is read from.
    pub source: Arc<dyn Instrument>,
    /// Parameter on `source`.
    pub parameter: String,
    /// Multiplicative factor.
    pub scale: f64,
    /// Additive offset.
    pub offset: f64,
}

impl std::fmt::Debug for VariableTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableTerm")
            .field("source", &self.source.name())
            .field("parameter", &self.parameter)
            .field("scale", &self.scale)
            .field("offset", &self.offset)
            .finish()
    }
}

impl VariableTerm {
    /// Create a term.
    pub fn new(
        source: Arc<dyn Instrument>,
        parameter: impl Into<String>,
        scale: f64,
        offset: f64,
    ) -> Self {
        Self {
            source,
            parameter: parameter.into(),
            scale,
            offset,
        }
    }

    /// Check that the source parameter exists and the coefficients are finite.
    pub fn validate(&self) -> AppResult<()> {
        if !self.source.has_parameter(&self.parameter) {
            return Err(InstrumentError::unknown_parameter(
                self.source.name(),
                &self.parameter,
            ));
        }
        if !self.scale.is_finite() || !self.offset.is_finite() {
            return Err(InstrumentError::InvalidConfig(format!(
                "{}.{}: scale and offset must be finite (scale={}, offset={})",
                self.source.name(),
                self.parameter,
                self.scale,
                self.offset
            )));
        }
        Ok(())
    }

    /// Read the source and apply `raw * scale + offset`.
    pub async fn evaluate(&self) -> AppResult<f64> {
        let raw = self.source.get(&self.parameter).await?;
        let value = raw * self.scale + self.offset;
        tracing::trace!(
            source = self.source.name(),
            parameter = %self.parameter,
            raw,
            value,
            "evaluated term"
        );
        Ok(value)
    }

    /// Solve `value = raw * scale + offset` for `raw` and write it to the source.
    pub async fn write_inverse(&self, value: f64) -> AppResult<()> {
        if self.scale == 0.0 {
            return Err(InstrumentError::InvalidValue(format!(
                "cannot invert {}.{} with scale 0",
                self.source.name(),
                self.parameter
            )));
        }
        let raw = (value - self.offset) / self.scale;
        self.source.set(&self.parameter, raw).await
    }
}

/// Capability: derived (virtual) variables.
///
/// Implemented by composite instruments whose readings are computed from
/// parameters of other instruments.
pub trait DerivedVariables: Send + Sync {
    /// Register `name = source.parameter * scale + offset`, tagged with `units`.
    ///
    /// # Errors
    /// - [`InstrumentError::UnknownParameter`] if the source lacks the parameter
    /// - [`InstrumentError::DuplicateName`] if `name` is already a variable
    /// - [`InstrumentError::SelfReference`] if the source is this composite
    fn add_variable_scaled(
        &self,
        name: &str,
        term: VariableTerm,
        units: Option<String>,
    ) -> AppResult<()>;

    /// Register `name = Σ term.source.parameter * term.scale + term.offset`.
    ///
    /// Terms are evaluated in order. Same failure kinds as
    /// [`DerivedVariables::add_variable_scaled`], checked per term, plus
    /// [`InstrumentError::InvalidConfig`] for an empty term list.
    fn add_variable_combined(
        &self,
        name: &str,
        terms: Vec<VariableTerm>,
        format: Option<NumberFormat>,
    ) -> AppResult<()>;

    /// Names of registered derived variables, in registration order.
    fn variable_names(&self) -> Vec<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::ParameterStore;

    struct Fixed {
        store: ParameterStore,
    }

    impl Fixed {
        fn new(value: f64) -> Arc<dyn Instrument> {
            let mut store = ParameterStore::new("fixed");
            store.register(ParameterInfo::new("value"), value);
            Arc::new(Self { store })
        }
    }

    #[async_trait]
    impl Instrument for Fixed {
        fn name(&self) -> &str {
            self.store.instrument()
        }

        fn instrument_type(&self) -> &str {
            "fixed"
        }

        fn parameters(&self) -> Vec<ParameterInfo> {
            self.store.infos()
        }

        async fn get(&self, parameter: &str) -> AppResult<f64> {
            self.store.get(parameter)
        }

        async fn set(&self, parameter: &str, value: f64) -> AppResult<()> {
            self.store.set(parameter, value)
        }
    }

    #[tokio::test]
    async fn test_term_evaluate() {
        let term = VariableTerm::new(Fixed::new(10.0), "value", 0.02, -0.13);
        let value = term.evaluate().await.unwrap();
        assert!((value - 0.07).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_term_write_inverse() {
        let source = Fixed::new(0.0);
        let term = VariableTerm::new(source.clone(), "value", 2.0, 1.0);
        term.write_inverse(5.0).await.unwrap();
        assert_eq!(source.get("value").await.unwrap(), 2.0);

        let flat = VariableTerm::new(source, "value", 0.0, 1.0);
        assert!(matches!(
            flat.write_inverse(5.0).await,
            Err(InstrumentError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_term_validate() {
        let missing = VariableTerm::new(Fixed::new(0.0), "nope", 1.0, 0.0);
        assert!(matches!(
            missing.validate(),
            Err(InstrumentError::UnknownParameter { .. })
        ));

        let infinite = VariableTerm::new(Fixed::new(0.0), "value", f64::INFINITY, 0.0);
        assert!(matches!(
            infinite.validate(),
            Err(InstrumentError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_not_composite_by_default() {
        assert!(Fixed::new(0.0).as_composite().is_none());
    }
}

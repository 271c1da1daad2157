//! Virtual composite instrument.
//!
//! A `virtual_composite` owns no hardware. Its parameters are derived
//! variables, each computed from parameters of other registered instruments:
//!
//! - **scaled**: `source.parameter * scale + offset` (GET|SET, writes invert
//!   the transform and go to the source)
//! - **combined**: `Σ term.source.parameter * term.scale + term.offset`
//!   (GET only)
//!
//! A composite starts empty and grows as variables are added.

use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use labshell_core::capabilities::{DerivedVariables, Instrument, VariableTerm};
use labshell_core::driver::InstrumentFactory;
use labshell_core::error::{AppResult, InstrumentError};
use labshell_core::format::NumberFormat;
use labshell_core::parameter::ParameterInfo;
use parking_lot::RwLock;
use serde::Deserialize;
use std::sync::Arc;

/// Type tag of composite instruments.
pub const COMPOSITE_TYPE: &str = "virtual_composite";

/// A composite takes no construction parameters.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CompositeConfig {}

/// Factory for the `virtual_composite` instrument type.
pub struct VirtualCompositeFactory;

impl InstrumentFactory for VirtualCompositeFactory {
    fn instrument_type(&self) -> &'static str {
        COMPOSITE_TYPE
    }

    fn name(&self) -> &'static str {
        "Virtual Composite Instrument"
    }

    fn validate(&self, config: &toml::Value) -> Result<()> {
        let _: CompositeConfig = config.clone().try_into()?;
        Ok(())
    }

    fn build(
        &self,
        name: String,
        _config: toml::Value,
    ) -> BoxFuture<'static, Result<Arc<dyn Instrument>>> {
        Box::pin(async move {
            let instrument: Arc<dyn Instrument> = Arc::new(VirtualComposite::new(name));
            Ok(instrument)
        })
    }
}

#[derive(Debug, Clone)]
enum Derivation {
    Scaled(VariableTerm),
    Combined(Vec<VariableTerm>),
}

#[derive(Debug, Clone)]
struct DerivedVariable {
    info: ParameterInfo,
    derivation: Derivation,
}

/// Instrument whose parameters are derived from other instruments.
pub struct VirtualComposite {
    name: String,
    variables: RwLock<Vec<DerivedVariable>>,
}

impl std::fmt::Debug for VirtualComposite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualComposite")
            .field("name", &self.name)
            .field("variables", &self.variable_names())
            .finish()
    }
}

impl VirtualComposite {
    /// Create an empty composite.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: RwLock::new(Vec::new()),
        }
    }

    fn derivation(&self, parameter: &str) -> AppResult<Derivation> {
        self.variables
            .read()
            .iter()
            .find(|v| v.info.name == parameter)
            .map(|v| v.derivation.clone())
            .ok_or_else(|| InstrumentError::unknown_parameter(&self.name, parameter))
    }

    fn check_term(&self, variable: &str, term: &VariableTerm) -> AppResult<()> {
        if term.source.name() == self.name {
            return Err(InstrumentError::SelfReference {
                instrument: self.name.clone(),
                variable: variable.to_string(),
            });
        }
        term.validate()
    }

    fn check_name(name: &str) -> AppResult<()> {
        if name.trim().is_empty() {
            return Err(InstrumentError::InvalidConfig(
                "variable name must not be empty".into(),
            ));
        }
        Ok(())
    }

    fn insert(&self, variable: DerivedVariable) -> AppResult<()> {
        let mut variables = self.variables.write();
        if variables.iter().any(|v| v.info.name == variable.info.name) {
            return Err(InstrumentError::DuplicateName(format!(
                "{}.{}",
                self.name, variable.info.name
            )));
        }
        variables.push(variable);
        Ok(())
    }
}

#[async_trait]
impl Instrument for VirtualComposite {
    fn name(&self) -> &str {
        &self.name
    }

    fn instrument_type(&self) -> &str {
        COMPOSITE_TYPE
    }

    fn parameters(&self) -> Vec<ParameterInfo> {
        self.variables.read().iter().map(|v| v.info.clone()).collect()
    }

    async fn get(&self, parameter: &str) -> AppResult<f64> {
        // Cloned out so the lock is released before reading sources.
        match self.derivation(parameter)? {
            Derivation::Scaled(term) => term.evaluate().await,
            Derivation::Combined(terms) => {
                let mut total = 0.0;
                for term in &terms {
                    total += term.evaluate().await?;
                }
                Ok(total)
            }
        }
    }

    async fn set(&self, parameter: &str, value: f64) -> AppResult<()> {
        match self.derivation(parameter)? {
            Derivation::Scaled(term) => {
                if !value.is_finite() {
                    return Err(InstrumentError::InvalidValue(format!(
                        "{} must be finite, got {}",
                        parameter, value
                    )));
                }
                term.write_inverse(value).await
            }
            Derivation::Combined(_) => Err(InstrumentError::ReadOnly {
                instrument: self.name.clone(),
                parameter: parameter.to_string(),
            }),
        }
    }

    fn as_composite(&self) -> Option<&dyn DerivedVariables> {
        Some(self)
    }
}

impl DerivedVariables for VirtualComposite {
    fn add_variable_scaled(
        &self,
        name: &str,
        term: VariableTerm,
        units: Option<String>,
    ) -> AppResult<()> {
        Self::check_name(name)?;
        self.check_term(name, &term)?;

        let mut info = ParameterInfo::new(name).with_description(format!(
            "{}.{} * {} + {}",
            term.source.name(),
            term.parameter,
            term.scale,
            term.offset
        ));
        info.units = units;

        let summary = info.description.clone().unwrap_or_default();
        self.insert(DerivedVariable {
            info,
            derivation: Derivation::Scaled(term),
        })?;
        tracing::info!(composite = %self.name, variable = name, %summary, "added scaled variable");
        Ok(())
    }

    fn add_variable_combined(
        &self,
        name: &str,
        terms: Vec<VariableTerm>,
        format: Option<NumberFormat>,
    ) -> AppResult<()> {
        Self::check_name(name)?;
        if terms.is_empty() {
            return Err(InstrumentError::InvalidConfig(format!(
                "combined variable '{}' needs at least one term",
                name
            )));
        }
        for term in &terms {
            self.check_term(name, term)?;
        }

        let description = terms
            .iter()
            .map(|t| format!("{}.{} * {} + {}", t.source.name(), t.parameter, t.scale, t.offset))
            .collect::<Vec<_>>()
            .join(" + ");
        let mut info = ParameterInfo::new(name)
            .read_only()
            .with_description(description);
        info.format = format;

        let count = terms.len();
        self.insert(DerivedVariable {
            info,
            derivation: Derivation::Combined(terms),
        })?;
        tracing::info!(
            composite = %self.name,
            variable = name,
            terms = count,
            "added combined variable"
        );
        Ok(())
    }

    fn variable_names(&self) -> Vec<String> {
        self.variables
            .read()
            .iter()
            .map(|v| v.info.name.clone())
            .collect()
    }
}

//! Simulated `example` instrument: a GPIB multimeter/source.
//!
//! Mirrors the classic example driver shipped with instrument shells:
//! an addressable box with two plain values, four output channels and a
//! gain/status register. Outputs read back what was written; `value1` and
//! `value2` carry optional reading noise.
//!
//! # Construction parameters
//!
//! ```toml
//! address = "GPIB::1"   # required
//! reset = false         # zero all registers on creation
//! noise = 0.0           # reading noise amplitude on value1/value2
//! seed = 42             # optional RNG seed
//! mode = "instant"      # or "realistic"
//! fail_rate = 0.0       # probability that any get/set fails
//! fail_after = 10       # every get after the 10th fails
//! ```

use crate::common::{ErrorConfig, ErrorScenario, MockMode, MockRng};
use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use labshell_core::capabilities::Instrument;
use labshell_core::driver::InstrumentFactory;
use labshell_core::error::AppResult;
use labshell_core::format::NumberFormat;
use labshell_core::parameter::{ParameterInfo, ParameterStore};
use serde::Deserialize;
use std::sync::Arc;

const DRIVER_TYPE: &str = "example";

/// Number of output channels (`ch1_output` .. `ch4_output`).
pub const OUTPUT_CHANNELS: usize = 4;

// =============================================================================
// ExampleFactory - InstrumentFactory implementation
// =============================================================================

/// Construction parameters for [`Example`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExampleConfig {
    /// Bus address, e.g. "GPIB::1".
    pub address: String,
    /// Zero all registers on creation.
    #[serde(default)]
    pub reset: bool,
    /// Noise amplitude applied to `value1`/`value2` readings.
    #[serde(default)]
    pub noise: f64,
    /// RNG seed for reproducible noise.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Timing mode.
    #[serde(default)]
    pub mode: MockMode,
    /// Injected random failure probability per operation.
    #[serde(default)]
    pub fail_rate: f64,
    /// Number of successful reads before every read fails.
    #[serde(default)]
    pub fail_after: Option<u32>,
}

impl ExampleConfig {
    fn check(&self) -> Result<()> {
        anyhow::ensure!(
            !self.address.trim().is_empty(),
            "address must not be empty"
        );
        anyhow::ensure!(
            self.noise.is_finite() && self.noise >= 0.0,
            "noise must be a non-negative number, got {}",
            self.noise
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.fail_rate),
            "fail_rate must be within 0..=1, got {}",
            self.fail_rate
        );
        Ok(())
    }

    /// Error injection described by `fail_rate` and `fail_after`.
    pub fn error_config(&self) -> ErrorConfig {
        let config = ErrorConfig::random_failures_seeded(self.fail_rate, self.seed);
        match self.fail_after {
            Some(count) => config.with_scenario(ErrorScenario::FailAfterN {
                operation: "get",
                count,
            }),
            None => config,
        }
    }
}

/// Factory for the `example` instrument type.
pub struct ExampleFactory;

impl InstrumentFactory for ExampleFactory {
    fn instrument_type(&self) -> &'static str {
        DRIVER_TYPE
    }

    fn name(&self) -> &'static str {
        "Example GPIB Multimeter"
    }

    fn validate(&self, config: &toml::Value) -> Result<()> {
        let cfg: ExampleConfig = config.clone().try_into()?;
        cfg.check()
    }

    fn build(
        &self,
        name: String,
        config: toml::Value,
    ) -> BoxFuture<'static, Result<Arc<dyn Instrument>>> {
        Box::pin(async move {
            let cfg: ExampleConfig = config.try_into()?;
            cfg.check()?;
            let instrument: Arc<dyn Instrument> = Arc::new(Example::new(name, cfg));
            Ok(instrument)
        })
    }
}

// =============================================================================
// Example - simulated instrument
// =============================================================================

/// Simulated `example` instrument.
pub struct Example {
    address: String,
    params: ParameterStore,
    noise: f64,
    rng: MockRng,
    mode: MockMode,
    error_config: ErrorConfig,
}

impl Example {
    /// Create an instrument from validated construction parameters.
    pub fn new(name: impl Into<String>, config: ExampleConfig) -> Self {
        let name = name.into();
        let mut params = ParameterStore::new(name.clone());

        // A fresh simulated box powers up with value1/value2 at 1.0 unless reset.
        let initial = if config.reset { 0.0 } else { 1.0 };
        params.register(
            ParameterInfo::new("value1")
                .with_units("V")
                .with_description("Plain register 1"),
            initial,
        );
        params.register(
            ParameterInfo::new("value2")
                .with_units("V")
                .with_description("Plain register 2"),
            initial,
        );

        let output_format = NumberFormat::parse("%.3f").ok();
        for ch in 1..=OUTPUT_CHANNELS {
            let mut info = ParameterInfo::new(format!("ch{}_output", ch))
                .with_units("V")
                .with_range(-10.0, 10.0)
                .with_description(format!("Output voltage of channel {}", ch));
            info.format = output_format.clone();
            params.register(info, 0.0);
        }

        params.register(
            ParameterInfo::new("gain")
                .with_range(1.0, 1000.0)
                .with_description("Input amplifier gain"),
            1.0,
        );
        params.register(
            ParameterInfo::new("status")
                .with_range(0.0, 1.0)
                .with_description("0 = off, 1 = on"),
            0.0,
        );

        tracing::debug!(
            instrument = %name,
            address = %config.address,
            reset = config.reset,
            "created example instrument"
        );

        let error_config = config.error_config();
        Self {
            address: config.address,
            params,
            noise: config.noise,
            rng: MockRng::new(config.seed),
            mode: config.mode,
            error_config,
        }
    }

    /// Attach an error injection configuration.
    pub fn with_error_config(mut self, error_config: ErrorConfig) -> Self {
        self.error_config = error_config;
        self
    }

    /// Bus address given at construction.
    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl Instrument for Example {
    fn name(&self) -> &str {
        self.params.instrument()
    }

    fn instrument_type(&self) -> &str {
        DRIVER_TYPE
    }

    fn parameters(&self) -> Vec<ParameterInfo> {
        self.params.infos()
    }

    async fn get(&self, parameter: &str) -> AppResult<f64> {
        self.error_config.check_operation(DRIVER_TYPE, "get")?;
        self.mode.simulate_access().await;

        let value = self.params.get(parameter)?;
        match parameter {
            "value1" | "value2" => Ok(value + self.rng.noise(self.noise)),
            "status" => Ok(value.round()),
            _ => Ok(value),
        }
    }

    async fn set(&self, parameter: &str, value: f64) -> AppResult<()> {
        self.error_config.check_operation(DRIVER_TYPE, "set")?;
        self.mode.simulate_access().await;

        self.params.set(parameter, value)?;
        tracing::trace!(instrument = self.name(), parameter, value, "set");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labshell_core::error::InstrumentError;

    fn config(address: &str) -> ExampleConfig {
        ExampleConfig {
            address: address.into(),
            reset: false,
            noise: 0.0,
            seed: Some(1),
            mode: MockMode::Instant,
            fail_rate: 0.0,
            fail_after: None,
        }
    }

    #[tokio::test]
    async fn test_outputs_read_back() {
        let dmm = Example::new("dmm1", config("GPIB::1"));
        dmm.set("ch1_output", 3.5).await.unwrap();
        assert_eq!(dmm.get("ch1_output").await.unwrap(), 3.5);
        assert_eq!(dmm.get("ch2_output").await.unwrap(), 0.0);
        assert_eq!(dmm.address(), "GPIB::1");
    }

    #[tokio::test]
    async fn test_output_range() {
        let dmm = Example::new("dmm1", config("GPIB::1"));
        assert!(matches!(
            dmm.set("ch3_output", 12.0).await,
            Err(InstrumentError::OutOfRange { .. })
        ));
    }

    #[tokio::test]
    async fn test_reset_zeroes_registers() {
        let mut cfg = config("GPIB::2");
        cfg.reset = true;
        let dmm = Example::new("dmm2", cfg);
        assert_eq!(dmm.get("value1").await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_noise_bounded() {
        let mut cfg = config("GPIB::1");
        cfg.noise = 0.01;
        let dmm = Example::new("dmm1", cfg);
        for _ in 0..50 {
            let v = dmm.get("value1").await.unwrap();
            assert!((v - 1.0).abs() <= 0.01);
        }
    }

    #[tokio::test]
    async fn test_injected_error_propagates() {
        let dmm = Example::new("dmm1", config("GPIB::1")).with_error_config(
            ErrorConfig::scenario(crate::common::ErrorScenario::Timeout { operation: "get" }),
        );
        assert!(matches!(
            dmm.get("ch1_output").await,
            Err(InstrumentError::Driver(_))
        ));
    }

    #[test]
    fn test_factory_validate() {
        let factory = ExampleFactory;
        let ok: toml::Value = toml::from_str("address = 'GPIB::1'").unwrap();
        assert!(factory.validate(&ok).is_ok());

        let missing = toml::Value::Table(toml::map::Map::new());
        assert!(factory.validate(&missing).is_err());

        let empty: toml::Value = toml::from_str("address = ''").unwrap();
        assert!(factory.validate(&empty).is_err());

        let unknown: toml::Value = toml::from_str("address = 'x'\nbaud = 9600").unwrap();
        assert!(factory.validate(&unknown).is_err());

        let rate: toml::Value = toml::from_str("address = 'x'\nfail_rate = 1.5").unwrap();
        assert!(factory.validate(&rate).is_err());
    }

    #[tokio::test]
    async fn test_factory_build() {
        let cfg: toml::Value = toml::from_str("address = 'GPIB::1'").unwrap();
        let instrument = ExampleFactory.build("dmm1".into(), cfg).await.unwrap();
        assert_eq!(instrument.name(), "dmm1");
        assert_eq!(instrument.instrument_type(), "example");
        assert!(instrument.has_parameter("ch4_output"));
        assert_eq!(
            instrument.parameter("ch1_output").unwrap().units.as_deref(),
            Some("V")
        );
    }
}

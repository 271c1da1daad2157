//! Simulated `dummy_signal_generator`.
//!
//! Produces `wave = amplitude * sin(2π·frequency·t + phase) + offset`, where
//! `t` is the time in seconds since the instrument was created. Takes no
//! construction parameters apart from optional initial settings:
//!
//! ```toml
//! amplitude = 1.0
//! frequency = 1.0
//! offset = 0.0
//! phase = 0.0
//! ```

use crate::common::MockMode;
use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use labshell_core::capabilities::Instrument;
use labshell_core::driver::InstrumentFactory;
use labshell_core::error::AppResult;
use labshell_core::parameter::{ParameterInfo, ParameterStore};
use serde::Deserialize;
use std::f64::consts::TAU;
use std::sync::Arc;
use std::time::Instant;

const DRIVER_TYPE: &str = "dummy_signal_generator";

/// Initial settings for [`DummySignalGenerator`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SignalGeneratorConfig {
    /// Peak amplitude (V).
    pub amplitude: f64,
    /// Frequency (Hz).
    pub frequency: f64,
    /// DC offset (V).
    pub offset: f64,
    /// Phase (rad).
    pub phase: f64,
    /// Timing mode.
    pub mode: MockMode,
}

impl Default for SignalGeneratorConfig {
    fn default() -> Self {
        Self {
            amplitude: 1.0,
            frequency: 1.0,
            offset: 0.0,
            phase: 0.0,
            mode: MockMode::Instant,
        }
    }
}

/// Factory for the `dummy_signal_generator` instrument type.
pub struct SignalGeneratorFactory;

impl InstrumentFactory for SignalGeneratorFactory {
    fn instrument_type(&self) -> &'static str {
        DRIVER_TYPE
    }

    fn name(&self) -> &'static str {
        "Dummy Signal Generator"
    }

    fn validate(&self, config: &toml::Value) -> Result<()> {
        let cfg: SignalGeneratorConfig = config.clone().try_into()?;
        DummySignalGenerator::try_new("validate", cfg)?;
        Ok(())
    }

    fn build(
        &self,
        name: String,
        config: toml::Value,
    ) -> BoxFuture<'static, Result<Arc<dyn Instrument>>> {
        Box::pin(async move {
            let cfg: SignalGeneratorConfig = config.try_into()?;
            let instrument: Arc<dyn Instrument> =
                Arc::new(DummySignalGenerator::try_new(name, cfg)?);
            Ok(instrument)
        })
    }
}

/// Simulated sine-wave generator.
pub struct DummySignalGenerator {
    params: ParameterStore,
    started: Instant,
    mode: MockMode,
}

impl DummySignalGenerator {
    /// Create a generator with default settings (1 V, 1 Hz, no offset).
    pub fn new(name: impl Into<String>) -> Self {
        let mut params = ParameterStore::new(name);
        Self::register_parameters(&mut params, &SignalGeneratorConfig::default());
        Self {
            params,
            started: Instant::now(),
            mode: MockMode::Instant,
        }
    }

    /// Create a generator with initial settings, validating them against the
    /// parameter limits.
    pub fn try_new(name: impl Into<String>, config: SignalGeneratorConfig) -> AppResult<Self> {
        let generator = Self {
            mode: config.mode,
            ..Self::new(name)
        };
        generator.params.set("amplitude", config.amplitude)?;
        generator.params.set("frequency", config.frequency)?;
        generator.params.set("offset", config.offset)?;
        generator.params.set("phase", config.phase)?;
        Ok(generator)
    }

    fn register_parameters(params: &mut ParameterStore, cfg: &SignalGeneratorConfig) {
        params.register(
            ParameterInfo::new("amplitude")
                .with_units("V")
                .with_min(0.0),
            cfg.amplitude,
        );
        params.register(
            ParameterInfo::new("frequency")
                .with_units("Hz")
                .with_min(0.0),
            cfg.frequency,
        );
        params.register(ParameterInfo::new("offset").with_units("V"), cfg.offset);
        params.register(ParameterInfo::new("phase").with_units("rad"), cfg.phase);
        params.register(
            ParameterInfo::new("wave")
                .read_only()
                .with_units("V")
                .with_description("amplitude * sin(2π·frequency·t + phase) + offset"),
            cfg.offset,
        );
    }

    /// Evaluate the waveform `elapsed` seconds after creation.
    pub fn wave_at(&self, elapsed: f64) -> f64 {
        let amplitude = self.params.raw("amplitude");
        let frequency = self.params.raw("frequency");
        let offset = self.params.raw("offset");
        let phase = self.params.raw("phase");
        amplitude * (TAU * frequency * elapsed + phase).sin() + offset
    }
}

#[async_trait]
impl Instrument for DummySignalGenerator {
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
        self.mode.simulate_access().await;
        if parameter == "wave" {
            let value = self.wave_at(self.started.elapsed().as_secs_f64());
            self.params.update("wave", value);
            return Ok(value);
        }
        self.params.get(parameter)
    }

    async fn set(&self, parameter: &str, value: f64) -> AppResult<()> {
        self.mode.simulate_access().await;
        self.params.set(parameter, value)
    }
}

//! Simulated instruments for labshell.
//!
//! Lets shell plugins run without lab hardware. All simulated instruments use
//! async-safe operations (tokio::time::sleep, not std::thread::sleep).
//!
//! # Available instrument types
//!
//! - [`Example`] (`example`) - addressable multimeter/source with four output channels
//! - [`DummySignalGenerator`] (`dummy_signal_generator`) - sine wave source
//!
//! # Factory Pattern
//!
//! Each instrument type provides an `InstrumentFactory` for the registry:
//!
//! ```rust,ignore
//! use labshell_driver_mock::{ExampleFactory, SignalGeneratorFactory};
//! use labshell_hardware::InstrumentRegistry;
//!
//! let registry = InstrumentRegistry::new();
//! registry.register_factory(Box::new(ExampleFactory));
//! registry.register_factory(Box::new(SignalGeneratorFactory));
//! ```

pub mod common;
mod example;
mod signal_generator;

pub use common::{ErrorConfig, ErrorScenario, MockMode, MockRng};
pub use example::{Example, ExampleConfig, ExampleFactory, OUTPUT_CHANNELS};
pub use signal_generator::{DummySignalGenerator, SignalGeneratorConfig, SignalGeneratorFactory};

/// Register every simulated instrument factory with a registry.
pub fn register_all(registry: &impl FactoryRegistry) {
    registry.register_factory(Box::new(ExampleFactory));
    registry.register_factory(Box::new(SignalGeneratorFactory));
}

/// Registries that accept instrument factories.
///
/// Keeps this crate independent of the registry implementation.
pub trait FactoryRegistry {
    /// Register an instrument factory.
    fn register_factory(&self, factory: Box<dyn labshell_core::driver::InstrumentFactory>);
}

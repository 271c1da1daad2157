//! Instrument Factory
//!
//! Instrument types are provided by factories implementing
//! [`InstrumentFactory`]. They are registered with the instrument registry
//! at startup via explicit `registry.register_factory(factory)` calls, and
//! the registry dispatches `create(name, type, params)` to the factory whose
//! [`InstrumentFactory::instrument_type`] matches.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Composition Root (main.rs)                  │
//! │  registry.register_factory(Box::new(ExampleFactory));           │
//! │  registry.register_factory(Box::new(VirtualCompositeFactory));  │
//! └─────────────────────────────────────────────────────────────────┘
//!                                   │
//!                                   ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      InstrumentRegistry                         │
//! │  factories:   DashMap<type, Box<dyn InstrumentFactory>>         │
//! │  instruments: DashMap<name, InstrumentHandle>                   │
//! └─────────────────────────────────────────────────────────────────┘
//!                                   │
//!                                   ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 InstrumentFactory::build()                      │
//! │  Parses TOML params, instantiates the instrument                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example: Implementing a Factory
//!
//! ```rust,ignore
//! use labshell_core::driver::InstrumentFactory;
//!
//! pub struct ExampleFactory;
//!
//! impl InstrumentFactory for ExampleFactory {
//!     fn instrument_type(&self) -> &'static str { "example" }
//!     fn name(&self) -> &'static str { "Example Multimeter" }
//!
//!     fn validate(&self, config: &toml::Value) -> anyhow::Result<()> {
//!         let cfg: ExampleConfig = config.clone().try_into()?;
//!         anyhow::ensure!(!cfg.address.is_empty(), "address must not be empty");
//!         Ok(())
//!     }
//!
//!     fn build(&self, name: String, config: toml::Value)
//!         -> BoxFuture<'static, anyhow::Result<Arc<dyn Instrument>>>
//!     {
//!         Box::pin(async move {
//!             let cfg: ExampleConfig = config.try_into()?;
//!             Ok(Arc::new(Example::new(name, cfg)) as Arc<dyn Instrument>)
//!         })
//!     }
//! }
//! ```

use crate::capabilities::Instrument;
use anyhow::Result;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Trait for factories that create instrument instances.
///
/// # Lifetime
///
/// Factories are registered once and live for the registry's lifetime.
/// They must be `Send + Sync + 'static` because they may be called from any task.
///
/// # Error Handling
///
/// `validate()` reports malformed construction parameters; the registry
/// surfaces these as `InstrumentError::InvalidConfig`. `build()` failures
/// become `InstrumentError::Driver`.
pub trait InstrumentFactory: Send + Sync + 'static {
    /// Type tag used by `create(name, type, ...)`, e.g. "example".
    fn instrument_type(&self) -> &'static str;

    /// Human-readable name for listings and error messages.
    fn name(&self) -> &'static str;

    /// Validate construction parameters without instantiating.
    ///
    /// `config` is always a TOML table (empty when no parameters were given).
    fn validate(&self, config: &toml::Value) -> Result<()>;

    /// Instantiate the instrument under `name`.
    fn build(&self, name: String, config: toml::Value)
        -> BoxFuture<'static, Result<Arc<dyn Instrument>>>;
}

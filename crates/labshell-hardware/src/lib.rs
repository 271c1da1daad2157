//! Instrument registry and virtual composite instruments.
//!
//! - [`registry`]: [`InstrumentRegistry`], creating named instruments through
//!   registered factories
//! - [`handle`]: [`InstrumentHandle`], the shared reference callers hold
//! - [`composite`]: [`VirtualComposite`], an instrument whose parameters are
//!   derived from other instruments

pub mod composite;
pub mod handle;
pub mod registry;

pub use composite::{VirtualComposite, VirtualCompositeFactory, COMPOSITE_TYPE};
pub use handle::InstrumentHandle;
pub use registry::{
    construction_params, no_params, InstrumentInfo, InstrumentRegistry, TypeInfo,
};

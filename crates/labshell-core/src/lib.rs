//! Core types and traits for labshell.
//!
//! - [`capabilities`]: the [`Instrument`](capabilities::Instrument) trait and the
//!   [`DerivedVariables`](capabilities::DerivedVariables) composite capability
//! - [`driver`]: [`InstrumentFactory`](driver::InstrumentFactory), the plugin API
//!   instrument types implement
//! - [`error`]: [`InstrumentError`](error::InstrumentError) taxonomy
//! - [`format`]: printf-style [`NumberFormat`](format::NumberFormat)
//! - [`parameter`]: parameter metadata and value storage

pub mod capabilities;
pub mod driver;
pub mod error;
pub mod format;
pub mod parameter;

pub use capabilities::{DerivedVariables, Instrument, VariableTerm};
pub use driver::InstrumentFactory;
pub use error::{AppResult, DriverError, DriverErrorKind, InstrumentError};
pub use format::NumberFormat;
pub use parameter::{Access, ParameterInfo, ParameterStore};

//! Error types shared by every labshell crate.
//!
//! `InstrumentError` is the error taxonomy of the instrument registry and of
//! every instrument reachable through it. Library code returns
//! [`AppResult`]; the application edge (plugin loader, CLI) wraps these in
//! `anyhow` with context.
//!
//! ## Error Hierarchy
//!
//! - **Registry errors**: `DuplicateName`, `UnknownType`
//! - **Capability errors**: `UnsupportedOperation` (e.g. adding a derived
//!   variable to an instrument that is not a composite)
//! - **Parameter errors**: `UnknownParameter`, `ReadOnly`, `NotReadable`,
//!   `OutOfRange`, `InvalidValue`
//! - **Definition errors**: `InvalidConfig`, `InvalidFormat`, `SelfReference`
//! - **Driver errors**: `Driver`, a structured [`DriverError`] carrying the
//!   instrument type and a [`DriverErrorKind`]

use thiserror::Error;

// =============================================================================
// Driver Errors
// =============================================================================

/// Category of a driver failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// Instrument could not be constructed.
    Initialization,
    /// Construction parameters were rejected by the driver.
    Configuration,
    /// The (simulated) bus failed.
    Communication,
    /// The device reported a fault.
    Hardware,
    /// The operation did not complete in time.
    Timeout,
    /// Anything else.
    Unknown,
}

impl std::fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DriverErrorKind::Initialization => "initialization",
            DriverErrorKind::Configuration => "configuration",
            DriverErrorKind::Communication => "communication",
            DriverErrorKind::Hardware => "hardware",
            DriverErrorKind::Timeout => "timeout",
            DriverErrorKind::Unknown => "unknown",
        };
        write!(f, "{}", label)
    }
}

/// Structured error raised by an instrument driver.
#[derive(Error, Debug, Clone)]
#[error("Driver '{driver_type}' {kind} error: {message}")]
pub struct DriverError {
    /// Instrument type tag of the failing driver (e.g. "example").
    pub driver_type: String,
    /// Failure category.
    pub kind: DriverErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl DriverError {
    /// Create a driver error.
    pub fn new(
        driver_type: impl Into<String>,
        kind: DriverErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            driver_type: driver_type.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Convenience alias for results using the instrument error type.
pub type AppResult<T> = std::result::Result<T, InstrumentError>;

/// Primary error type for instrument creation, access and composition.
///
/// # Example
///
/// ```rust
/// use labshell_core::error::InstrumentError;
///
/// let err = InstrumentError::UnknownType("oscilloscope".into());
/// assert_eq!(err.to_string(), "Unknown instrument type 'oscilloscope'");
/// ```
#[derive(Error, Debug, Clone)]
pub enum InstrumentError {
    /// A name is already registered.
    ///
    /// Raised by the registry when creating an instrument whose name is in
    /// use, and by composites when a derived variable name is reused.
    #[error("Name '{0}' is already in use")]
    DuplicateName(String),

    /// No factory is registered for the requested instrument type.
    #[error("Unknown instrument type '{0}'")]
    UnknownType(String),

    /// The instrument does not implement the requested capability.
    #[error("Instrument '{instrument}' does not support {operation}")]
    UnsupportedOperation {
        /// Instrument name.
        instrument: String,
        /// Operation that was attempted (e.g. "add_variable_scaled").
        operation: String,
    },

    /// The named parameter does not exist on the instrument.
    #[error("Instrument '{instrument}' has no parameter '{parameter}'")]
    UnknownParameter {
        /// Instrument name.
        instrument: String,
        /// Requested parameter.
        parameter: String,
    },

    /// Attempted to write a parameter that only supports reads.
    #[error("Parameter '{instrument}.{parameter}' is read-only")]
    ReadOnly {
        /// Instrument name.
        instrument: String,
        /// Parameter name.
        parameter: String,
    },

    /// Attempted to read a parameter that only supports writes.
    #[error("Parameter '{instrument}.{parameter}' cannot be read")]
    NotReadable {
        /// Instrument name.
        instrument: String,
        /// Parameter name.
        parameter: String,
    },

    /// Value lies outside the parameter's declared limits.
    #[error("Value {value} for '{parameter}' is outside [{min}, {max}]")]
    OutOfRange {
        /// Parameter name.
        parameter: String,
        /// Rejected value.
        value: f64,
        /// Lower limit (or -inf).
        min: f64,
        /// Upper limit (or +inf).
        max: f64,
    },

    /// Value is not acceptable (NaN, infinite, or cannot be inverted).
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Construction parameters or a derived variable definition are malformed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A printf-style number format could not be parsed.
    #[error("Invalid number format '{format}': {reason}")]
    InvalidFormat {
        /// The offending format string.
        format: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A composite was asked to derive a variable from itself.
    #[error("Composite '{instrument}' cannot use itself as source of '{variable}'")]
    SelfReference {
        /// Composite instrument name.
        instrument: String,
        /// Derived variable name.
        variable: String,
    },

    /// Structured driver failure.
    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl InstrumentError {
    /// Shorthand for [`InstrumentError::UnknownParameter`].
    pub fn unknown_parameter(instrument: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self::UnknownParameter {
            instrument: instrument.into(),
            parameter: parameter.into(),
        }
    }

    /// Shorthand for [`InstrumentError::UnsupportedOperation`].
    pub fn unsupported(instrument: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            instrument: instrument.into(),
            operation: operation.into(),
        }
    }
}

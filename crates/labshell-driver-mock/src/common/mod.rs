//! Shared infrastructure for simulated instruments.
//!
//! - **mode**: timing behaviour (Instant, Realistic)
//! - **errors**: error injection for resilience tests
//! - **rng**: seeded random number generator for reading noise

pub mod errors;
pub mod mode;
pub mod rng;

pub use errors::{ErrorConfig, ErrorScenario};
pub use mode::MockMode;
pub use rng::MockRng;

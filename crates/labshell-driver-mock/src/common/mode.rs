//! Timing modes for simulated instruments.
//!
//! - **Instant**: no delays, for unit tests
//! - **Realistic**: bus-like latency on every parameter access

use serde::Deserialize;
use std::time::Duration;

/// Timing mode of a simulated instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MockMode {
    /// Zero delays, deterministic
    #[default]
    Instant,
    /// GPIB-like round trip on each access
    Realistic,
}

impl MockMode {
    /// Delay applied to a single parameter access.
    pub fn access_latency(self) -> Duration {
        match self {
            MockMode::Instant => Duration::ZERO,
            MockMode::Realistic => Duration::from_millis(5),
        }
    }

    /// Sleep for one access (no-op in Instant mode).
    pub async fn simulate_access(self) {
        let latency = self.access_latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

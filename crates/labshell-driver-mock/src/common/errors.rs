//! Error injection for simulated instruments.
//!
//! Lets tests exercise how failures from a source instrument propagate
//! through the registry and through composite variables.

use super::rng::MockRng;
use labshell_core::error::{DriverError, DriverErrorKind};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// A deterministic failure scenario.
#[derive(Debug, Clone)]
pub enum ErrorScenario {
    /// Fail every `operation` call after `count` successful ones.
    FailAfterN {
        /// Operation label ("get" or "set").
        operation: &'static str,
        /// Number of calls that succeed first.
        count: u32,
    },
    /// Every `operation` call times out.
    Timeout {
        /// Operation label.
        operation: &'static str,
    },
    /// The bus drops once; the next call of any operation fails.
    CommunicationLoss,
}

/// Error injection configuration.
#[derive(Clone, Debug)]
pub struct ErrorConfig {
    failure_rate: f64,
    scenarios: Arc<Vec<ErrorScenario>>,
    rng: Arc<MockRng>,
    state: Arc<Mutex<ErrorState>>,
}

#[derive(Default, Debug)]
struct ErrorState {
    operation_counts: HashMap<&'static str, u32>,
    communication_lost: bool,
}

impl ErrorConfig {
    /// No injected errors.
    pub fn none() -> Self {
        Self {
            failure_rate: 0.0,
            scenarios: Arc::new(Vec::new()),
            rng: Arc::new(MockRng::new(None)),
            state: Arc::new(Mutex::new(ErrorState::default())),
        }
    }

    /// Uniform random failures on every operation.
    pub fn random_failures_seeded(rate: f64, seed: Option<u64>) -> Self {
        Self {
            failure_rate: rate,
            rng: Arc::new(MockRng::new(seed)),
            ..Self::none()
        }
    }

    /// A single deterministic scenario.
    pub fn scenario(scenario: ErrorScenario) -> Self {
        Self {
            scenarios: Arc::new(vec![scenario]),
            ..Self::none()
        }
    }

    /// Add a deterministic scenario.
    pub fn with_scenario(mut self, scenario: ErrorScenario) -> Self {
        Arc::make_mut(&mut self.scenarios).push(scenario);
        self
    }

    /// Check whether `operation` on `driver_type` should fail now.
    pub fn check_operation(
        &self,
        driver_type: &str,
        operation: &'static str,
    ) -> Result<(), DriverError> {
        let mut state = self.state.lock();

        for scenario in self.scenarios.iter() {
            match scenario {
                ErrorScenario::FailAfterN {
                    operation: op,
                    count,
                } if *op == operation => {
                    let current = state.operation_counts.entry(operation).or_insert(0);
                    *current += 1;
                    if *current > *count {
                        return Err(DriverError::new(
                            driver_type,
                            DriverErrorKind::Hardware,
                            format!("Injected failure after {} operations", count),
                        ));
                    }
                }
                ErrorScenario::Timeout { operation: op } if *op == operation => {
                    return Err(DriverError::new(
                        driver_type,
                        DriverErrorKind::Timeout,
                        format!("Operation '{}' timed out", operation),
                    ));
                }
                ErrorScenario::CommunicationLoss if !state.communication_lost => {
                    state.communication_lost = true;
                    return Err(DriverError::new(
                        driver_type,
                        DriverErrorKind::Communication,
                        "Communication lost",
                    ));
                }
                _ => {}
            }
        }

        if self.rng.should_fail(self.failure_rate) {
            return Err(DriverError::new(
                driver_type,
                DriverErrorKind::Hardware,
                format!("Random failure on operation '{}'", operation),
            ));
        }

        Ok(())
    }
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self::none()
    }
}

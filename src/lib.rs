//! labshell: an instrument shell.
//!
//! Creates named instruments in an [`InstrumentRegistry`] from TOML shell
//! plugins and exposes their parameters, including derived variables on
//! virtual composite instruments.
//!
//! - [`config`]: shell configuration (figment: TOML + `LABSHELL_` env)
//! - [`logging`]: `tracing-subscriber` setup
//! - [`plugin`]: shell plugin schema and runner
//!
//! Instrument types live in the workspace crates: `labshell-core` (traits,
//! errors, parameter metadata), `labshell-driver-mock` (simulated
//! instruments) and `labshell-hardware` (registry and composites).

pub mod config;
pub mod logging;
pub mod plugin;

pub use config::ShellConfig;
pub use labshell_core::error::{AppResult, InstrumentError};
pub use labshell_hardware::{InstrumentHandle, InstrumentRegistry};
pub use plugin::{run_path, run_plugin_dir, ConfigLoadError, PluginSummary, ShellPlugin};

//! Dispatcher Configuration Module
//!
//! Filters, queue handoff, listener and logging settings, loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `--config` or the `VLA_DISPATCHER_CONFIG` environment variable (the
//!    named file must exist)
//! 2. `dispatcher.toml` in the current working directory
//! 3. Built-in defaults
//!
//! A config file that is found but invalid stops startup.
//!
//! Command-line flags are applied on top by the binary. The resolved config
//! is held for the process lifetime; there is no reload.

mod dispatcher_config;
pub mod defaults;

pub use dispatcher_config::*;

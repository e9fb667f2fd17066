//! ui
//!
//! User-facing output.
//!
//! # Modules
//!
//! - [`output`] - Status lines, warnings and reports
//!
//! # Design
//!
//! Command handlers print through this module so `--quiet` and `--debug`
//! are honored in one place. Diagnostics go through `tracing`; this module
//! is only for what the user asked to see.

pub mod output;

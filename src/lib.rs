//! solution-kit - isolate, fork and package solution trees
//!
//! A solution is a directory with a manifest (`solution.json` or
//! `solution.yaml`) that declares typed objects stored in JSON or YAML
//! files. This crate turns a parametrized solution into a concrete one for a
//! given environment, copies a solution under a new name, and moves solutions
//! in and out of zip archives.
//!
//! # Architecture
//!
//! The codebase follows a layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Orchestrates Load -> Transform -> Check -> Emit
//! - [`core`] - Domain types, manifest, solution tree, documents, config
//! - [`isolation`] - `${...}` expression substitution
//! - [`fork`] - Structural renaming
//! - [`archive`] - Zip packing and safe extraction
//! - [`ui`] - User-facing output
//!
//! # Correctness Invariants
//!
//! 1. A source solution is never modified
//! 2. Every file is visited exactly once per transformation, in a fixed order
//! 3. Nothing is written to a target when a transformation fails
//! 4. Archive entries never escape the extraction root

pub mod archive;
pub mod cli;
pub mod core;
pub mod engine;
pub mod fork;
pub mod isolation;
pub mod ui;

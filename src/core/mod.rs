//! core
//!
//! Core domain types, schemas, and the solution tree model.
//!
//! # Modules
//!
//! - [`types`] - Strong types: SolutionName, ObjectType, Encoding
//! - [`manifest`] - Solution manifest schema and loading
//! - [`tree`] - Annotated in-memory solution tree, walk and write-back
//! - [`document`] - Generic JSON/YAML document tree
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - The tree is format-agnostic; only the manifest knows its format
//! - All traversal orders are deterministic

pub mod config;
pub mod document;
pub mod manifest;
pub mod tree;
pub mod types;

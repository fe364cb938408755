//! Shared test utilities for the tiling workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Grid and tile generators with predictable values
//! - Synthetic vector geometry
//! - Tile specs and GeoJSON documents used across test suites
//! - Temporary output directories
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{fixtures, square, constant_tile};
//! ```

pub mod fixtures;
pub mod generators;
pub mod paths;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
pub use paths::*;

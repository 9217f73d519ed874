//! # Outpost Test Utilities
//!
//! Shared testing utilities for all crates:
//! - An in-memory world implementing every collaborator trait
//! - Fixture blueprints and input helpers
//! - Determinism test harness
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;
pub mod world;

pub use world::{SandboxUnit, SandboxWorld};

/// Re-export proptest for convenience.
pub use proptest;

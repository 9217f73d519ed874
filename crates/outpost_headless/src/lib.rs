//! Headless scenario runner for testing and CI verification.
//!
//! Loads a RON [`Scenario`], drives the structure simulation against an
//! in-memory sandbox world and reports a [`RunSummary`]:
//!
//! - **stdout**: the summary as JSON
//! - **stderr**: logs (human-readable)
//!
//! # Example
//!
//! ```bash
//! # Run the built-in skirmish for a minute of game time
//! cargo run -p outpost_headless -- run --seconds 60
//!
//! # Run a scenario file
//! cargo run -p outpost_headless -- run --scenario scenarios/wall_line.ron
//!
//! # Check a scenario without running it
//! cargo run -p outpost_headless -- validate --scenario scenarios/wall_line.ron
//! ```

pub mod runner;
pub mod scenario;

pub use runner::{run_scenario, HeadlessRunner, RunSummary, StructureSummary, UnitSummary};
pub use scenario::{Scenario, ScenarioError};

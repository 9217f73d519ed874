//! Error types for the structure simulation.
//!
//! Only configuration problems are fatal. Invalid placements, stale
//! references and unaffordable confirmations are expected during play and
//! are either returned as status values or skipped for the tick.

use thiserror::Error;

use crate::placement::PlacementStatus;
use crate::structure::StructureId;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all structure simulation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// A blueprint is missing or has inconsistent configuration.
    #[error("Invalid configuration for blueprint '{blueprint}': {reason}")]
    InvalidConfiguration {
        /// Blueprint identifier.
        blueprint: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Structure not present in the registry.
    #[error("Structure not found: {0}")]
    StructureNotFound(StructureId),

    /// Placement confirmation attempted at a pose that is not buildable.
    #[error("Placement is not valid: {0:?}")]
    InvalidPlacement(PlacementStatus),

    /// Confirmation attempted without being able to pay for the structure.
    #[error("Insufficient resources: need {cost}")]
    InsufficientResources {
        /// Cost of the structure.
        cost: i32,
    },

    /// A placement operation was requested with no phantom structure.
    #[error("No structure is being placed")]
    NoActivePlacement,

    /// Invalid simulation state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path to the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },
}

impl GameError {
    /// Shorthand for building an [`GameError::InvalidConfiguration`].
    pub(crate) fn config(blueprint: &str, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            blueprint: blueprint.to_string(),
            reason: reason.into(),
        }
    }
}

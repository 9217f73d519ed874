//! # Outpost Core
//!
//! Deterministic structure simulation for an RTS: placement validation,
//! sibling construction groups with shared damage, and the time-driven
//! area heal and decay effects.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No system randomness
//! - No floating-point math (uses fixed-point)
//!
//! Everything outside the kernel (physics queries, fog of war, the economy,
//! unit state, rendering) is reached through the traits in [`services`].
//!
//! ## Crate Structure
//!
//! - [`structure`] - The structure entity
//! - [`registry`] - Structure storage and sibling groups
//! - [`placement`] - Placement validation
//! - [`damage`] - Sibling damage distribution and destruction
//! - [`scheduler`] - Per-structure background effects
//! - [`simulation`] - Core simulation loop
//! - [`session`] - Interactive placement workflow
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod blueprint;
pub mod config;
pub mod damage;
pub mod error;
pub mod events;
pub mod math;
pub mod placement;
pub mod registry;
pub mod scheduler;
pub mod services;
pub mod session;
pub mod simulation;
pub mod structure;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::blueprint::{BlueprintRegistry, StructureBlueprint};
    pub use crate::config::SimulationConfig;
    pub use crate::damage::DamageSource;
    pub use crate::error::{GameError, Result};
    pub use crate::events::{EventBus, EventKind, GameEvent, SubscriptionId};
    pub use crate::math::{Fixed, Vec2Fixed, Vec3Fixed};
    pub use crate::placement::{ColliderKind, Footprint, PlacementStatus};
    pub use crate::registry::GroupId;
    pub use crate::scheduler::DayPhase;
    pub use crate::services::{
        AgentId, AgentRoster, AgentSnapshot, Economy, GameServices, LayerMask, RenderSink,
        SpatialQuery, Visibility,
    };
    pub use crate::session::{InputFrame, PlacementSession, PointerRay, SessionEvent, SessionState};
    pub use crate::simulation::Simulation;
    pub use crate::structure::{PlayerId, Pose, RatioCause, Structure, StructureId};
}

//! Interfaces to the collaborators the core consumes but does not own.
//!
//! Physics queries, fog of war, the resource economy, unit state and
//! rendering all live outside this crate. The simulation only talks to them
//! through these narrow traits, which keeps the core deterministic and lets
//! tests substitute an in-memory world.

use serde::{Deserialize, Serialize};

use crate::math::{Fixed, Vec3Fixed};
use crate::placement::PlacementStatus;
use crate::structure::{PlayerId, RatioCause, StructureId};

/// Identifier of an external agent (unit) such as a builder or a healer target.
pub type AgentId = u64;

/// Collision layer filter for spatial queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerMask(pub u32);

impl LayerMask {
    /// Ground geometry.
    pub const TERRAIN: Self = Self(1 << 0);
    /// Living units.
    pub const UNITS: Self = Self(1 << 1);
    /// Placed structures.
    pub const STRUCTURES: Self = Self(1 << 2);

    /// Whether any layer in `other` is also in `self`.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

/// Physics queries against the world.
pub trait SpatialQuery {
    /// Agents whose colliders intersect the sphere.
    fn query_sphere(&self, center: Vec3Fixed, radius: Fixed, layers: LayerMask) -> Vec<AgentId>;

    /// First hit point along a ray, if any lies within `max_distance`.
    fn query_ray(
        &self,
        origin: Vec3Fixed,
        direction: Vec3Fixed,
        max_distance: Fixed,
        layers: LayerMask,
    ) -> Option<Vec3Fixed>;
}

/// Fog of war.
pub trait Visibility {
    /// Whether the position is inside the revealed region.
    fn is_position_revealed(&self, position: Vec3Fixed) -> bool;
}

/// Resource and population bookkeeping.
pub trait Economy {
    /// Whether `owner` can pay `cost`.
    fn can_afford(&self, owner: PlayerId, cost: i32) -> bool;

    /// Charge `cost` to `owner`.
    fn deduct(&mut self, owner: PlayerId, cost: i32);

    /// Add (or, when negative, remove) population cap for `owner`.
    fn adjust_population_cap(&mut self, _owner: PlayerId, _delta: i32) {}

    /// Award skill points for a destroyed structure owned by `from`.
    fn award_skill_points(&mut self, _from: PlayerId, _points: i32) {}
}

/// What the core needs to know about a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentSnapshot {
    /// Controlling player.
    pub owner: PlayerId,
    /// Current health.
    pub health: u32,
    /// Maximum health.
    pub max_health: u32,
}

impl AgentSnapshot {
    /// Whether the agent still counts as alive.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Whether the agent is below its maximum health.
    #[must_use]
    pub const fn is_wounded(&self) -> bool {
        self.health < self.max_health
    }
}

/// Unit state owned by the generic unit lifecycle.
pub trait AgentRoster {
    /// Look up an agent; `None` once it has been destroyed.
    fn agent(&self, id: AgentId) -> Option<AgentSnapshot>;

    /// Restore health to an agent, capped at its maximum.
    fn heal(&mut self, id: AgentId, amount: u32);

    /// Give a builder the follow-up task of constructing a structure.
    fn queue_build_task(&mut self, builder: AgentId, structure: StructureId);
}

/// Observational hooks for visual feedback. No core state depends on them.
pub trait RenderSink {
    /// The phantom structure was validated with this result.
    fn placement_status(&mut self, _status: PlacementStatus) {}

    /// A structure's displayed fraction changed.
    ///
    /// `fraction` is the construction ratio while incomplete and the health
    /// ratio once complete.
    fn structure_display(&mut self, _structure: StructureId, _fraction: Fixed, _cause: RatioCause) {
    }

    /// Anchor range indicators should be shown or hidden.
    fn range_indicators(&mut self, _visible: bool) {}
}

/// Every collaborator the simulation needs in one bundle.
///
/// Implemented automatically for anything that implements all of the
/// individual traits.
pub trait GameServices: SpatialQuery + Visibility + Economy + AgentRoster + RenderSink {}

impl<T> GameServices for T where T: SpatialQuery + Visibility + Economy + AgentRoster + RenderSink {}

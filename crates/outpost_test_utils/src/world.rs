//! In-memory stand-in for every collaborator the simulation consumes.
//!
//! The sandbox is a flat plane at `ground_height` with optional circular
//! holes, an optional revealed disc (everything is revealed by default), a
//! list of units, a per-player resource ledger and a record of every
//! rendering notification.

use std::collections::BTreeMap;

use outpost_core::math::{Fixed, Vec3Fixed};
use outpost_core::placement::PlacementStatus;
use outpost_core::services::{
    AgentId, AgentRoster, AgentSnapshot, Economy, LayerMask, RenderSink, SpatialQuery,
    Visibility,
};
use outpost_core::structure::{PlayerId, RatioCause, StructureId};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// A unit living in the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SandboxUnit {
    /// World position.
    pub position: Vec3Fixed,
    /// Owner and health.
    pub snapshot: AgentSnapshot,
}

/// Circular gap in the ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hole {
    /// Center on the ground plane.
    pub center: Vec3Fixed,
    /// Horizontal radius.
    #[serde(with = "outpost_core::math::decimal_serde")]
    pub radius: Fixed,
}

/// In-memory world.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SandboxWorld {
    /// Height of the ground plane.
    pub ground_height: Fixed,
    /// Gaps where rays find no ground.
    pub holes: Vec<Hole>,
    /// Revealed disc; `None` means the whole map is revealed.
    pub revealed: Option<(Vec3Fixed, Fixed)>,
    /// Units by id.
    pub units: BTreeMap<AgentId, SandboxUnit>,
    /// Resources per player.
    pub resources: BTreeMap<PlayerId, i32>,
    /// Population cap per player.
    pub population_cap: BTreeMap<PlayerId, i32>,
    /// Skill points awarded for destroying each player's structures.
    pub skill_points: BTreeMap<PlayerId, i32>,
    /// Build tasks handed to builders.
    pub build_tasks: Vec<(AgentId, StructureId)>,
    /// Every placement status reported.
    pub statuses: Vec<PlacementStatus>,
    /// Every display fraction update.
    pub displays: Vec<(StructureId, Fixed, RatioCause)>,
    /// Whether anchor range indicators are shown.
    pub range_indicators: bool,
}

impl SandboxWorld {
    /// Flat, fully revealed, empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Give a player resources.
    #[must_use]
    pub fn with_resources(mut self, owner: PlayerId, amount: i32) -> Self {
        self.resources.insert(owner, amount);
        self
    }

    /// Only reveal a disc around `center`.
    #[must_use]
    pub fn with_revealed(mut self, center: Vec3Fixed, radius: Fixed) -> Self {
        self.revealed = Some((center, radius));
        self
    }

    /// Remove the ground inside a circle.
    pub fn dig_hole(&mut self, center: Vec3Fixed, radius: Fixed) {
        self.holes.push(Hole { center, radius });
    }

    /// Add a unit at a position.
    pub fn add_unit(
        &mut self,
        id: AgentId,
        owner: PlayerId,
        position: Vec3Fixed,
        health: u32,
        max_health: u32,
    ) {
        self.units.insert(
            id,
            SandboxUnit {
                position,
                snapshot: AgentSnapshot {
                    owner,
                    health,
                    max_health,
                },
            },
        );
    }

    /// Remove a unit, as if it died.
    pub fn remove_unit(&mut self, id: AgentId) -> Option<SandboxUnit> {
        self.units.remove(&id)
    }

    /// Current health of a unit.
    #[must_use]
    pub fn unit_health(&self, id: AgentId) -> Option<u32> {
        self.units.get(&id).map(|u| u.snapshot.health)
    }

    /// Resources held by a player.
    #[must_use]
    pub fn resources_of(&self, owner: PlayerId) -> i32 {
        self.resources.get(&owner).copied().unwrap_or(0)
    }

    /// Latest placement status reported, if any.
    #[must_use]
    pub fn last_status(&self) -> Option<PlacementStatus> {
        self.statuses.last().copied()
    }

    fn has_ground_at(&self, point: Vec3Fixed) -> bool {
        let flat = Vec3Fixed::new(point.x, self.ground_height, point.z);
        !self
            .holes
            .iter()
            .any(|hole| flat.within_range(hole.center, hole.radius))
    }
}

impl SpatialQuery for SandboxWorld {
    fn query_sphere(&self, center: Vec3Fixed, radius: Fixed, layers: LayerMask) -> Vec<AgentId> {
        if !layers.intersects(LayerMask::UNITS) {
            return Vec::new();
        }
        self.units
            .iter()
            .filter(|(_, unit)| unit.position.within_range(center, radius))
            .map(|(id, _)| *id)
            .collect()
    }

    fn query_ray(
        &self,
        origin: Vec3Fixed,
        direction: Vec3Fixed,
        max_distance: Fixed,
        layers: LayerMask,
    ) -> Option<Vec3Fixed> {
        if !layers.intersects(LayerMask::TERRAIN) || direction.y >= Fixed::ZERO {
            return None;
        }
        let drop = origin.y - self.ground_height;
        if drop < Fixed::ZERO {
            return None;
        }

        // Distance along the ray, assuming a unit direction.
        let t = drop / -direction.y;
        if t > max_distance {
            return None;
        }
        let hit = origin + direction.scale(t);
        let hit = Vec3Fixed::new(hit.x, self.ground_height, hit.z);
        self.has_ground_at(hit).then_some(hit)
    }
}

impl Visibility for SandboxWorld {
    fn is_position_revealed(&self, position: Vec3Fixed) -> bool {
        self.revealed
            .map_or(true, |(center, radius)| center.within_range(position, radius))
    }
}

impl Economy for SandboxWorld {
    fn can_afford(&self, owner: PlayerId, cost: i32) -> bool {
        self.resources_of(owner) >= cost
    }

    fn deduct(&mut self, owner: PlayerId, cost: i32) {
        *self.resources.entry(owner).or_default() -= cost;
    }

    fn adjust_population_cap(&mut self, owner: PlayerId, delta: i32) {
        *self.population_cap.entry(owner).or_default() += delta;
    }

    fn award_skill_points(&mut self, from: PlayerId, points: i32) {
        *self.skill_points.entry(from).or_default() += points;
    }
}

impl AgentRoster for SandboxWorld {
    fn agent(&self, id: AgentId) -> Option<AgentSnapshot> {
        self.units.get(&id).map(|u| u.snapshot)
    }

    fn heal(&mut self, id: AgentId, amount: u32) {
        if let Some(unit) = self.units.get_mut(&id) {
            let snapshot = &mut unit.snapshot;
            snapshot.health = snapshot
                .health
                .saturating_add(amount)
                .min(snapshot.max_health);
            trace!(agent = id, health = snapshot.health, "unit healed");
        }
    }

    fn queue_build_task(&mut self, builder: AgentId, structure: StructureId) {
        self.build_tasks.push((builder, structure));
    }
}

impl RenderSink for SandboxWorld {
    fn placement_status(&mut self, status: PlacementStatus) {
        self.statuses.push(status);
    }

    fn structure_display(&mut self, structure: StructureId, fraction: Fixed, cause: RatioCause) {
        self.displays.push((structure, fraction, cause));
    }

    fn range_indicators(&mut self, visible: bool) {
        self.range_indicators = visible;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::fixed;

    #[test]
    fn test_ray_hits_flat_ground() {
        let world = SandboxWorld::new();
        let hit = world.query_ray(
            Vec3Fixed::from_ints(3, 10, 4),
            Vec3Fixed::DOWN,
            fixed(100),
            LayerMask::TERRAIN,
        );
        assert_eq!(hit, Some(Vec3Fixed::from_ints(3, 0, 4)));
    }

    #[test]
    fn test_ray_misses_holes_and_short_probes() {
        let mut world = SandboxWorld::new();
        world.dig_hole(Vec3Fixed::ZERO, fixed(2));
        let down = Vec3Fixed::DOWN;

        assert!(world
            .query_ray(Vec3Fixed::from_ints(1, 1, 0), down, fixed(5), LayerMask::TERRAIN)
            .is_none());
        assert!(world
            .query_ray(Vec3Fixed::from_ints(5, 10, 0), down, fixed(5), LayerMask::TERRAIN)
            .is_none());
        assert!(world
            .query_ray(Vec3Fixed::from_ints(5, 10, 0), down, fixed(5), LayerMask::UNITS)
            .is_none());
    }

    #[test]
    fn test_sphere_query_filters_by_range() {
        let mut world = SandboxWorld::new();
        world.add_unit(1, PlayerId(0), Vec3Fixed::from_ints(1, 0, 0), 5, 10);
        world.add_unit(2, PlayerId(0), Vec3Fixed::from_ints(9, 0, 0), 5, 10);

        let found = world.query_sphere(Vec3Fixed::ZERO, fixed(5), LayerMask::UNITS);
        assert_eq!(found, vec![1]);
        assert!(world
            .query_sphere(Vec3Fixed::ZERO, fixed(5), LayerMask::TERRAIN)
            .is_empty());
    }

    #[test]
    fn test_heal_is_capped() {
        let mut world = SandboxWorld::new();
        world.add_unit(1, PlayerId(0), Vec3Fixed::ZERO, 9, 10);
        world.heal(1, 5);
        assert_eq!(world.unit_health(1), Some(10));
    }

    #[test]
    fn test_revealed_disc() {
        let world = SandboxWorld::new().with_revealed(Vec3Fixed::ZERO, fixed(10));
        assert!(world.is_position_revealed(Vec3Fixed::from_ints(6, 0, 6)));
        assert!(!world.is_position_revealed(Vec3Fixed::from_ints(8, 0, 8)));
    }

    #[test]
    fn test_economy_ledger() {
        let mut world = SandboxWorld::new().with_resources(PlayerId(1), 50);
        assert!(world.can_afford(PlayerId(1), 50));
        world.deduct(PlayerId(1), 30);
        assert!(!world.can_afford(PlayerId(1), 30));
        assert_eq!(world.resources_of(PlayerId(1)), 20);
        assert!(!world.can_afford(PlayerId(2), 1));
    }
}

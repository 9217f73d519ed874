//! Core simulation loop.
//!
//! The simulation owns every placed structure, their sibling groups, the
//! effect scheduler and the event bus. Collaborators (physics, fog of war,
//! economy, units, rendering) are passed in per call as
//! [`GameServices`], so the simulation itself holds no external state.
//!
//! # Determinism
//!
//! All operations in this module are fully deterministic:
//! - No floating-point math (uses fixed-point via [`Fixed`])
//! - No system randomness
//! - Consistent iteration order (sorted structure ids)
//! - Same inputs always produce same outputs
//!
//! # Tick order
//!
//! Each tick advances the clock, takes every ready task from the scheduler
//! and runs them ordered by structure id. A task's damage and any resulting
//! destruction complete before the next task runs.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tracing::{debug, trace};

use crate::blueprint::StructureBlueprint;
use crate::config::SimulationConfig;
use crate::damage::DamageSource;
use crate::error::{GameError, Result};
use crate::events::{EventBus, GameEvent};
use crate::math::Fixed;
use crate::placement::{
    evaluate_placement, in_range_of_anchors, AnchorSite, PlacementRules, PlacementStatus,
};
use crate::registry::{GroupId, StructureRegistry};
use crate::scheduler::{
    DayPhase, DecayProcess, Effect, EffectKind, EffectScheduler, HealProcess, ScheduledTask, Wake,
};
use crate::services::{AgentId, GameServices, LayerMask};
use crate::structure::{PlayerId, Pose, RatioCause, Structure, StructureId};

/// The structure simulation.
#[derive(Debug)]
pub struct Simulation {
    pub(crate) config: SimulationConfig,
    pub(crate) registry: StructureRegistry,
    pub(crate) scheduler: EffectScheduler,
    pub(crate) bus: EventBus,
    tick: u64,
    clock: Fixed,
    day_phase: DayPhase,
}

impl Simulation {
    /// Create an empty simulation.
    ///
    /// # Errors
    ///
    /// Returns an error if the config fails validation.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry: StructureRegistry::new(),
            scheduler: EffectScheduler::new(),
            bus: EventBus::new(),
            tick: 0,
            clock: Fixed::ZERO,
            day_phase: DayPhase::Day,
        })
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Placed structures and their groups.
    #[must_use]
    pub fn registry(&self) -> &StructureRegistry {
        &self.registry
    }

    /// Parked background effects.
    #[must_use]
    pub fn scheduler(&self) -> &EffectScheduler {
        &self.scheduler
    }

    /// Get a structure by id.
    #[must_use]
    pub fn structure(&self, id: StructureId) -> Option<&Structure> {
        self.registry.get(id)
    }

    /// The event bus, for subscribing and publishing external events.
    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    /// Number of ticks processed.
    #[must_use]
    pub const fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Simulated seconds elapsed.
    #[must_use]
    pub const fn clock(&self) -> Fixed {
        self.clock
    }

    /// Current time of day.
    #[must_use]
    pub const fn day_phase(&self) -> DayPhase {
        self.day_phase
    }

    /// Switch the time of day.
    pub fn set_day_phase(&mut self, phase: DayPhase) {
        if self.day_phase != phase {
            debug!(?phase, "day phase changed");
        }
        self.day_phase = phase;
    }

    /// Whether the structure exists and has completed construction.
    #[must_use]
    pub fn is_active(&self, id: StructureId) -> bool {
        self.registry.get(id).is_some_and(Structure::is_active)
    }

    /// Registered anchors of every player.
    #[must_use]
    pub fn anchor_sites(&self) -> Vec<AnchorSite> {
        self.registry.anchor_sites()
    }

    /// Validate a structure at its current pose against the registered
    /// anchors and report the result to the rendering collaborator.
    pub fn evaluate_placement(
        &self,
        structure: &Structure,
        services: &mut dyn GameServices,
    ) -> PlacementStatus {
        let rules = PlacementRules::from(&self.config);
        let status = evaluate_placement(
            structure,
            &rules,
            &self.registry.anchor_sites(),
            &*services,
            &*services,
        );
        services.placement_status(status);
        status
    }

    /// Advance the simulation by one tick of the configured duration.
    pub fn tick(&mut self, services: &mut dyn GameServices) -> Vec<GameEvent> {
        let dt = self.config.tick_duration();
        self.advance(dt, services)
    }

    /// Advance the simulation by `dt` seconds.
    ///
    /// Returns every event published since the previous call, including
    /// events raised between ticks (placements, external damage).
    pub fn advance(&mut self, dt: Fixed, services: &mut dyn GameServices) -> Vec<GameEvent> {
        self.tick += 1;
        self.clock = self.clock.saturating_add(dt.max(Fixed::ZERO));

        let registry = &self.registry;
        let ready = self.scheduler.take_ready(self.clock, |id| {
            registry.get(id).is_some_and(Structure::is_complete)
        });
        trace!(tick = self.tick, ready = ready.len(), "tick");

        for task in ready {
            if !self.registry.contains(task.structure) {
                trace!(structure = task.structure.0, "task for removed structure dropped");
                continue;
            }
            self.run_task(task, dt, services);
        }

        self.bus.take_published()
    }

    fn run_task(&mut self, task: ScheduledTask, dt: Fixed, services: &mut dyn GameServices) {
        let id = task.structure;
        match task.effect {
            Effect::CompletionInit { deferred: false } => {
                self.scheduler.schedule(
                    id,
                    Effect::CompletionInit { deferred: true },
                    Wake::NextTick,
                );
            }
            Effect::CompletionInit { deferred: true } => self.initialize_completed(id),
            Effect::AreaHeal(heal) => {
                self.run_area_heal(id, heal, services);
                let due = self.clock.saturating_add(heal.interval);
                self.scheduler
                    .schedule(id, Effect::AreaHeal(heal), Wake::At(due));
            }
            Effect::Decay(process) => self.run_decay(id, process, dt, services),
        }
    }

    /// Anchor registration and decay eligibility, one tick after completion.
    fn initialize_completed(&mut self, id: StructureId) {
        let Some(structure) = self.registry.get(id) else {
            return;
        };
        let is_anchor = structure.blueprint().is_anchor;
        let can_decay = structure.blueprint().can_decay;
        let position = structure.pose().position;
        let owner = structure.owner();

        if is_anchor {
            self.registry.register_anchor(id);
            debug!(structure = id.0, "anchor registered");
        }
        if can_decay {
            let anchors = self.registry.anchor_sites_of(owner);
            if !in_range_of_anchors(position, owner, &anchors) {
                // Cannot fail: the structure exists and can decay.
                let _ = self.set_decay_eligible(id, true);
            }
        }
    }

    fn run_area_heal(&mut self, id: StructureId, heal: HealProcess, services: &mut dyn GameServices) {
        if self.day_phase != DayPhase::Day {
            trace!(structure = id.0, "night, heal skipped");
            return;
        }
        let Some(structure) = self.registry.get(id) else {
            return;
        };
        let owner = structure.owner();
        let center = structure.pose().position;
        let range = structure.blueprint().safety_range;

        let mut wounded = Vec::new();
        for agent in services.query_sphere(center, range, LayerMask::UNITS) {
            let Some(snapshot) = services.agent(agent) else {
                continue;
            };
            if !snapshot.is_alive() {
                continue;
            }
            if snapshot.owner != owner {
                debug!(structure = id.0, hostile = agent, "enemy in range, heal cancelled");
                return;
            }
            if snapshot.is_wounded() {
                wounded.push(agent);
            }
        }

        wounded.sort_unstable();
        wounded.dedup();
        trace!(structure = id.0, healed = wounded.len(), "area heal");
        for agent in wounded {
            services.heal(agent, heal.amount);
        }
    }

    fn run_decay(
        &mut self,
        id: StructureId,
        mut process: DecayProcess,
        dt: Fixed,
        services: &mut dyn GameServices,
    ) {
        let Some(structure) = self.registry.get(id) else {
            return;
        };
        let due = process.advance(dt).unwrap_or(structure.health());

        if due > 0 {
            // The structure exists, so the distributor cannot fail here.
            let _ = self.apply_damage(id, due, DamageSource::Decay, services);
        }

        match self.registry.get(id) {
            Some(s) if !s.is_destroyed() => {
                self.scheduler
                    .schedule(id, Effect::Decay(process), Wake::NextTick);
            }
            _ => debug!(structure = id.0, "decay finished"),
        }
    }

    /// Fix a structure in place and hand it to the simulation.
    ///
    /// Grants the blueprint's population cap, publishes
    /// [`GameEvent::StructurePlaced`] and parks the structure's background
    /// effects. Cost is not charged here.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidState`] if the structure was already
    /// placed.
    pub fn place_structure(
        &mut self,
        mut structure: Structure,
        services: &mut dyn GameServices,
    ) -> Result<StructureId> {
        if structure.is_fixed() {
            return Err(GameError::InvalidState(
                "structure is already placed".into(),
            ));
        }
        structure.mark_fixed();

        let owner = structure.owner();
        let granted = structure.blueprint().population_cost_granted;
        let heal = structure.blueprint().heals_area.then(|| HealProcess {
            interval: self.config.heal_interval_secs,
            amount: self.config.heal_amount,
        });
        let complete = structure.is_complete();
        let fraction = structure.display_fraction();

        let id = self.registry.insert(structure);
        debug!(structure = id.0, owner = owner.0, complete, "structure placed");

        if granted != 0 {
            services.adjust_population_cap(owner, granted);
        }
        services.structure_display(id, fraction, RatioCause::Construction);

        self.scheduler.schedule(
            id,
            Effect::CompletionInit { deferred: false },
            Wake::WhenComplete,
        );
        if let Some(heal) = heal {
            self.scheduler
                .schedule(id, Effect::AreaHeal(heal), Wake::WhenComplete);
        }

        self.bus.publish(GameEvent::StructurePlaced {
            structure: id,
            owner,
        });
        if complete {
            self.bus
                .publish(GameEvent::ConstructionCompleted { structure: id });
        }
        Ok(id)
    }

    /// Insert a fully built structure without charging its cost.
    ///
    /// # Errors
    ///
    /// Returns an error if the blueprint fails validation.
    pub fn spawn_preplaced(
        &mut self,
        blueprint: &StructureBlueprint,
        owner: PlayerId,
        pose: Pose,
        services: &mut dyn GameServices,
    ) -> Result<StructureId> {
        let mut structure = Structure::new(blueprint, owner)?;
        structure.set_pose(pose);
        structure.set_construction_ratio(Fixed::ONE, RatioCause::Construction);
        self.place_structure(structure, services)
    }

    /// Place several structures of one blueprint as a sibling group.
    ///
    /// Each starts at the blueprint's initial construction ratio.
    ///
    /// # Errors
    ///
    /// Returns an error if the blueprint fails validation.
    pub fn spawn_group(
        &mut self,
        blueprint: &StructureBlueprint,
        owner: PlayerId,
        poses: &[Pose],
        services: &mut dyn GameServices,
    ) -> Result<Vec<StructureId>> {
        let mut ids = Vec::with_capacity(poses.len());
        for &pose in poses {
            let mut structure = Structure::new(blueprint, owner)?;
            structure.set_pose(pose);
            ids.push(self.place_structure(structure, services)?);
        }
        if ids.len() >= 2 {
            self.link_siblings(&ids, services)?;
        }
        Ok(ids)
    }

    /// Link placed structures into one sibling group.
    ///
    /// # Errors
    ///
    /// See [`StructureRegistry::link`].
    pub fn link_siblings(
        &mut self,
        ids: &[StructureId],
        services: &mut dyn GameServices,
    ) -> Result<GroupId> {
        let group = self.registry.link(ids)?;
        for id in ids {
            if let Some(s) = self.registry.get(*id) {
                services.structure_display(*id, s.display_fraction(), RatioCause::Regroup);
            }
        }
        debug!(group = group.0, members = ids.len(), "siblings linked");
        Ok(group)
    }

    /// Contribute construction work to a structure's group.
    ///
    /// Progress is shared: `work` over the group's total requirement is
    /// added to the ratio of every incomplete member.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::StructureNotFound`] for unknown ids.
    pub fn contribute_construction(
        &mut self,
        id: StructureId,
        work: Fixed,
        services: &mut dyn GameServices,
    ) -> Result<()> {
        let needed = self
            .registry
            .get(id)
            .ok_or(GameError::StructureNotFound(id))?
            .construction_needed();
        if work <= Fixed::ZERO {
            return Ok(());
        }
        let step = if needed <= Fixed::ZERO {
            Fixed::ONE
        } else {
            work / needed
        };

        for member in self.registry.group_members(id) {
            let Some(structure) = self.registry.get_mut(member) else {
                continue;
            };
            if structure.is_complete() {
                continue;
            }
            let ratio = structure.construction_ratio().saturating_add(step);
            structure.set_construction_ratio(ratio, RatioCause::Construction);
            let completed = structure.is_complete();
            services.structure_display(member, structure.display_fraction(), RatioCause::Construction);

            if completed {
                debug!(structure = member.0, "construction completed");
                self.bus
                    .publish(GameEvent::ConstructionCompleted { structure: member });
            }
        }
        Ok(())
    }

    /// Switch decay on or off for a structure.
    ///
    /// Switching it on starts a decay process on the next tick; switching it
    /// off cancels the running process and discards its accumulator.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::StructureNotFound`] for unknown ids and
    /// [`GameError::InvalidConfiguration`] when enabling decay on a blueprint
    /// that cannot decay.
    pub fn set_decay_eligible(&mut self, id: StructureId, eligible: bool) -> Result<()> {
        let structure = self
            .registry
            .get_mut(id)
            .ok_or(GameError::StructureNotFound(id))?;

        if !eligible {
            structure.set_decay_eligible(false);
            self.scheduler.cancel_effect(id, EffectKind::Decay);
            return Ok(());
        }

        let blueprint = structure.blueprint();
        if !blueprint.can_decay {
            return Err(GameError::config(&blueprint.id, "structure cannot decay"));
        }
        if structure.decay_eligible() {
            return Ok(());
        }
        let duration = blueprint
            .decay_duration_secs
            .ok_or_else(|| GameError::config(&blueprint.id, "missing decay_duration_secs"))?;
        let process = DecayProcess::new(structure.max_health(), duration);
        structure.set_decay_eligible(true);

        debug!(structure = id.0, rate = %process.rate, "decay started");
        self.scheduler
            .schedule(id, Effect::Decay(process), Wake::NextTick);
        Ok(())
    }

    /// Report that an external agent was destroyed.
    pub fn notify_agent_destroyed(&mut self, agent: AgentId) {
        self.bus.publish(GameEvent::AgentDestroyed { agent });
    }

    /// Calculate a hash of the current simulation state.
    ///
    /// Two simulations with identical state produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.clock.to_bits().hash(&mut hasher);
        self.day_phase.hash(&mut hasher);

        let ids = self.registry.sorted_ids();
        ids.len().hash(&mut hasher);
        for id in ids {
            if let Some(structure) = self.registry.get(id) {
                id.hash(&mut hasher);
                structure.hash(&mut hasher);
                self.registry.group_of(id).hash(&mut hasher);
            }
        }

        for task in self.scheduler.tasks() {
            task.hash(&mut hasher);
        }

        hasher.finish()
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            config: SimulationConfig::default(),
            registry: StructureRegistry::new(),
            scheduler: EffectScheduler::new(),
            bus: EventBus::new(),
            tick: 0,
            clock: Fixed::ZERO,
            day_phase: DayPhase::Day,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3Fixed;
    use crate::placement::PlacementStatus;
    use crate::services::{
        AgentRoster, AgentSnapshot, Economy, RenderSink, SpatialQuery, Visibility,
    };
    use std::collections::BTreeMap;

    fn fixed(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    /// Flat, fully revealed world with a unit list and a population ledger.
    #[derive(Default)]
    struct MockWorld {
        units: BTreeMap<AgentId, (Vec3Fixed, AgentSnapshot)>,
        population: BTreeMap<PlayerId, i32>,
        skill_points: i32,
    }

    impl MockWorld {
        fn add_unit(&mut self, id: AgentId, owner: u8, health: u32, at: Vec3Fixed) {
            self.units.insert(
                id,
                (
                    at,
                    AgentSnapshot {
                        owner: PlayerId(owner),
                        health,
                        max_health: 10,
                    },
                ),
            );
        }

        fn health(&self, id: AgentId) -> u32 {
            self.units[&id].1.health
        }
    }

    impl SpatialQuery for MockWorld {
        fn query_sphere(&self, center: Vec3Fixed, radius: Fixed, _: LayerMask) -> Vec<AgentId> {
            self.units
                .iter()
                .filter(|(_, (pos, _))| pos.within_range(center, radius))
                .map(|(id, _)| *id)
                .collect()
        }

        fn query_ray(&self, origin: Vec3Fixed, _: Vec3Fixed, _: Fixed, _: LayerMask) -> Option<Vec3Fixed> {
            Some(Vec3Fixed::new(origin.x, Fixed::ZERO, origin.z))
        }
    }

    impl Visibility for MockWorld {
        fn is_position_revealed(&self, _: Vec3Fixed) -> bool {
            true
        }
    }

    impl Economy for MockWorld {
        fn can_afford(&self, _: PlayerId, _: i32) -> bool {
            true
        }

        fn deduct(&mut self, _: PlayerId, _: i32) {}

        fn adjust_population_cap(&mut self, owner: PlayerId, delta: i32) {
            *self.population.entry(owner).or_default() += delta;
        }

        fn award_skill_points(&mut self, _: PlayerId, points: i32) {
            self.skill_points += points;
        }
    }

    impl AgentRoster for MockWorld {
        fn agent(&self, id: AgentId) -> Option<AgentSnapshot> {
            self.units.get(&id).map(|(_, snapshot)| *snapshot)
        }

        fn heal(&mut self, id: AgentId, amount: u32) {
            if let Some((_, snapshot)) = self.units.get_mut(&id) {
                snapshot.health = (snapshot.health + amount).min(snapshot.max_health);
            }
        }

        fn queue_build_task(&mut self, _: AgentId, _: StructureId) {}
    }

    impl RenderSink for MockWorld {}

    fn run_for(sim: &mut Simulation, world: &mut MockWorld, seconds: i32) -> Vec<GameEvent> {
        let ticks = seconds * sim.config().tick_rate as i32;
        let mut events = Vec::new();
        for _ in 0..ticks {
            events.extend(sim.tick(world));
        }
        events
    }

    #[test]
    fn test_simulation_new() {
        let sim = Simulation::default();
        assert_eq!(sim.current_tick(), 0);
        assert!(sim.registry().is_empty());
        assert!(Simulation::new(SimulationConfig {
            tick_rate: 0,
            ..Default::default()
        })
        .is_err());
    }

    #[test]
    fn test_tick_increments() {
        let mut sim = Simulation::default();
        let mut world = MockWorld::default();
        sim.tick(&mut world);
        sim.tick(&mut world);
        assert_eq!(sim.current_tick(), 2);
        assert_eq!(sim.clock(), sim.config().tick_duration() * 2);
    }

    #[test]
    fn test_preplaced_anchor_registers_after_one_tick() {
        let mut sim = Simulation::default();
        let mut world = MockWorld::default();
        let outpost = StructureBlueprint::new("outpost", 100, 400, 60).anchor(20);

        let id = sim
            .spawn_preplaced(&outpost, PlayerId(0), Pose::default(), &mut world)
            .unwrap();
        assert!(sim.is_active(id));
        assert!(sim.anchor_sites().is_empty());

        // Tick 1 wakes on completion, tick 2 runs the deferred init.
        sim.tick(&mut world);
        assert!(sim.anchor_sites().is_empty());
        sim.tick(&mut world);
        assert_eq!(sim.anchor_sites().len(), 1);
    }

    #[test]
    fn test_population_cap_granted_and_revoked() {
        let mut sim = Simulation::default();
        let mut world = MockWorld::default();
        let mut depot = StructureBlueprint::new("depot", 50, 100, 10);
        depot.population_cost_granted = 5;
        depot.skill_points = 3;

        let id = sim
            .spawn_preplaced(&depot, PlayerId(2), Pose::default(), &mut world)
            .unwrap();
        assert_eq!(world.population[&PlayerId(2)], 5);

        sim.destroy_structure(id, &mut world).unwrap();
        assert_eq!(world.population[&PlayerId(2)], 0);
        assert_eq!(world.skill_points, 3);
        assert!(sim.destroy_structure(id, &mut world).is_err());
    }

    #[test]
    fn test_decay_runs_to_zero() {
        let mut sim = Simulation::default();
        let mut world = MockWorld::default();
        let shack = StructureBlueprint::new("shack", 5, 100, 10).decaying();

        let id = sim
            .spawn_preplaced(&shack, PlayerId(0), Pose::default(), &mut world)
            .unwrap();
        let events = run_for(&mut sim, &mut world, 16);

        assert!(sim.structure(id).is_none());
        let destroyed = events
            .iter()
            .filter(|e| matches!(e, GameEvent::StructureDestroyed { .. }))
            .count();
        assert_eq!(destroyed, 1);
        assert!(sim.scheduler().is_empty());
    }

    #[test]
    fn test_decay_suppressed_near_friendly_anchor() {
        let mut sim = Simulation::default();
        let mut world = MockWorld::default();
        let outpost = StructureBlueprint::new("outpost", 100, 400, 60).anchor(20);
        let shack = StructureBlueprint::new("shack", 5, 100, 10).decaying();

        sim.spawn_preplaced(&outpost, PlayerId(0), Pose::default(), &mut world)
            .unwrap();
        run_for(&mut sim, &mut world, 1);

        let id = sim
            .spawn_preplaced(&shack, PlayerId(0), Pose::at(Vec3Fixed::from_ints(5, 0, 0)), &mut world)
            .unwrap();
        run_for(&mut sim, &mut world, 20);

        let shack = sim.structure(id).unwrap();
        assert_eq!(shack.health(), 100);
        assert!(!shack.decay_eligible());
    }

    #[test]
    fn test_cancel_decay_keeps_structure() {
        let mut sim = Simulation::default();
        let mut world = MockWorld::default();
        let shack = StructureBlueprint::new("shack", 5, 100, 10).decaying();
        let id = sim
            .spawn_preplaced(&shack, PlayerId(0), Pose::default(), &mut world)
            .unwrap();

        run_for(&mut sim, &mut world, 3);
        sim.set_decay_eligible(id, false).unwrap();
        let health = sim.structure(id).unwrap().health();
        assert!(health < 100);

        run_for(&mut sim, &mut world, 20);
        assert_eq!(sim.structure(id).unwrap().health(), health);
    }

    #[test]
    fn test_decay_rejected_for_non_decaying_blueprint() {
        let mut sim = Simulation::default();
        let mut world = MockWorld::default();
        let wall = StructureBlueprint::new("wall", 5, 100, 10);
        let id = sim
            .spawn_preplaced(&wall, PlayerId(0), Pose::default(), &mut world)
            .unwrap();
        assert!(matches!(
            sim.set_decay_eligible(id, true),
            Err(GameError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_area_heal_heals_wounded_friendlies() {
        let mut sim = Simulation::default();
        let mut world = MockWorld::default();
        let outpost = StructureBlueprint::new("outpost", 100, 400, 60).anchor(20);
        sim.spawn_preplaced(&outpost, PlayerId(0), Pose::default(), &mut world)
            .unwrap();
        world.add_unit(1, 0, 5, Vec3Fixed::from_ints(3, 0, 0));
        world.add_unit(2, 0, 10, Vec3Fixed::from_ints(4, 0, 0));
        world.add_unit(3, 0, 5, Vec3Fixed::from_ints(50, 0, 0));

        // Heals on completion and again one interval later.
        run_for(&mut sim, &mut world, 4);
        assert_eq!(world.health(1), 9);
        assert_eq!(world.health(2), 10);
        assert_eq!(world.health(3), 5, "out of range");
    }

    #[test]
    fn test_area_heal_starts_on_completion_tick() {
        let mut sim = Simulation::default();
        let mut world = MockWorld::default();
        let outpost = StructureBlueprint::new("outpost", 100, 400, 60).anchor(20);
        sim.spawn_preplaced(&outpost, PlayerId(0), Pose::default(), &mut world)
            .unwrap();
        world.add_unit(1, 0, 3, Vec3Fixed::from_ints(3, 0, 0));
        sim.tick(&mut world);
        assert_eq!(world.health(1), 5);

        run_for(&mut sim, &mut world, 2);
        assert_eq!(world.health(1), 5, "next heal waits a full interval");
    }

    #[test]
    fn test_area_heal_paused_at_night() {
        let mut sim = Simulation::default();
        let mut world = MockWorld::default();
        let outpost = StructureBlueprint::new("outpost", 100, 400, 60).anchor(20);
        sim.spawn_preplaced(&outpost, PlayerId(0), Pose::default(), &mut world)
            .unwrap();
        world.add_unit(1, 0, 5, Vec3Fixed::from_ints(3, 0, 0));

        sim.set_day_phase(DayPhase::Night);
        run_for(&mut sim, &mut world, 7);
        assert_eq!(world.health(1), 5);
    }

    #[test]
    fn test_contribute_construction_is_shared() {
        let mut sim = Simulation::default();
        let mut world = MockWorld::default();
        let wall = StructureBlueprint::new("wall", 5, 100, 10);
        let ids = sim
            .spawn_group(&wall, PlayerId(0), &[Pose::default(), Pose::default()], &mut world)
            .unwrap();
        sim.bus_mut().take_published();

        sim.contribute_construction(ids[0], fixed(5), &mut world).unwrap();
        for &id in &ids {
            let s = sim.structure(id).unwrap();
            assert_eq!(s.construction_ratio(), Fixed::from_num(0.25));
            assert_eq!(s.health(), 25);
        }

        sim.contribute_construction(ids[1], fixed(15), &mut world).unwrap();
        assert!(ids.iter().all(|&id| sim.is_active(id)));
        let completed = sim
            .bus_mut()
            .take_published()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::ConstructionCompleted { .. }))
            .count();
        assert_eq!(completed, 2);
    }

    #[test]
    fn test_evaluate_placement_uses_registered_anchors() {
        let mut sim = Simulation::default();
        let mut world = MockWorld::default();
        let outpost = StructureBlueprint::new("outpost", 100, 400, 60).anchor(20);
        let wall = StructureBlueprint::new("wall", 5, 100, 10);

        let mut phantom = Structure::new(&wall, PlayerId(0)).unwrap();
        phantom.set_pose(Pose::at(Vec3Fixed::from_ints(5, 0, 0)));
        assert_eq!(
            sim.evaluate_placement(&phantom, &mut world),
            PlacementStatus::OutOfRange
        );

        sim.spawn_preplaced(&outpost, PlayerId(0), Pose::default(), &mut world)
            .unwrap();
        run_for(&mut sim, &mut world, 1);
        assert_eq!(
            sim.evaluate_placement(&phantom, &mut world),
            PlacementStatus::Valid
        );
    }

    #[test]
    fn test_state_hash_tracks_changes() {
        let mut sim = Simulation::default();
        let mut world = MockWorld::default();
        let before = sim.state_hash();
        let wall = StructureBlueprint::new("wall", 5, 100, 10);
        sim.spawn_preplaced(&wall, PlayerId(0), Pose::default(), &mut world)
            .unwrap();
        assert_ne!(before, sim.state_hash());
    }
}

//! Sibling group damage and destruction tests.
//!
//! These drive the simulation through the sandbox world and check the
//! health ratio guarantees that hold across a whole group.

use outpost_core::blueprint::StructureBlueprint;
use outpost_core::damage::DamageSource;
use outpost_core::error::GameError;
use outpost_core::events::GameEvent;
use outpost_core::math::Vec3Fixed;
use outpost_core::simulation::Simulation;
use outpost_core::structure::{PlayerId, Pose, RatioCause, StructureId};
use outpost_test_utils::determinism::strategies::{arb_damage, arb_group_max_health, arb_health};
use outpost_test_utils::fixtures::{fixed, outpost_blueprint, wall_blueprint};
use outpost_test_utils::SandboxWorld;
use proptest::prelude::*;

// =============================================================================
// Helpers
// =============================================================================

/// Spawn one fully built member per max health value and link them.
fn spawn_linked(
    sim: &mut Simulation,
    world: &mut SandboxWorld,
    max_health: &[u32],
) -> Vec<StructureId> {
    let ids: Vec<StructureId> = max_health
        .iter()
        .enumerate()
        .map(|(i, &health)| {
            let blueprint = StructureBlueprint::new(&format!("segment{i}"), 5, health, 10);
            let pose = Pose::at(Vec3Fixed::from_ints(i as i32 * 3, 0, 0));
            sim.spawn_preplaced(&blueprint, PlayerId(0), pose, world)
                .unwrap()
        })
        .collect();
    if ids.len() >= 2 {
        sim.link_siblings(&ids, world).unwrap();
    }
    ids
}

fn health_of(sim: &Simulation, id: StructureId) -> Option<(u64, u64)> {
    sim.structure(id)
        .map(|s| (u64::from(s.health()), u64::from(s.max_health())))
}

fn destroyed_events(events: &[GameEvent]) -> Vec<StructureId> {
    events
        .iter()
        .filter_map(|e| match e {
            GameEvent::StructureDestroyed { structure, .. } => Some(*structure),
            _ => None,
        })
        .collect()
}

/// Cross-multiplied ratio drift between every pair of survivors.
fn assert_ratios_within_one_point(sim: &Simulation, ids: &[StructureId]) {
    let survivors: Vec<(u64, u64)> = ids.iter().filter_map(|&id| health_of(sim, id)).collect();
    for a in &survivors {
        for b in &survivors {
            let drift = (a.0 * b.1).abs_diff(b.0 * a.1);
            assert!(
                drift < a.1.max(b.1),
                "ratios drifted: {a:?} vs {b:?} in {survivors:?}"
            );
        }
    }
}

// =============================================================================
// Shared Damage
// =============================================================================

#[test]
fn test_equal_siblings_lose_equal_health() {
    let mut sim = Simulation::default();
    let mut world = SandboxWorld::new();
    let ids = spawn_linked(&mut sim, &mut world, &[100, 100, 100]);

    let removed = sim
        .apply_damage(ids[0], 30, DamageSource::Attack(Some(4)), &mut world)
        .unwrap();

    assert_eq!(removed, 30);
    for id in &ids {
        assert_eq!(sim.structure(*id).unwrap().health(), 90);
    }
}

#[test]
fn test_mixed_siblings_share_the_ratio() {
    let mut sim = Simulation::default();
    let mut world = SandboxWorld::new();
    let ids = spawn_linked(&mut sim, &mut world, &[100, 300]);

    // Total 400, 40 damage: ratio drops from 1.0 to 0.9.
    sim.apply_damage(ids[1], 40, DamageSource::Attack(None), &mut world)
        .unwrap();

    assert_eq!(sim.structure(ids[0]).unwrap().health(), 90);
    assert_eq!(sim.structure(ids[1]).unwrap().health(), 270);
}

#[test]
fn test_ungrouped_structure_takes_exact_damage() {
    let mut sim = Simulation::default();
    let mut world = SandboxWorld::new();
    let id = sim
        .spawn_preplaced(&wall_blueprint(), PlayerId(0), Pose::default(), &mut world)
        .unwrap();

    let removed = sim
        .apply_damage(id, 37, DamageSource::Attack(None), &mut world)
        .unwrap();

    assert_eq!(removed, 37);
    assert_eq!(sim.structure(id).unwrap().health(), 163);
    let (_, fraction, cause) = *world.displays.last().unwrap();
    assert_eq!(cause, RatioCause::Attack);
    assert_eq!(fraction, fixed(163) / fixed(200));
}

#[test]
fn test_damage_to_unknown_structure_fails() {
    let mut sim = Simulation::default();
    let mut world = SandboxWorld::new();

    let result = sim.apply_damage(StructureId(99), 10, DamageSource::Decay, &mut world);
    assert_eq!(result, Err(GameError::StructureNotFound(StructureId(99))));
}

#[test]
fn test_lethal_damage_destroys_whole_group_once() {
    let mut sim = Simulation::default();
    let mut world = SandboxWorld::new();
    let ids = spawn_linked(&mut sim, &mut world, &[50, 80, 120]);
    sim.bus_mut().take_published();

    sim.apply_damage(ids[2], 10_000, DamageSource::Attack(None), &mut world)
        .unwrap();

    let events = sim.bus_mut().take_published();
    let mut destroyed = destroyed_events(&events);
    destroyed.sort();
    assert_eq!(destroyed, ids);
    assert!(sim.registry().is_empty());
    assert_eq!(sim.registry().group_count(), 0);
}

// =============================================================================
// Destruction
// =============================================================================

#[test]
fn test_destruction_unlinks_from_group() {
    let mut sim = Simulation::default();
    let mut world = SandboxWorld::new();
    let poses: Vec<Pose> = (0..3)
        .map(|i| Pose::at(Vec3Fixed::from_ints(i * 4, 0, 0)))
        .collect();
    let ids = sim
        .spawn_group(&wall_blueprint(), PlayerId(0), &poses, &mut world)
        .unwrap();
    assert_eq!(
        sim.structure(ids[0]).unwrap().construction_needed(),
        fixed(90)
    );
    sim.bus_mut().take_published();

    sim.destroy_structure(ids[1], &mut world).unwrap();

    for survivor in [ids[0], ids[2]] {
        assert_eq!(sim.registry().siblings(survivor).len(), 1);
        assert_eq!(
            sim.structure(survivor).unwrap().construction_needed(),
            fixed(60)
        );
    }
    let events = sim.bus_mut().take_published();
    assert_eq!(destroyed_events(&events), vec![ids[1]]);

    // Second destruction is rejected and publishes nothing.
    assert!(sim.destroy_structure(ids[1], &mut world).is_err());
    assert!(destroyed_events(&sim.bus_mut().take_published()).is_empty());
}

#[test]
fn test_group_dissolves_below_two_members() {
    let mut sim = Simulation::default();
    let mut world = SandboxWorld::new();
    let ids = spawn_linked(&mut sim, &mut world, &[100, 100]);

    sim.destroy_structure(ids[0], &mut world).unwrap();

    assert_eq!(sim.registry().group_of(ids[1]), None);
    assert_eq!(sim.registry().group_members(ids[1]), vec![ids[1]]);
    assert_eq!(sim.structure(ids[1]).unwrap().construction_needed(), fixed(10));
}

#[test]
fn test_destruction_settles_population_and_skill_points() {
    let mut sim = Simulation::default();
    let mut world = SandboxWorld::new();
    let id = sim
        .spawn_preplaced(&outpost_blueprint(), PlayerId(2), Pose::default(), &mut world)
        .unwrap();
    assert_eq!(world.population_cap[&PlayerId(2)], 5);

    sim.apply_damage(id, 400, DamageSource::Attack(Some(1)), &mut world)
        .unwrap();

    assert!(sim.structure(id).is_none());
    assert_eq!(world.population_cap[&PlayerId(2)], 0);
    assert_eq!(world.skill_points[&PlayerId(2)], 10);
    assert!(sim.scheduler().is_empty());
}

#[test]
fn test_survivor_display_refreshed_on_regroup() {
    let mut sim = Simulation::default();
    let mut world = SandboxWorld::new();
    let ids = spawn_linked(&mut sim, &mut world, &[100, 100, 100]);
    world.displays.clear();

    sim.destroy_structure(ids[0], &mut world).unwrap();

    let regrouped: Vec<StructureId> = world
        .displays
        .iter()
        .filter(|(_, _, cause)| *cause == RatioCause::Regroup)
        .map(|(id, _, _)| *id)
        .collect();
    assert_eq!(regrouped, vec![ids[1], ids[2]]);
}

// =============================================================================
// Property-based tests using proptest
// =============================================================================

proptest! {
    /// Survivors of any damage sequence stay within one health point of a
    /// shared ratio.
    #[test]
    fn prop_sibling_ratios_stay_together(
        max_health in arb_group_max_health(),
        hits in proptest::collection::vec((0usize..8, arb_damage()), 1..25),
    ) {
        let mut sim = Simulation::default();
        let mut world = SandboxWorld::new();
        let ids = spawn_linked(&mut sim, &mut world, &max_health);

        for (pick, amount) in hits {
            let alive: Vec<StructureId> = ids
                .iter()
                .copied()
                .filter(|&id| sim.structure(id).is_some())
                .collect();
            if alive.is_empty() {
                break;
            }
            let target = alive[pick % alive.len()];
            sim.apply_damage(target, amount, DamageSource::Attack(None), &mut world)
                .unwrap();
            assert_ratios_within_one_point(&sim, &ids);
        }
    }

    /// A group never loses more health than was dealt plus one point per
    /// member of rounding.
    #[test]
    fn prop_group_damage_is_bounded(
        max_health in arb_group_max_health(),
        amount in arb_damage(),
    ) {
        let mut sim = Simulation::default();
        let mut world = SandboxWorld::new();
        let ids = spawn_linked(&mut sim, &mut world, &max_health);

        let removed = sim
            .apply_damage(ids[0], amount, DamageSource::Attack(None), &mut world)
            .unwrap();

        prop_assert!(removed <= amount + ids.len() as u32);
        prop_assert!(removed + ids.len() as u32 >= amount.min(max_health.iter().sum()));
    }

    /// A structure outside any group loses exactly the damage dealt.
    #[test]
    fn prop_ungrouped_damage_is_exact(max_health in arb_health(), amount in arb_damage()) {
        let mut sim = Simulation::default();
        let mut world = SandboxWorld::new();
        let ids = spawn_linked(&mut sim, &mut world, &[max_health]);

        let removed = sim
            .apply_damage(ids[0], amount, DamageSource::Attack(None), &mut world)
            .unwrap();

        prop_assert_eq!(removed, amount.min(max_health));
        match sim.structure(ids[0]) {
            Some(s) => prop_assert_eq!(s.health(), max_health - amount),
            None => prop_assert!(amount >= max_health),
        }
    }
}

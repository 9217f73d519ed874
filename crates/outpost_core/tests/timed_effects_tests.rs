//! Decay and area heal over simulated time.

use outpost_core::events::GameEvent;
use outpost_core::math::{Fixed, Vec3Fixed};
use outpost_core::scheduler::{DayPhase, EffectKind};
use outpost_core::simulation::Simulation;
use outpost_core::structure::{PlayerId, Pose, Structure, StructureId};
use outpost_test_utils::determinism::strategies::arb_time_steps;
use outpost_test_utils::fixtures::{barricade_blueprint, fixed, outpost_blueprint};
use outpost_test_utils::SandboxWorld;
use proptest::prelude::*;

const FAR_AWAY: i32 = 80;

fn destroyed_count(events: &[GameEvent], id: StructureId) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, GameEvent::StructureDestroyed { structure, .. } if *structure == id))
        .count()
}

fn spawn_barricade(sim: &mut Simulation, world: &mut SandboxWorld, x: i32) -> StructureId {
    sim.spawn_preplaced(
        &barricade_blueprint(),
        PlayerId(0),
        Pose::at(Vec3Fixed::from_ints(x, 0, 0)),
        world,
    )
    .unwrap()
}

/// Advance by `dt` until the clock passes `until`, collecting events and
/// checking that health never rises.
fn run_until(
    sim: &mut Simulation,
    world: &mut SandboxWorld,
    id: StructureId,
    steps: &[Fixed],
    until: Fixed,
) -> Vec<GameEvent> {
    let mut events = Vec::new();
    let mut last_health = sim.structure(id).map_or(0, |s| s.health());
    let mut i = 0;
    while sim.clock() < until {
        events.extend(sim.advance(steps[i % steps.len()], world));
        i += 1;

        let health = sim.structure(id).map_or(0, |s| s.health());
        assert!(health <= last_health, "health rose from {last_health} to {health}");
        last_health = health;
    }
    events
}

// =============================================================================
// Decay
// =============================================================================

#[test]
fn test_decay_reaches_zero_with_fixed_ticks() {
    let mut sim = Simulation::default();
    let mut world = SandboxWorld::new();
    let id = spawn_barricade(&mut sim, &mut world, FAR_AWAY);

    let dt = sim.config().tick_duration();
    let events = run_until(&mut sim, &mut world, id, &[dt], fixed(16));

    assert!(sim.structure(id).is_none());
    assert_eq!(destroyed_count(&events, id), 1);
    assert!(!sim.scheduler().has_effect(id, EffectKind::Decay));
}

#[test]
fn test_decay_is_roughly_linear() {
    let mut sim = Simulation::default();
    let mut world = SandboxWorld::new();
    let id = spawn_barricade(&mut sim, &mut world, FAR_AWAY);

    let dt = sim.config().tick_duration();
    run_until(&mut sim, &mut world, id, &[dt], fixed(8));

    // 100 health over 15s, started one tick after placement.
    let health = sim.structure(id).unwrap().health();
    assert!((45..=50).contains(&health), "health {health}");
}

#[test]
fn test_decay_skipped_inside_anchor_range() {
    let mut sim = Simulation::default();
    let mut world = SandboxWorld::new();
    sim.spawn_preplaced(&outpost_blueprint(), PlayerId(0), Pose::default(), &mut world)
        .unwrap();
    sim.tick(&mut world);
    sim.tick(&mut world);
    let id = spawn_barricade(&mut sim, &mut world, 10);

    let dt = sim.config().tick_duration();
    run_until(&mut sim, &mut world, id, &[dt], fixed(20));

    assert_eq!(sim.structure(id).unwrap().health(), 100);
    assert!(!sim.structure(id).unwrap().decay_eligible());
}

#[test]
fn test_enemy_anchor_does_not_protect() {
    let mut sim = Simulation::default();
    let mut world = SandboxWorld::new();
    sim.spawn_preplaced(&outpost_blueprint(), PlayerId(1), Pose::default(), &mut world)
        .unwrap();
    sim.tick(&mut world);
    sim.tick(&mut world);
    let id = spawn_barricade(&mut sim, &mut world, 10);

    sim.tick(&mut world);
    sim.tick(&mut world);

    assert!(sim.structure(id).unwrap().decay_eligible());
}

#[test]
fn test_disabling_decay_keeps_remaining_health() {
    let mut sim = Simulation::default();
    let mut world = SandboxWorld::new();
    let id = spawn_barricade(&mut sim, &mut world, FAR_AWAY);

    let dt = sim.config().tick_duration();
    run_until(&mut sim, &mut world, id, &[dt], fixed(3));
    sim.set_decay_eligible(id, false).unwrap();
    let frozen = sim.structure(id).unwrap().health();

    run_until(&mut sim, &mut world, id, &[dt], fixed(20));
    assert_eq!(sim.structure(id).unwrap().health(), frozen);
    assert!(frozen < 100);
}

// =============================================================================
// Area Heal
// =============================================================================

#[test]
fn test_heal_cancelled_by_enemy_in_range() {
    let mut sim = Simulation::default();
    let mut world = SandboxWorld::new();
    sim.spawn_preplaced(&outpost_blueprint(), PlayerId(0), Pose::default(), &mut world)
        .unwrap();
    world.add_unit(1, PlayerId(0), Vec3Fixed::from_ints(2, 0, 2), 5, 10);
    world.add_unit(2, PlayerId(1), Vec3Fixed::from_ints(3, 0, 0), 10, 10);

    let dt = sim.config().tick_duration();
    while sim.clock() < fixed(5) {
        sim.advance(dt, &mut world);
    }
    assert_eq!(world.unit_health(1), Some(5));

    world.remove_unit(2);
    while sim.clock() < fixed(9) {
        sim.advance(dt, &mut world);
    }
    assert_eq!(world.unit_health(1), Some(7));
}

#[test]
fn test_dead_enemy_does_not_block_heal() {
    let mut sim = Simulation::default();
    let mut world = SandboxWorld::new();
    sim.spawn_preplaced(&outpost_blueprint(), PlayerId(0), Pose::default(), &mut world)
        .unwrap();
    world.add_unit(1, PlayerId(0), Vec3Fixed::from_ints(1, 0, 1), 4, 10);
    world.add_unit(2, PlayerId(1), Vec3Fixed::from_ints(2, 0, 0), 0, 10);

    let dt = sim.config().tick_duration();
    while sim.clock() < fixed(4) {
        sim.advance(dt, &mut world);
    }
    assert_eq!(world.unit_health(1), Some(8));
}

#[test]
fn test_heal_begins_when_construction_finishes() {
    let mut sim = Simulation::default();
    let mut world = SandboxWorld::new();
    let outpost = Structure::new(&outpost_blueprint(), PlayerId(0)).unwrap();
    let id = sim.place_structure(outpost, &mut world).unwrap();
    world.add_unit(1, PlayerId(0), Vec3Fixed::from_ints(1, 0, 1), 4, 10);

    let dt = sim.config().tick_duration();
    while sim.clock() < fixed(5) {
        sim.advance(dt, &mut world);
    }
    assert_eq!(world.unit_health(1), Some(4));

    sim.contribute_construction(id, fixed(60), &mut world).unwrap();
    sim.advance(dt, &mut world);
    assert_eq!(world.unit_health(1), Some(6));

    while sim.clock() < fixed(7) {
        sim.advance(dt, &mut world);
    }
    assert_eq!(world.unit_health(1), Some(6));
}

#[test]
fn test_heal_waits_for_day() {
    let mut sim = Simulation::default();
    let mut world = SandboxWorld::new();
    sim.spawn_preplaced(&outpost_blueprint(), PlayerId(0), Pose::default(), &mut world)
        .unwrap();
    world.add_unit(1, PlayerId(0), Vec3Fixed::from_ints(1, 0, 1), 4, 10);
    sim.set_day_phase(DayPhase::Night);

    let dt = sim.config().tick_duration();
    while sim.clock() < fixed(7) {
        sim.advance(dt, &mut world);
    }
    assert_eq!(world.unit_health(1), Some(4));

    sim.set_day_phase(DayPhase::Day);
    while sim.clock() < fixed(10) {
        sim.advance(dt, &mut world);
    }
    assert_eq!(world.unit_health(1), Some(6));
}

// =============================================================================
// Property-based tests using proptest
// =============================================================================

proptest! {
    /// Decay ends in exactly one destruction whatever the frame times.
    #[test]
    fn prop_decay_terminates_with_variable_frames(steps in arb_time_steps(40)) {
        let mut sim = Simulation::default();
        let mut world = SandboxWorld::new();
        let id = spawn_barricade(&mut sim, &mut world, FAR_AWAY);

        // Two start-up ticks of at most 250ms each precede the decay.
        let until = fixed(15) + fixed(1);
        let events = run_until(&mut sim, &mut world, id, &steps, until);

        prop_assert!(sim.structure(id).is_none());
        prop_assert_eq!(destroyed_count(&events, id), 1);
    }
}

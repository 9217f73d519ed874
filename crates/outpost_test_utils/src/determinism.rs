//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Structure simulation must be reproducible for replays and lockstep
//! play. Sources of non-determinism include:
//!
//! - **Floating-point math**: Different CPUs can produce different results.
//!   We use fixed-point arithmetic via [`outpost_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   We always iterate in sorted structure id order.
//!
//! - **System randomness**: No calls to `rand()` without explicit seeds.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual effect determinism (decay, heal, damage)
//! 2. **Property tests**: Random inputs must still produce deterministic outputs
//! 3. **Integration tests**: Scripted sessions are reproducible

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use outpost_core::simulation::Simulation;

use crate::world::SandboxWorld;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick (receives the tick index)
/// * `hash` - Function to compute state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S, u64),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for tick in 0..ticks {
            step(&mut state, tick);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run a scripted sandbox session twice and compare final state hashes.
///
/// `script` runs before every tick and may place structures, apply damage
/// or change the day phase.
pub fn verify_simulation_determinism<F, Script>(
    setup_fn: F,
    script: Script,
    num_ticks: u64,
) -> DeterminismResult
where
    F: Fn() -> (Simulation, SandboxWorld),
    Script: Fn(u64, &mut Simulation, &mut SandboxWorld),
{
    verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |(sim, world), tick| {
            script(tick, sim, world);
            sim.tick(world);
        },
        |(sim, world)| compute_hash(&(sim.state_hash(), &world.units)),
    )
}

/// Run N simulations on scoped threads and collect final hashes.
///
/// Each simulation is built inside its own thread.
pub fn run_parallel_simulations_scoped<F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> Vec<u64>
where
    F: Fn() -> (Simulation, SandboxWorld) + Sync,
{
    thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let (mut sim, mut world) = setup_fn();
                    for _ in 0..num_ticks {
                        sim.tick(&mut world);
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_default())
            .collect()
    })
}

/// Compare two simulation runs tick-by-tick, finding first divergence.
///
/// # Returns
///
/// `None` if simulations are deterministic, `Some(tick)` if they diverge
/// at that tick.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> (Simulation, SandboxWorld),
{
    let (mut sim1, mut world1) = setup_fn();
    let (mut sim2, mut world2) = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        sim1.tick(&mut world1);
        sim2.tick(&mut world2);

        if sim1.state_hash() != sim2.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for simulation testing.
pub mod strategies {
    use outpost_core::math::{Fixed, Vec3Fixed};
    use proptest::prelude::*;

    /// Generate a fixed-point coordinate within a small map.
    pub fn arb_fixed_position() -> impl Strategy<Value = Fixed> {
        (-200i32..200i32).prop_map(Fixed::from_num)
    }

    /// Generate a point on the ground plane.
    pub fn arb_ground_position() -> impl Strategy<Value = Vec3Fixed> {
        (arb_fixed_position(), arb_fixed_position())
            .prop_map(|(x, z)| Vec3Fixed::new(x, Fixed::ZERO, z))
    }

    /// Generate max health values (1-1000).
    pub fn arb_health() -> impl Strategy<Value = u32> {
        1u32..1000u32
    }

    /// Generate damage values (1-100).
    pub fn arb_damage() -> impl Strategy<Value = u32> {
        1u32..100u32
    }

    /// Generate max health for each member of a sibling group (2-8 members).
    pub fn arb_group_max_health() -> impl Strategy<Value = Vec<u32>> {
        proptest::collection::vec(10u32..500u32, 2..8)
    }

    /// Generate a frame time between 1ms and 250ms.
    pub fn arb_time_step() -> impl Strategy<Value = Fixed> {
        (1i32..=250i32).prop_map(|ms| Fixed::from_num(ms) / Fixed::from_num(1000))
    }

    /// Generate a sequence of frame times.
    pub fn arb_time_steps(max_len: usize) -> impl Strategy<Value = Vec<Fixed>> {
        proptest::collection::vec(arb_time_step(), 1..max_len)
    }
}

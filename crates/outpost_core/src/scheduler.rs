//! Per-structure background effects.
//!
//! Each effect is a small state machine parked in the scheduler with a wake
//! condition. Once per tick the simulation takes every ready task, runs it
//! and, if the effect continues, schedules it again. Cancelling is simply
//! dropping the parked task.
//!
//! Tasks scheduled while a tick is being processed are not considered until
//! the following tick, which gives "wait one tick" semantics for free.

use serde::{Deserialize, Serialize};

use crate::math::Fixed;
use crate::structure::StructureId;

/// Externally driven time of day. Area healing only runs during the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DayPhase {
    /// Healing is active.
    #[default]
    Day,
    /// Healing is paused.
    Night,
}

/// When a parked task becomes ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Wake {
    /// On the next tick.
    NextTick,
    /// Once the simulation clock reaches this time (seconds).
    At(Fixed),
    /// Once the structure has completed construction.
    WhenComplete,
}

/// Periodic heal of friendly units around an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HealProcess {
    /// Seconds between heal checks.
    pub interval: Fixed,
    /// Health restored per unit per check.
    pub amount: u32,
}

/// Linear decay to zero health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecayProcess {
    /// Health lost per second.
    pub rate: Fixed,
    /// Fractional health owed but not yet applied.
    pub accumulator: Fixed,
    /// Seconds the process has been running.
    pub elapsed: Fixed,
    /// Seconds after which all remaining health is gone.
    pub duration: Fixed,
}

impl DecayProcess {
    /// Whole-unit slack when extracting health from the accumulator.
    ///
    /// Covers the truncation of `rate * dt` over many ticks.
    pub const EPSILON: Fixed = Fixed::from_bits(1 << 16);

    /// Decay from `max_health` to zero over `duration` seconds.
    #[must_use]
    pub fn new(max_health: u32, duration: Fixed) -> Self {
        let rate = if duration > Fixed::ZERO {
            Fixed::from_num(max_health) / duration
        } else {
            Fixed::from_num(max_health)
        };
        Self {
            rate,
            accumulator: Fixed::ZERO,
            elapsed: Fixed::ZERO,
            duration,
        }
    }

    /// Advance by `dt` seconds and return the whole health units now due.
    ///
    /// Once the full duration has elapsed `None` is returned, meaning every
    /// remaining point is due.
    pub fn advance(&mut self, dt: Fixed) -> Option<u32> {
        self.elapsed = self.elapsed.saturating_add(dt);
        if self.elapsed >= self.duration {
            self.accumulator = Fixed::ZERO;
            return None;
        }

        self.accumulator = self.accumulator.saturating_add(self.rate.saturating_mul(dt));
        let whole = (self.accumulator + Self::EPSILON).floor();
        if whole < Fixed::ONE {
            return Some(0);
        }
        self.accumulator = (self.accumulator - whole).max(Fixed::ZERO);
        Some(whole.to_num::<u32>())
    }
}

/// The work a parked task performs when it wakes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    /// Post-completion setup (anchor registration, decay eligibility).
    ///
    /// `deferred` is set once the structure completed and the one-tick
    /// delay has been scheduled.
    CompletionInit {
        /// Whether the one-tick delay has already been taken.
        deferred: bool,
    },
    /// Periodic area heal.
    AreaHeal(HealProcess),
    /// Running decay.
    Decay(DecayProcess),
}

/// Effect discriminant for targeted cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    /// [`Effect::CompletionInit`]
    CompletionInit,
    /// [`Effect::AreaHeal`]
    AreaHeal,
    /// [`Effect::Decay`]
    Decay,
}

impl Effect {
    /// The kind of this effect.
    #[must_use]
    pub const fn kind(&self) -> EffectKind {
        match self {
            Self::CompletionInit { .. } => EffectKind::CompletionInit,
            Self::AreaHeal(_) => EffectKind::AreaHeal,
            Self::Decay(_) => EffectKind::Decay,
        }
    }
}

/// A parked effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduledTask {
    /// Owning structure.
    pub structure: StructureId,
    /// What to run.
    pub effect: Effect,
    /// When it becomes ready.
    pub wake: Wake,
    seq: u64,
}

/// Queue of parked effects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EffectScheduler {
    tasks: Vec<ScheduledTask>,
    next_seq: u64,
}

impl EffectScheduler {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Park an effect for a structure.
    pub fn schedule(&mut self, structure: StructureId, effect: Effect, wake: Wake) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.tasks.push(ScheduledTask {
            structure,
            effect,
            wake,
            seq,
        });
    }

    /// Remove and return every ready task, ordered by structure then by
    /// scheduling order.
    pub fn take_ready(
        &mut self,
        now: Fixed,
        is_complete: impl Fn(StructureId) -> bool,
    ) -> Vec<ScheduledTask> {
        let (mut ready, parked): (Vec<_>, Vec<_>) =
            self.tasks.drain(..).partition(|task| match task.wake {
                Wake::NextTick => true,
                Wake::At(due) => now >= due,
                Wake::WhenComplete => is_complete(task.structure),
            });
        self.tasks = parked;
        ready.sort_by_key(|task| (task.structure, task.seq));
        ready
    }

    /// Drop every task of a structure. Returns how many were dropped.
    pub fn cancel(&mut self, structure: StructureId) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.structure != structure);
        before - self.tasks.len()
    }

    /// Drop one kind of task for a structure.
    pub fn cancel_effect(&mut self, structure: StructureId, kind: EffectKind) -> usize {
        let before = self.tasks.len();
        self.tasks
            .retain(|task| task.structure != structure || task.effect.kind() != kind);
        before - self.tasks.len()
    }

    /// Whether a task of this kind is parked for the structure.
    #[must_use]
    pub fn has_effect(&self, structure: StructureId, kind: EffectKind) -> bool {
        self.tasks
            .iter()
            .any(|task| task.structure == structure && task.effect.kind() == kind)
    }

    /// Parked tasks, in scheduling order.
    #[must_use]
    pub fn tasks(&self) -> &[ScheduledTask] {
        &self.tasks
    }

    /// Number of parked tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether nothing is parked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

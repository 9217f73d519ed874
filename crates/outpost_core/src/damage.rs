//! Sibling damage distribution and structure destruction.
//!
//! Damage to one member of a sibling group is spread so that every member
//! ends at the same health ratio. The target's new ratio is
//!
//! ```text
//! r = health(t) / max(t) - amount / Σ health(m)
//! ```
//!
//! and each member `m` loses `ceil(health(m) - r * max(m))`, clamped to
//! `[0, health(m)]`. The expression is evaluated as an exact rational in
//! `i128`, so the `ceil` is the only rounding step.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{GameError, Result};
use crate::events::GameEvent;
use crate::math::div_ceil_i128;
use crate::services::{AgentId, GameServices};
use crate::simulation::Simulation;
use crate::structure::{RatioCause, StructureId};

/// Where damage came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageSource {
    /// An attack, optionally by a known agent.
    Attack(Option<AgentId>),
    /// Passive decay.
    Decay,
}

impl DamageSource {
    /// Ratio-change cause recorded on damaged structures.
    #[must_use]
    pub const fn cause(self) -> RatioCause {
        match self {
            Self::Attack(_) => RatioCause::Attack,
            Self::Decay => RatioCause::Decay,
        }
    }
}

/// The group-wide target ratio of one damage event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedRatio {
    target_health: i128,
    target_max: i128,
    amount: i128,
    total_health: i128,
}

impl SharedRatio {
    /// Capture the target's state and the group's total health.
    #[must_use]
    pub fn new(target_health: u32, target_max: u32, amount: u32, total_health: u64) -> Self {
        Self {
            target_health: i128::from(target_health),
            target_max: i128::from(target_max.max(1)),
            amount: i128::from(amount),
            total_health: i128::from(total_health),
        }
    }

    /// Health a member with `health`/`max_health` must lose.
    #[must_use]
    pub fn damage_for(&self, health: u32, max_health: u32) -> u32 {
        if self.total_health == 0 {
            return health;
        }
        let h = i128::from(health);
        let max = i128::from(max_health);
        let t = self.total_health;

        // h - (h_t/max_t - a/T) * max, over the common denominator max_t * T
        let numerator =
            h * self.target_max * t - (self.target_health * t - self.amount * self.target_max) * max;
        let denominator = self.target_max * t;

        let damage = div_ceil_i128(numerator, denominator).clamp(0, h);
        u32::try_from(damage).unwrap_or(health)
    }
}

impl Simulation {
    /// Damage a structure, spreading it across its sibling group.
    ///
    /// An ungrouped structure loses exactly `amount` (floored at zero
    /// health). Grouped members are processed in id order with the target
    /// last; members destroyed along the way are skipped.
    ///
    /// Returns the total health removed across the group.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::StructureNotFound`] if the target is not in the
    /// registry.
    pub fn apply_damage(
        &mut self,
        target: StructureId,
        amount: u32,
        source: DamageSource,
        services: &mut dyn GameServices,
    ) -> Result<u32> {
        let members = self.registry.group_members(target);
        if members.is_empty() {
            return Err(GameError::StructureNotFound(target));
        }
        if amount == 0 {
            return Ok(0);
        }
        if members.len() == 1 {
            return Ok(self.apply_damage_direct(target, amount, source, services));
        }

        let total_health: u64 = members
            .iter()
            .filter_map(|&id| self.registry.get(id))
            .map(|s| u64::from(s.health()))
            .sum();
        let Some(t) = self.registry.get(target) else {
            return Err(GameError::StructureNotFound(target));
        };
        let shared = SharedRatio::new(t.health(), t.max_health(), amount, total_health);

        #[cfg(feature = "debug-validation")]
        let in_sync = self.group_ratios_equal(&members);

        debug!(
            structure = target.0,
            amount,
            members = members.len(),
            total_health,
            "distributing damage"
        );

        let mut removed = 0;
        let order = members
            .iter()
            .copied()
            .filter(|&id| id != target)
            .chain(std::iter::once(target));
        for id in order {
            let Some(member) = self.registry.get(id) else {
                trace!(structure = id.0, "sibling already destroyed, skipping");
                continue;
            };
            let damage = shared.damage_for(member.health(), member.max_health());
            removed += self.apply_damage_direct(id, damage, source, services);
        }

        #[cfg(feature = "debug-validation")]
        if in_sync {
            self.assert_group_ratio_tolerance(&members);
        }

        Ok(removed)
    }

    /// Remove health from one structure without touching its siblings.
    ///
    /// Refreshes the construction ratio from the new health fraction, tags
    /// the change with the damage cause and destroys the structure at zero
    /// health. Stale ids remove nothing.
    pub(crate) fn apply_damage_direct(
        &mut self,
        id: StructureId,
        amount: u32,
        source: DamageSource,
        services: &mut dyn GameServices,
    ) -> u32 {
        let Some(structure) = self.registry.get_mut(id) else {
            trace!(structure = id.0, "damage to missing structure ignored");
            return 0;
        };
        if amount == 0 {
            return 0;
        }

        let cause = source.cause();
        let removed = structure.take_damage_direct(amount, cause);
        let destroyed = structure.is_destroyed();
        let fraction = structure.display_fraction();
        trace!(
            structure = id.0,
            removed,
            health = structure.health(),
            "damage applied"
        );

        services.structure_display(id, fraction, cause);
        if removed > 0 {
            self.bus.publish(GameEvent::StructureDamaged {
                structure: id,
                amount: removed,
                source,
            });
        }
        if destroyed {
            // Cannot fail: the structure was present above.
            let _ = self.destroy_structure(id, services);
        }
        removed
    }

    /// Remove a structure from the simulation.
    ///
    /// Unlinks it from its siblings (which keep their ratio while their
    /// shared requirement shrinks), drops it from the anchor list, cancels
    /// its scheduled effects, revokes its population cap, awards its skill
    /// points and publishes [`GameEvent::StructureDestroyed`].
    ///
    /// # Errors
    ///
    /// Returns [`GameError::StructureNotFound`] if the structure is not in
    /// the registry, which also guarantees the destruction event is
    /// published at most once.
    pub fn destroy_structure(
        &mut self,
        id: StructureId,
        services: &mut dyn GameServices,
    ) -> Result<()> {
        let removed = self
            .registry
            .remove(id)
            .ok_or(GameError::StructureNotFound(id))?;
        let cancelled = self.scheduler.cancel(id);
        let structure = &removed.structure;
        let owner = structure.owner();

        debug!(
            structure = id.0,
            blueprint = %structure.blueprint().id,
            siblings = removed.former_siblings.len(),
            cancelled,
            "structure destroyed"
        );

        let granted = structure.blueprint().population_cost_granted;
        if granted != 0 {
            services.adjust_population_cap(owner, -granted);
        }
        let points = structure.blueprint().skill_points;
        if points != 0 {
            services.award_skill_points(owner, points);
        }

        for &sibling in &removed.former_siblings {
            if let Some(s) = self.registry.get(sibling) {
                services.structure_display(sibling, s.display_fraction(), RatioCause::Regroup);
            }
        }

        self.bus.publish(GameEvent::StructureDestroyed {
            structure: id,
            owner,
        });
        Ok(())
    }

    #[cfg(feature = "debug-validation")]
    fn group_ratios_equal(&self, members: &[StructureId]) -> bool {
        let ratios: Vec<(u64, u64)> = members
            .iter()
            .filter_map(|&id| self.registry.get(id))
            .map(|s| (u64::from(s.health()), u64::from(s.max_health())))
            .collect();
        ratios
            .windows(2)
            .all(|pair| pair[0].0 * pair[1].1 == pair[1].0 * pair[0].1)
    }

    #[cfg(feature = "debug-validation")]
    fn assert_group_ratio_tolerance(&self, members: &[StructureId]) {
        let survivors: Vec<(u64, u64)> = members
            .iter()
            .filter_map(|&id| self.registry.get(id))
            .map(|s| (u64::from(s.health()), u64::from(s.max_health())))
            .collect();
        for a in &survivors {
            for b in &survivors {
                let drift = (a.0 * b.1).abs_diff(b.0 * a.1);
                assert!(
                    drift < a.1.max(b.1),
                    "sibling health ratios drifted apart: {a:?} vs {b:?}"
                );
            }
        }
    }
}

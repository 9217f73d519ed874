//! The structure entity: health, construction progress and placement state.
//!
//! A structure never references its siblings directly. Group membership is
//! kept by [`crate::registry::StructureRegistry`]; the structure only stores
//! the group total it shares (`construction_needed`).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::blueprint::StructureBlueprint;
use crate::error::Result;
use crate::math::{Fixed, Vec3Fixed};
use crate::placement::ColliderKind;

/// Handle to a structure stored in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StructureId(pub u64);

impl fmt::Display for StructureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Controlling player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u8);

/// Why a construction ratio changed.
///
/// Downstream observers use this to tell damage from decay from building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RatioCause {
    /// Work was contributed; health follows the ratio.
    Construction,
    /// Health dropped because of an attack.
    Attack,
    /// Health dropped because of decay.
    Decay,
    /// The sibling group shrank; the ratio is preserved.
    Regroup,
}

/// World pose: position plus yaw around +Y in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Pose {
    /// World position of the structure origin.
    pub position: Vec3Fixed,
    /// Yaw in degrees.
    #[serde(with = "crate::math::decimal_serde")]
    pub yaw: Fixed,
}

impl Pose {
    /// Create a pose.
    #[must_use]
    pub const fn new(position: Vec3Fixed, yaw: Fixed) -> Self {
        Self { position, yaw }
    }

    /// Unrotated pose at a position.
    #[must_use]
    pub const fn at(position: Vec3Fixed) -> Self {
        Self {
            position,
            yaw: Fixed::ZERO,
        }
    }
}

/// State of one buildable structure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Structure {
    blueprint: StructureBlueprint,
    owner: PlayerId,
    pose: Pose,
    health: u32,
    construction_needed: Fixed,
    construction_done: Fixed,
    is_complete: bool,
    is_fixed: bool,
    overlap_count: u32,
    decay_eligible: bool,
}

impl Structure {
    /// Create an unplaced structure from a blueprint.
    ///
    /// Fails fast on blueprint configuration errors. Health starts at the
    /// blueprint's initial construction ratio (at least 1 point).
    pub fn new(blueprint: &StructureBlueprint, owner: PlayerId) -> Result<Self> {
        blueprint.validate()?;

        let mut structure = Self {
            blueprint: blueprint.clone(),
            owner,
            pose: Pose::default(),
            health: blueprint.health,
            construction_needed: blueprint.construction_needed,
            construction_done: Fixed::ZERO,
            is_complete: false,
            is_fixed: false,
            overlap_count: 0,
            decay_eligible: false,
        };
        structure.set_construction_ratio(
            blueprint.initial_construction_ratio,
            RatioCause::Construction,
        );
        Ok(structure)
    }

    /// The blueprint this structure was built from.
    #[must_use]
    pub fn blueprint(&self) -> &StructureBlueprint {
        &self.blueprint
    }

    /// Controlling player.
    #[must_use]
    pub const fn owner(&self) -> PlayerId {
        self.owner
    }

    /// Current pose.
    #[must_use]
    pub const fn pose(&self) -> Pose {
        self.pose
    }

    /// Move the structure. Ignored once it is fixed in place.
    pub fn set_pose(&mut self, pose: Pose) {
        if !self.is_fixed {
            self.pose = pose;
        }
    }

    /// Current health.
    #[must_use]
    pub const fn health(&self) -> u32 {
        self.health
    }

    /// Maximum health.
    #[must_use]
    pub const fn max_health(&self) -> u32 {
        self.blueprint.health
    }

    /// Health as a fraction of maximum.
    #[must_use]
    pub fn health_ratio(&self) -> Fixed {
        Fixed::from_num(self.health) / Fixed::from_num(self.max_health())
    }

    /// Whether health has reached zero.
    #[must_use]
    pub const fn is_destroyed(&self) -> bool {
        self.health == 0
    }

    /// Work this structure alone requires.
    #[must_use]
    pub fn requirement(&self) -> Fixed {
        self.blueprint.construction_needed
    }

    /// Total work of the sibling group this structure shares.
    #[must_use]
    pub const fn construction_needed(&self) -> Fixed {
        self.construction_needed
    }

    /// Work still outstanding.
    #[must_use]
    pub fn construction_remaining(&self) -> Fixed {
        (self.construction_needed - self.construction_done).max(Fixed::ZERO)
    }

    /// Fraction of construction already completed, within `[0, 1]`.
    #[must_use]
    pub fn construction_ratio(&self) -> Fixed {
        if self.construction_needed <= Fixed::ZERO {
            return Fixed::ONE;
        }
        (self.construction_done / self.construction_needed).clamp(Fixed::ZERO, Fixed::ONE)
    }

    /// Whether construction has ever reached 100%.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.is_complete
    }

    /// Whether the structure has been placed (no longer a phantom).
    #[must_use]
    pub const fn is_fixed(&self) -> bool {
        self.is_fixed
    }

    /// Whether the structure is operational.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.is_complete
    }

    /// Whether decay is currently switched on for this structure.
    #[must_use]
    pub const fn decay_eligible(&self) -> bool {
        self.decay_eligible
    }

    /// Number of non-terrain colliders overlapping the footprint.
    #[must_use]
    pub const fn overlap_count(&self) -> u32 {
        self.overlap_count
    }

    /// Fraction shown on the healthbar.
    #[must_use]
    pub fn display_fraction(&self) -> Fixed {
        if self.is_complete {
            self.health_ratio()
        } else {
            self.construction_ratio()
        }
    }

    /// Set the construction ratio.
    ///
    /// Only [`RatioCause::Construction`] moves health along with the ratio;
    /// the other causes record a ratio that already reflects health.
    pub fn set_construction_ratio(&mut self, ratio: Fixed, cause: RatioCause) {
        let ratio = ratio.clamp(Fixed::ZERO, Fixed::ONE);
        self.construction_done = ratio * self.construction_needed;
        if ratio >= Fixed::ONE {
            self.construction_done = self.construction_needed;
            self.is_complete = true;
        }

        if cause == RatioCause::Construction {
            let scaled = (ratio * Fixed::from_num(self.max_health())).ceil();
            self.health = scaled.to_num::<u32>().clamp(1, self.max_health());
        }
    }

    /// Change the group total while keeping the current ratio.
    pub(crate) fn set_construction_needed(&mut self, needed: Fixed) {
        let ratio = self.construction_ratio();
        self.construction_needed = needed.max(Fixed::ZERO);
        self.set_construction_ratio(ratio, RatioCause::Regroup);
    }

    /// Subtract health without touching siblings, then refresh the ratio.
    ///
    /// Returns the health actually removed.
    pub(crate) fn take_damage_direct(&mut self, amount: u32, cause: RatioCause) -> u32 {
        let removed = amount.min(self.health);
        self.health -= removed;
        let ratio = self.health_ratio();
        self.set_construction_ratio(ratio, cause);
        removed
    }

    /// Fix the structure in place.
    pub(crate) fn mark_fixed(&mut self) {
        self.is_fixed = true;
        self.overlap_count = 0;
    }

    pub(crate) fn set_decay_eligible(&mut self, eligible: bool) {
        self.decay_eligible = eligible;
    }

    /// A collider started overlapping the footprint.
    pub fn overlap_begin(&mut self, kind: ColliderKind) {
        if kind != ColliderKind::Terrain {
            self.overlap_count += 1;
        }
    }

    /// A collider stopped overlapping the footprint.
    pub fn overlap_end(&mut self, kind: ColliderKind) {
        if kind != ColliderKind::Terrain {
            self.overlap_count = self.overlap_count.saturating_sub(1);
        }
    }
}

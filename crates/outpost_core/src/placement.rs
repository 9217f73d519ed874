//! Placement validation for phantom structures.
//!
//! A candidate pose is checked in three stages:
//! 1. no overlapping non-terrain colliders and a revealed center,
//! 2. enough ground under the footprint corners,
//! 3. a friendly anchor within range (anchors themselves are exempt).
//!
//! All calculations use fixed-point math for deterministic simulation.

use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::math::{Fixed, Vec3Fixed};
use crate::services::{LayerMask, SpatialQuery, Visibility};
use crate::structure::{PlayerId, Pose, Structure};

/// Maximum number of footprint corners allowed to overhang.
pub const MAX_UNSUPPORTED_CORNERS: usize = 2;

/// Result of placement validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlacementStatus {
    /// Placement is valid.
    Valid,
    /// Buildable ground, but no friendly anchor is close enough.
    OutOfRange,
    /// Obstructed, hidden by fog, or too uneven.
    Invalid,
}

impl PlacementStatus {
    /// Check if placement can be confirmed.
    #[must_use]
    pub fn is_valid(self) -> bool {
        matches!(self, PlacementStatus::Valid)
    }
}

/// Kind of collider reported by the physics layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColliderKind {
    /// Ground; never blocks placement.
    Terrain,
    /// Anything else: units, structures, props.
    Solid,
}

/// Local collision box of a structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Footprint {
    /// Box center relative to the structure origin.
    pub center: Vec3Fixed,
    /// Full box size.
    pub size: Vec3Fixed,
}

impl Footprint {
    /// Create a footprint box.
    #[must_use]
    pub const fn new(center: Vec3Fixed, size: Vec3Fixed) -> Self {
        Self { center, size }
    }

    /// World positions of the four bottom corners, lifted by `lift`.
    ///
    /// Corners are rotated by the pose yaw before being offset by its
    /// position.
    #[must_use]
    pub fn bottom_corners(&self, pose: Pose, lift: Fixed) -> [Vec3Fixed; 4] {
        let c = self.center;
        let e = self.size.scale(Fixed::from_num(0.5));
        let bottom = c.y - e.y + lift;

        [
            Vec3Fixed::new(c.x - e.x, bottom, c.z - e.z),
            Vec3Fixed::new(c.x - e.x, bottom, c.z + e.z),
            Vec3Fixed::new(c.x + e.x, bottom, c.z - e.z),
            Vec3Fixed::new(c.x + e.x, bottom, c.z + e.z),
        ]
        .map(|corner| pose.position + corner.rotate_yaw(pose.yaw))
    }
}

impl Default for Footprint {
    fn default() -> Self {
        Self::new(
            Vec3Fixed::from_ints(0, 1, 0),
            Vec3Fixed::from_ints(2, 2, 2),
        )
    }
}

/// Ground probe settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementRules {
    /// Length of each downward corner probe.
    pub level_threshold: Fixed,
    /// Height above the footprint bottom where probes start.
    pub probe_lift: Fixed,
}

impl From<&SimulationConfig> for PlacementRules {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            level_threshold: config.level_threshold,
            probe_lift: config.probe_lift,
        }
    }
}

impl Default for PlacementRules {
    fn default() -> Self {
        Self::from(&SimulationConfig::default())
    }
}

/// A registered anchor that extends the buildable area of its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorSite {
    /// Anchor position.
    pub position: Vec3Fixed,
    /// Radius within which friendly structures may be placed.
    #[serde(with = "crate::math::decimal_serde")]
    pub safety_range: Fixed,
    /// Owner of the anchor.
    pub owner: PlayerId,
}

/// Count footprint corners with no ground within the probe length.
#[must_use]
pub fn count_unsupported_corners<Q: SpatialQuery + ?Sized>(
    footprint: &Footprint,
    pose: Pose,
    rules: &PlacementRules,
    spatial: &Q,
) -> usize {
    footprint
        .bottom_corners(pose, rules.probe_lift)
        .into_iter()
        .filter(|&corner| {
            spatial
                .query_ray(
                    corner,
                    Vec3Fixed::DOWN,
                    rules.level_threshold,
                    LayerMask::TERRAIN,
                )
                .is_none()
        })
        .count()
}

/// Check obstructions, fog of war and ground level.
///
/// Up to [`MAX_UNSUPPORTED_CORNERS`] corners may overhang.
#[must_use]
pub fn has_valid_placement<Q, V>(
    structure: &Structure,
    rules: &PlacementRules,
    spatial: &Q,
    visibility: &V,
) -> bool
where
    Q: SpatialQuery + ?Sized,
    V: Visibility + ?Sized,
{
    if structure.overlap_count() > 0 {
        return false;
    }

    let pose = structure.pose();
    if !visibility.is_position_revealed(pose.position) {
        return false;
    }

    let unsupported =
        count_unsupported_corners(&structure.blueprint().footprint, pose, rules, spatial);
    unsupported <= MAX_UNSUPPORTED_CORNERS
}

/// Whether `position` lies within the safety range of a friendly anchor.
#[must_use]
pub fn in_range_of_anchors(position: Vec3Fixed, owner: PlayerId, anchors: &[AnchorSite]) -> bool {
    anchors
        .iter()
        .filter(|anchor| anchor.owner == owner)
        .any(|anchor| anchor.position.within_range(position, anchor.safety_range))
}

/// Classify the structure's current pose.
///
/// # Arguments
///
/// * `structure` - The phantom structure, already moved to the candidate pose
/// * `rules` - Ground probe settings
/// * `anchors` - Registered anchors that grant buildable range
///
/// # Returns
///
/// [`PlacementStatus::Invalid`] if the pose is obstructed, hidden or uneven,
/// [`PlacementStatus::OutOfRange`] if no friendly anchor covers it, and
/// [`PlacementStatus::Valid`] otherwise.
#[must_use]
pub fn evaluate_placement<Q, V>(
    structure: &Structure,
    rules: &PlacementRules,
    anchors: &[AnchorSite],
    spatial: &Q,
    visibility: &V,
) -> PlacementStatus
where
    Q: SpatialQuery + ?Sized,
    V: Visibility + ?Sized,
{
    if !has_valid_placement(structure, rules, spatial, visibility) {
        return PlacementStatus::Invalid;
    }

    if !structure.blueprint().is_anchor
        && !in_range_of_anchors(structure.pose().position, structure.owner(), anchors)
    {
        return PlacementStatus::OutOfRange;
    }

    PlacementStatus::Valid
}

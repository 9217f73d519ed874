//! Data-driven structure definitions.
//!
//! Blueprints are pure data loaded from RON. They are validated once, when a
//! [`crate::structure::Structure`] is created from them, so a bad data file
//! fails at placement time and never in the middle of a decay or heal tick.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_DECAY_DURATION_SECS;
use crate::error::{GameError, Result};
use crate::math::{decimal_serde, option_decimal_serde, Fixed, Vec3Fixed};
use crate::placement::Footprint;

/// Data-driven structure definition.
///
/// # Example RON
///
/// ```ron
/// StructureBlueprint(
///     id: "outpost",
///     name: "structure.outpost.name",
///     cost: 150,
///     health: 400,
///     construction_needed: 60.0,
///     footprint: (center: (x: 0.0, y: 1.0, z: 0.0), size: (x: 4.0, y: 2.0, z: 4.0)),
///     safety_range: 25.0,
///     is_anchor: true,
///     heals_area: true,
///     population_cost_granted: 5,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructureBlueprint {
    /// Unique string identifier for this structure type.
    pub id: String,

    /// Localization key for the display name.
    pub name: String,

    /// Resource cost to place this structure.
    pub cost: i32,

    /// Maximum health points.
    pub health: u32,

    /// Work units needed to finish construction of one structure.
    #[serde(with = "decimal_serde")]
    pub construction_needed: Fixed,

    /// Local collision box used for placement checks.
    #[serde(default)]
    pub footprint: Footprint,

    /// Radius of the placement bonus and area heal around anchors.
    #[serde(default, with = "decimal_serde")]
    pub safety_range: Fixed,

    /// Weapon range, zero for unarmed structures.
    #[serde(default, with = "decimal_serde")]
    pub attack_range: Fixed,

    /// Whether the structure decays when left outside anchor cover.
    #[serde(default)]
    pub can_decay: bool,

    /// Seconds for a full-health decay to reach zero.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "option_decimal_serde"
    )]
    pub decay_duration_secs: Option<Fixed>,

    /// Anchor structures (outposts, HQs) extend buildable range.
    #[serde(default)]
    pub is_anchor: bool,

    /// Whether the structure periodically heals nearby friendlies.
    #[serde(default)]
    pub heals_area: bool,

    /// Population cap granted while the structure stands.
    #[serde(default)]
    pub population_cost_granted: i32,

    /// Skill points awarded when the structure is destroyed.
    #[serde(default)]
    pub skill_points: i32,

    /// Construction ratio a freshly placed structure starts at.
    #[serde(default, with = "decimal_serde")]
    pub initial_construction_ratio: Fixed,
}

impl StructureBlueprint {
    /// Create a plain, non-anchor blueprint with sensible defaults.
    ///
    /// Decay is off, but the decay duration is pre-filled so enabling
    /// `can_decay` yields a valid blueprint.
    #[must_use]
    pub fn new(id: &str, cost: i32, health: u32, construction_needed: i32) -> Self {
        Self {
            id: id.to_string(),
            name: format!("structure.{id}.name"),
            cost,
            health,
            construction_needed: Fixed::from_num(construction_needed),
            footprint: Footprint::default(),
            safety_range: Fixed::ZERO,
            attack_range: Fixed::ZERO,
            can_decay: false,
            decay_duration_secs: Some(Fixed::from_num(DEFAULT_DECAY_DURATION_SECS)),
            is_anchor: false,
            heals_area: false,
            population_cost_granted: 0,
            skill_points: 0,
            initial_construction_ratio: Fixed::ZERO,
        }
    }

    /// Turn this blueprint into a healing anchor with the given range.
    #[must_use]
    pub fn anchor(mut self, safety_range: i32) -> Self {
        self.is_anchor = true;
        self.heals_area = true;
        self.safety_range = Fixed::from_num(safety_range);
        self
    }

    /// Enable decay.
    #[must_use]
    pub fn decaying(mut self) -> Self {
        self.can_decay = true;
        self
    }

    /// Replace the footprint box.
    #[must_use]
    pub fn with_footprint(mut self, center: Vec3Fixed, size: Vec3Fixed) -> Self {
        self.footprint = Footprint::new(center, size);
        self
    }

    /// Check the blueprint for configuration errors.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(GameError::config("<unnamed>", "id must not be empty"));
        }
        if self.health == 0 {
            return Err(GameError::config(&self.id, "health must be positive"));
        }
        if self.health > i32::MAX as u32 {
            return Err(GameError::config(&self.id, "health exceeds the fixed-point range"));
        }
        if self.construction_needed < Fixed::ZERO {
            return Err(GameError::config(
                &self.id,
                "construction_needed must not be negative",
            ));
        }
        if self.can_decay {
            match self.decay_duration_secs {
                Some(duration) if duration > Fixed::ZERO => {}
                _ => {
                    return Err(GameError::config(
                        &self.id,
                        "can_decay requires a positive decay_duration_secs",
                    ))
                }
            }
        }
        if (self.is_anchor || self.heals_area) && self.safety_range <= Fixed::ZERO {
            return Err(GameError::config(
                &self.id,
                "anchor and healing structures need a positive safety_range",
            ));
        }
        if self.initial_construction_ratio < Fixed::ZERO
            || self.initial_construction_ratio > Fixed::ONE
        {
            return Err(GameError::config(
                &self.id,
                "initial_construction_ratio must be within [0, 1]",
            ));
        }
        let size = self.footprint.size;
        if size.x <= Fixed::ZERO || size.y <= Fixed::ZERO || size.z <= Fixed::ZERO {
            return Err(GameError::config(&self.id, "footprint size must be positive"));
        }
        Ok(())
    }
}

/// Blueprints indexed by id, iterated in id order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlueprintRegistry {
    blueprints: BTreeMap<String, StructureBlueprint>,
}

impl BlueprintRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a RON list of blueprints, validating each one.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        let list: Vec<StructureBlueprint> =
            ron::from_str(ron).map_err(|e| GameError::DataParseError {
                path: "<inline>".to_string(),
                message: e.to_string(),
            })?;
        let mut registry = Self::new();
        for blueprint in list {
            registry.register(blueprint)?;
        }
        Ok(registry)
    }

    /// Register a blueprint. Duplicate ids are rejected.
    pub fn register(&mut self, blueprint: StructureBlueprint) -> Result<()> {
        blueprint.validate()?;
        if self.blueprints.contains_key(&blueprint.id) {
            return Err(GameError::config(&blueprint.id, "duplicate blueprint id"));
        }
        self.blueprints.insert(blueprint.id.clone(), blueprint);
        Ok(())
    }

    /// Look up a blueprint by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&StructureBlueprint> {
        self.blueprints.get(id)
    }

    /// Number of registered blueprints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blueprints.len()
    }

    /// Whether no blueprints are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blueprints.is_empty()
    }

    /// Iterate blueprints in id order.
    pub fn iter(&self) -> impl Iterator<Item = &StructureBlueprint> {
        self.blueprints.values()
    }
}

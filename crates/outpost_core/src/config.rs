//! Simulation-wide tuning values.
//!
//! Loaded from RON; every field has a default so a config file only needs
//! to mention what it changes.
//!
//! # Example RON
//!
//! ```ron
//! SimulationConfig(
//!     heal_interval_secs: 2.5,
//!     require_resources: false,
//! )
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::{decimal_serde, Fixed};

/// Default simulation ticks per second.
pub const DEFAULT_TICK_RATE: u32 = 20;

/// Default seconds between area heal checks.
pub const DEFAULT_HEAL_INTERVAL_SECS: i32 = 3;

/// Default health restored per heal check.
pub const DEFAULT_HEAL_AMOUNT: u32 = 2;

/// Default decay duration used by blueprint constructors.
pub const DEFAULT_DECAY_DURATION_SECS: i32 = 15;

/// Tuning values shared by every system in the simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Ticks per simulated second for [`crate::simulation::Simulation::tick`].
    pub tick_rate: u32,
    /// Seconds between area heal checks.
    #[serde(with = "decimal_serde")]
    pub heal_interval_secs: Fixed,
    /// Health restored to each friendly unit per heal check.
    pub heal_amount: u32,
    /// Length of the downward ground probe under each footprint corner.
    #[serde(with = "decimal_serde")]
    pub level_threshold: Fixed,
    /// Height above the footprint bottom where ground probes start.
    #[serde(with = "decimal_serde")]
    pub probe_lift: Fixed,
    /// Pointer travel (pixels) before a held click starts rotating.
    #[serde(with = "decimal_serde")]
    pub rotation_threshold_px: Fixed,
    /// Maximum length of pointer rays against terrain.
    #[serde(with = "decimal_serde")]
    pub max_ray_distance: Fixed,
    /// Whether placement charges (and checks) the structure cost.
    pub require_resources: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            heal_interval_secs: Fixed::from_num(DEFAULT_HEAL_INTERVAL_SECS),
            heal_amount: DEFAULT_HEAL_AMOUNT,
            level_threshold: Fixed::ONE,
            probe_lift: Fixed::from_num(0.5),
            rotation_threshold_px: Fixed::from_num(10),
            max_ray_distance: Fixed::from_num(1000),
            require_resources: true,
        }
    }
}

impl SimulationConfig {
    /// Parse a config from RON text and validate it.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        let config: Self = ron::from_str(ron).map_err(|e| GameError::DataParseError {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Duration of one tick at the configured tick rate.
    #[must_use]
    pub fn tick_duration(&self) -> Fixed {
        Fixed::ONE / Fixed::from_num(self.tick_rate.max(1))
    }

    /// Reject values that would stall or break the scheduler.
    pub fn validate(&self) -> Result<()> {
        if self.tick_rate == 0 {
            return Err(GameError::InvalidState("tick_rate must be positive".into()));
        }
        if self.heal_interval_secs <= Fixed::ZERO {
            return Err(GameError::InvalidState(
                "heal_interval_secs must be positive".into(),
            ));
        }
        if self.level_threshold <= Fixed::ZERO {
            return Err(GameError::InvalidState(
                "level_threshold must be positive".into(),
            ));
        }
        Ok(())
    }
}

//! Scenario loading and configuration.
//!
//! Scenarios define the initial state for a headless run: simulation
//! tuning, blueprints, terrain, units, placed structures and a timeline of
//! attacks, unit deaths and day/night changes.

use std::path::Path;

use outpost_core::blueprint::{BlueprintRegistry, StructureBlueprint};
use outpost_core::config::SimulationConfig;
use outpost_core::error::GameError;
use outpost_core::scheduler::DayPhase;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The simulation rejected part of the scenario.
    #[error("Invalid scenario: {0}")]
    Game(#[from] GameError),
    /// A placement names a blueprint the scenario does not define.
    #[error("Unknown blueprint '{0}'")]
    UnknownBlueprint(String),
    /// A timeline entry points at a placement that does not exist.
    #[error("Placement index {0} is out of bounds")]
    UnknownPlacement(usize),
}

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Simulation tuning.
    #[serde(default)]
    pub config: SimulationConfig,
    /// Structure definitions available to placements.
    pub blueprints: Vec<StructureBlueprint>,
    /// Ground and fog of war.
    #[serde(default)]
    pub terrain: TerrainSetup,
    /// Starting resources per player.
    #[serde(default)]
    pub resources: Vec<(u8, i32)>,
    /// Units present at the start.
    #[serde(default)]
    pub units: Vec<UnitSetup>,
    /// Structures placed at the start, in order.
    #[serde(default)]
    pub placements: Vec<PlacementSetup>,
    /// Damage dealt to placed structures.
    #[serde(default)]
    pub attacks: Vec<AttackSetup>,
    /// Units removed during the run.
    #[serde(default)]
    pub unit_deaths: Vec<UnitDeath>,
    /// Time of day changes.
    #[serde(default)]
    pub day: Vec<DayChange>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::outpost_skirmish()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Build the blueprint registry and check every cross reference.
    pub fn validate(&self) -> Result<BlueprintRegistry, ScenarioError> {
        self.config.validate()?;

        let mut registry = BlueprintRegistry::new();
        for blueprint in &self.blueprints {
            registry.register(blueprint.clone())?;
        }
        for placement in &self.placements {
            if registry.get(&placement.blueprint).is_none() {
                return Err(ScenarioError::UnknownBlueprint(placement.blueprint.clone()));
            }
        }
        for attack in &self.attacks {
            if attack.target >= self.placements.len() {
                return Err(ScenarioError::UnknownPlacement(attack.target));
            }
        }
        Ok(registry)
    }

    /// A small two-player skirmish around one outpost.
    ///
    /// Player 0 holds an outpost with a linked wall line and a lone
    /// barricade outside cover; player 1 raids the walls.
    #[must_use]
    pub fn outpost_skirmish() -> Self {
        let outpost = {
            let mut blueprint = StructureBlueprint::new("outpost", 150, 400, 60).anchor(20);
            blueprint.population_cost_granted = 5;
            blueprint.skill_points = 10;
            blueprint
        };
        let wall = StructureBlueprint::new("wall", 20, 200, 30);
        let barricade = StructureBlueprint::new("barricade", 10, 100, 5).decaying();

        Self {
            name: "Outpost Skirmish".to_string(),
            description: "Wall line under attack next to a healing outpost".to_string(),
            config: SimulationConfig::default(),
            blueprints: vec![outpost, wall, barricade],
            terrain: TerrainSetup::default(),
            resources: vec![(0, 1000), (1, 1000)],
            units: vec![
                UnitSetup::new(1, 0, (3, 2), 40, 100),
                UnitSetup::new(2, 0, (-4, 1), 100, 100),
                UnitSetup::new(3, 1, (40, 0), 80, 100),
            ],
            placements: vec![
                PlacementSetup::new("outpost", 0, (0, 0)),
                PlacementSetup::new("wall", 0, (8, 4)).in_group(1),
                PlacementSetup::new("wall", 0, (8, 0)).in_group(1),
                PlacementSetup::new("wall", 0, (8, -4)).in_group(1),
                PlacementSetup::new("barricade", 0, (60, 0)),
            ],
            attacks: vec![
                AttackSetup::new(40, 1, 90).by(3),
                AttackSetup::new(100, 2, 150).by(3),
                AttackSetup::new(160, 3, 400).by(3),
            ],
            unit_deaths: vec![UnitDeath { at_tick: 200, unit: 3 }],
            day: vec![
                DayChange {
                    at_tick: 400,
                    phase: DayPhase::Night,
                },
                DayChange {
                    at_tick: 800,
                    phase: DayPhase::Day,
                },
            ],
        }
    }
}

/// Ground plane, holes and fog of war.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TerrainSetup {
    /// Height of the ground plane.
    #[serde(default)]
    pub ground_height: i32,
    /// Circular gaps `(x, z, radius)`.
    #[serde(default)]
    pub holes: Vec<(i32, i32, i32)>,
    /// Revealed disc `(x, z, radius)`; everything is revealed when absent.
    #[serde(default)]
    pub revealed: Option<(i32, i32, i32)>,
}

/// A unit at scenario start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitSetup {
    /// Unit id.
    pub id: u64,
    /// Owning player.
    pub owner: u8,
    /// Ground position `(x, z)`.
    pub position: (i32, i32),
    /// Current health.
    pub health: u32,
    /// Maximum health.
    pub max_health: u32,
}

impl UnitSetup {
    /// Create a new unit setup.
    #[must_use]
    pub fn new(id: u64, owner: u8, position: (i32, i32), health: u32, max_health: u32) -> Self {
        Self {
            id,
            owner,
            position,
            health,
            max_health,
        }
    }
}

/// A structure placed at scenario start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementSetup {
    /// Blueprint id.
    pub blueprint: String,
    /// Owning player.
    pub owner: u8,
    /// Ground position `(x, z)`.
    pub position: (i32, i32),
    /// Yaw in whole degrees.
    #[serde(default)]
    pub yaw: i32,
    /// Placements sharing a label form one sibling group.
    #[serde(default)]
    pub group: Option<u32>,
    /// Finish construction immediately.
    #[serde(default = "default_prebuilt")]
    pub prebuilt: bool,
}

fn default_prebuilt() -> bool {
    true
}

impl PlacementSetup {
    /// Create a prebuilt, ungrouped placement.
    #[must_use]
    pub fn new(blueprint: impl Into<String>, owner: u8, position: (i32, i32)) -> Self {
        Self {
            blueprint: blueprint.into(),
            owner,
            position,
            yaw: 0,
            group: None,
            prebuilt: true,
        }
    }

    /// Put the placement in a sibling group.
    #[must_use]
    pub fn in_group(mut self, group: u32) -> Self {
        self.group = Some(group);
        self
    }
}

/// Damage dealt to a placed structure before a tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackSetup {
    /// Tick the damage lands on.
    pub at_tick: u64,
    /// Index into [`Scenario::placements`].
    pub target: usize,
    /// Damage dealt.
    pub amount: u32,
    /// Attacking unit, if known.
    #[serde(default)]
    pub attacker: Option<u64>,
}

impl AttackSetup {
    /// Create an anonymous attack.
    #[must_use]
    pub fn new(at_tick: u64, target: usize, amount: u32) -> Self {
        Self {
            at_tick,
            target,
            amount,
            attacker: None,
        }
    }

    /// Attribute the attack to a unit.
    #[must_use]
    pub fn by(mut self, attacker: u64) -> Self {
        self.attacker = Some(attacker);
        self
    }
}

/// A unit removed before a tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UnitDeath {
    /// Tick the unit dies on.
    pub at_tick: u64,
    /// Unit id.
    pub unit: u64,
}

/// A day phase change before a tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DayChange {
    /// Tick the phase changes on.
    pub at_tick: u64,
    /// New phase.
    pub phase: DayPhase,
}

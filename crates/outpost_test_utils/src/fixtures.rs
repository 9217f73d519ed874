//! Test fixtures and helpers.
//!
//! Pre-built blueprints and input frames for consistent testing.

use fixed::types::I32F32;
use outpost_core::blueprint::StructureBlueprint;
use outpost_core::math::{Vec2Fixed, Vec3Fixed};
use outpost_core::session::{InputFrame, PointerRay};

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Healing anchor with a 20 unit range.
#[must_use]
pub fn outpost_blueprint() -> StructureBlueprint {
    let mut blueprint = StructureBlueprint::new("outpost", 150, 400, 60).anchor(20);
    blueprint.population_cost_granted = 5;
    blueprint.skill_points = 10;
    blueprint
}

/// Plain wall segment, usually placed in sibling groups.
#[must_use]
pub fn wall_blueprint() -> StructureBlueprint {
    let mut blueprint = StructureBlueprint::new("wall", 20, 200, 30);
    blueprint.skill_points = 1;
    blueprint
}

/// Cheap barricade that decays from 100 health over 15 seconds.
#[must_use]
pub fn barricade_blueprint() -> StructureBlueprint {
    StructureBlueprint::new("barricade", 10, 100, 5).decaying()
}

/// Armed tower with a larger max health.
#[must_use]
pub fn tower_blueprint() -> StructureBlueprint {
    let mut blueprint = StructureBlueprint::new("tower", 80, 300, 45);
    blueprint.attack_range = fixed(12);
    blueprint
}

/// Input with the pointer straight above world `(x, z)` and no buttons.
///
/// Screen coordinates are ten pixels per world unit.
#[must_use]
pub fn pointer_at(x: i32, z: i32) -> InputFrame {
    InputFrame {
        pointer_screen: Vec2Fixed::new(fixed(x * 10), fixed(z * 10)),
        pointer_ray: PointerRay {
            origin: Vec3Fixed::from_ints(x, 100, z),
            direction: Vec3Fixed::DOWN,
        },
        ..InputFrame::default()
    }
}

/// The same frame with the primary button pressed.
#[must_use]
pub fn press(frame: InputFrame) -> InputFrame {
    InputFrame {
        primary_pressed: true,
        ..frame
    }
}

/// The same frame with the primary button released.
#[must_use]
pub fn release(frame: InputFrame) -> InputFrame {
    InputFrame {
        primary_released: true,
        ..frame
    }
}

/// The same frame with the secondary button released.
#[must_use]
pub fn cancel(frame: InputFrame) -> InputFrame {
    InputFrame {
        secondary_released: true,
        ..frame
    }
}

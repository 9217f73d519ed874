//! Fixed-point math utilities for deterministic simulation.
//!
//! All structure simulation uses fixed-point arithmetic to ensure
//! deterministic behavior across platforms. Floating-point
//! operations can produce different results on different CPUs.
//!
//! The trigonometry here is deliberately small: the placement workflow only
//! needs yaw rotation of a footprint around the vertical axis and the signed
//! angle of a pointer drag.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
pub type Fixed = I32F32;

/// π in 32.32 fixed point.
pub const PI: Fixed = Fixed::from_bits(13_493_037_705);

/// 180 degrees, used for degree/radian conversion.
const HALF_TURN_DEGREES: Fixed = Fixed::from_bits(180 << 32);

/// Serde support for fixed-point numbers written as decimals.
///
/// Data files are authored by hand, so values are written as `1.5` rather
/// than raw bits. Parsing the same decimal always yields the same `f64` and
/// therefore the same fixed-point value, which keeps loading deterministic.
pub mod decimal_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as a decimal.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_num::<f64>().serialize(serializer)
    }

    /// Deserialize a fixed-point number from a decimal.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Fixed::checked_from_num(value)
            .ok_or_else(|| serde::de::Error::custom(format!("{value} is out of fixed-point range")))
    }
}

/// Serde support for `Option<Fixed>` written as decimals.
///
/// A present value may be written bare (`15.0`) or wrapped (`Some(15.0)`).
/// Present values are written back bare.
pub mod option_decimal_serde {
    use std::fmt;

    use super::Fixed;
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serialize, Serializer};

    /// Serialize an optional fixed-point number.
    pub fn serialize<S>(value: &Option<Fixed>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => v.to_num::<f64>().serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize an optional fixed-point number.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Fixed>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(OptionalDecimal)
    }

    struct OptionalDecimal;

    impl OptionalDecimal {
        fn convert<E: de::Error>(value: f64) -> Result<Option<Fixed>, E> {
            Fixed::checked_from_num(value)
                .map(Some)
                .ok_or_else(|| E::custom(format!("{value} is out of fixed-point range")))
        }
    }

    impl<'de> Visitor<'de> for OptionalDecimal {
        type Value = Option<Fixed>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a decimal, Some(decimal) or None")
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
            Self::convert(value)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
            Self::convert(value as f64)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
            Self::convert(value as f64)
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
        where
            D: Deserializer<'de>,
        {
            super::decimal_serde::deserialize(deserializer).map(Some)
        }
    }
}

/// Fixed-point 2D vector.
///
/// Used for screen-space pointer positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "decimal_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "decimal_serde")]
    pub y: Fixed,
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Chebyshev (chessboard) distance, the larger of the axis deltas.
    #[must_use]
    pub fn chebyshev_distance(self, other: Self) -> Fixed {
        let dx = (self.x - other.x).abs();
        let dy = (self.y - other.y).abs();
        dx.max(dy)
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

/// Fixed-point 3D vector in world space.
///
/// The world is Y-up; structures rotate around the Y axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec3Fixed {
    /// X coordinate.
    #[serde(with = "decimal_serde")]
    pub x: Fixed,
    /// Y coordinate (up).
    #[serde(with = "decimal_serde")]
    pub y: Fixed,
    /// Z coordinate.
    #[serde(with = "decimal_serde")]
    pub z: Fixed,
}

impl Vec3Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed, z: Fixed) -> Self {
        Self { x, y, z }
    }

    /// Create a vector from integer components.
    #[must_use]
    pub fn from_ints(x: i32, y: i32, z: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y), Fixed::from_num(z))
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
        z: Fixed::ZERO,
    };

    /// Unit vector pointing down (-Y).
    pub const DOWN: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::from_bits(-(1 << 32)),
        z: Fixed::ZERO,
    };

    /// Unit vector pointing right (+X), the zero-yaw reference axis.
    pub const RIGHT: Self = Self {
        x: Fixed::from_bits(1 << 32),
        y: Fixed::ZERO,
        z: Fixed::ZERO,
    };

    /// Calculate squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let d = self - other;
        d.x.saturating_mul(d.x)
            .saturating_add(d.y.saturating_mul(d.y))
            .saturating_add(d.z.saturating_mul(d.z))
    }

    /// Check whether `other` lies within `range` of this point (inclusive).
    #[must_use]
    pub fn within_range(self, other: Self, range: Fixed) -> bool {
        if range < Fixed::ZERO {
            return false;
        }
        self.distance_squared(other) <= range.saturating_mul(range)
    }

    /// Scale every component.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor, self.z * factor)
    }

    /// Rotate the horizontal components by `yaw_degrees` around +Y.
    ///
    /// Positive yaw turns +X towards -Z, matching the engine convention used
    /// by [`signed_yaw_degrees`].
    #[must_use]
    pub fn rotate_yaw(self, yaw_degrees: Fixed) -> Self {
        if yaw_degrees == Fixed::ZERO {
            return self;
        }
        let (sin, cos) = sin_cos_degrees(yaw_degrees);
        Self::new(
            self.x * cos + self.z * sin,
            self.y,
            self.z * cos - self.x * sin,
        )
    }
}

impl std::ops::Add for Vec3Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Vec3Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Convert degrees to radians.
#[must_use]
pub fn to_radians(degrees: Fixed) -> Fixed {
    degrees * PI / HALF_TURN_DEGREES
}

/// Convert radians to degrees.
#[must_use]
pub fn to_degrees(radians: Fixed) -> Fixed {
    radians * HALF_TURN_DEGREES / PI
}

/// Wrap an angle into `(-180, 180]` degrees.
#[must_use]
pub fn wrap_degrees(degrees: Fixed) -> Fixed {
    let full_turn = HALF_TURN_DEGREES * 2;
    let mut wrapped = degrees % full_turn;
    if wrapped > HALF_TURN_DEGREES {
        wrapped -= full_turn;
    } else if wrapped <= -HALF_TURN_DEGREES {
        wrapped += full_turn;
    }
    wrapped
}

/// Sine and cosine of an angle in degrees.
///
/// Range-reduced to `[-90, 90]` and evaluated with a Taylor series through
/// the x⁹ term; error stays below 1e-5.
#[must_use]
pub fn sin_cos_degrees(degrees: Fixed) -> (Fixed, Fixed) {
    let quarter = HALF_TURN_DEGREES / 2;
    (
        sin_reduced(degrees),
        sin_reduced(quarter - degrees),
    )
}

fn sin_reduced(degrees: Fixed) -> Fixed {
    let quarter = HALF_TURN_DEGREES / 2;
    let mut d = wrap_degrees(degrees);
    if d > quarter {
        d = HALF_TURN_DEGREES - d;
    } else if d < -quarter {
        d = -HALF_TURN_DEGREES - d;
    }

    let x = to_radians(d);
    let x2 = x * x;
    // Horner form of x - x³/3! + x⁵/5! - x⁷/7! + x⁹/9!
    let mut term = Fixed::ONE / Fixed::from_num(362_880);
    term = Fixed::ONE / Fixed::from_num(5_040) - x2 * term;
    term = Fixed::ONE / Fixed::from_num(120) - x2 * term;
    term = Fixed::ONE / Fixed::from_num(6) - x2 * term;
    term = Fixed::ONE - x2 * term;
    x * term
}

/// Four-quadrant arctangent, in degrees within `(-180, 180]`.
///
/// Uses a rational-free polynomial approximation of `atan` on `[-1, 1]`
/// with a maximum error of roughly 0.1 degrees.
#[must_use]
pub fn atan2_degrees(y: Fixed, x: Fixed) -> Fixed {
    if x == Fixed::ZERO && y == Fixed::ZERO {
        return Fixed::ZERO;
    }
    let quarter = HALF_TURN_DEGREES / 2;

    let (ax, ay) = (x.abs(), y.abs());
    let base = if ax >= ay {
        to_degrees(atan_unit(ay / ax))
    } else {
        quarter - to_degrees(atan_unit(ax / ay))
    };

    let angle = if x >= Fixed::ZERO {
        base
    } else {
        HALF_TURN_DEGREES - base
    };
    if y < Fixed::ZERO {
        -angle
    } else {
        angle
    }
}

/// `atan(z)` for `z` in `[0, 1]`, in radians.
fn atan_unit(z: Fixed) -> Fixed {
    let quarter_pi = PI / 4;
    let a = Fixed::from_num(0.2447);
    let b = Fixed::from_num(0.0663);
    quarter_pi * z - z * (z - Fixed::ONE) * (a + b * z)
}

/// Signed yaw (degrees) that turns the +X axis towards `direction` around +Y.
///
/// Only the horizontal components are considered. A direction along -Z is
/// +90 degrees.
#[must_use]
pub fn signed_yaw_degrees(direction: Vec3Fixed) -> Fixed {
    atan2_degrees(-direction.z, direction.x)
}

/// Ceiling of a rational `numerator / denominator` with a positive denominator.
#[must_use]
pub fn div_ceil_i128(numerator: i128, denominator: i128) -> i128 {
    debug_assert!(denominator > 0, "denominator must be positive");
    -((-numerator).div_euclid(denominator))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    fn close(a: Fixed, b: Fixed, epsilon: f64) -> bool {
        (a - b).abs() <= Fixed::from_num(epsilon)
    }

    #[test]
    fn test_vec3_distance_squared() {
        let a = Vec3Fixed::from_ints(3, 0, 0);
        let b = Vec3Fixed::from_ints(0, 0, 4);
        // 3² + 4² = 25
        assert_eq!(a.distance_squared(b), fixed(25));
        assert!(a.within_range(b, fixed(5)));
        assert!(!a.within_range(b, Fixed::from_num(4.99)));
    }

    #[test]
    fn test_sin_cos_cardinal_angles() {
        let (s, c) = sin_cos_degrees(fixed(0));
        assert!(close(s, fixed(0), 1e-6));
        assert!(close(c, fixed(1), 1e-5));

        let (s, c) = sin_cos_degrees(fixed(90));
        assert!(close(s, fixed(1), 1e-5));
        assert!(close(c, fixed(0), 1e-5));

        let (s, c) = sin_cos_degrees(fixed(-180));
        assert!(close(s, fixed(0), 1e-5));
        assert!(close(c, fixed(-1), 1e-5));

        let (s, _) = sin_cos_degrees(fixed(30));
        assert!(close(s, Fixed::from_num(0.5), 1e-5));
    }

    #[test]
    fn test_wrap_degrees() {
        assert_eq!(wrap_degrees(fixed(370)), fixed(10));
        assert_eq!(wrap_degrees(fixed(-190)), fixed(170));
        assert_eq!(wrap_degrees(fixed(180)), fixed(180));
        assert_eq!(wrap_degrees(fixed(-180)), fixed(180));
    }

    #[test]
    fn test_atan2_quadrants() {
        assert!(close(atan2_degrees(fixed(0), fixed(1)), fixed(0), 0.1));
        assert!(close(atan2_degrees(fixed(1), fixed(1)), fixed(45), 0.1));
        assert!(close(atan2_degrees(fixed(1), fixed(0)), fixed(90), 0.1));
        assert!(close(atan2_degrees(fixed(1), fixed(-1)), fixed(135), 0.1));
        assert!(close(atan2_degrees(fixed(-1), fixed(-1)), fixed(-135), 0.1));
        assert!(close(atan2_degrees(fixed(-1), fixed(0)), fixed(-90), 0.1));
        assert!(close(atan2_degrees(fixed(0), fixed(-1)), fixed(180), 0.1));
    }

    #[test]
    fn test_signed_yaw_matches_rotation() {
        // Pointer dragged towards -Z is a +90 degree yaw...
        let yaw = signed_yaw_degrees(Vec3Fixed::from_ints(0, 0, -5));
        assert!(close(yaw, fixed(90), 0.1));

        // ...and rotating +X by that yaw points it at -Z.
        let rotated = Vec3Fixed::RIGHT.rotate_yaw(yaw);
        assert!(close(rotated.x, fixed(0), 0.01));
        assert!(close(rotated.z, fixed(-1), 0.01));
    }

    #[test]
    fn test_div_ceil_i128() {
        assert_eq!(div_ceil_i128(7, 2), 4);
        assert_eq!(div_ceil_i128(6, 2), 3);
        assert_eq!(div_ceil_i128(-7, 2), -3);
        assert_eq!(div_ceil_i128(0, 5), 0);
    }

    #[test]
    fn test_fixed_determinism() {
        // Same operations must produce identical results
        let a = sin_cos_degrees(Fixed::from_num(37.5));
        let b = sin_cos_degrees(Fixed::from_num(37.5));
        assert_eq!(a, b);
    }

    #[test]
    fn test_decimal_serde_round_trip() {
        let v = Vec3Fixed::new(Fixed::from_num(1.5), fixed(-2), Fixed::from_num(0.25));
        let text = ron::to_string(&v).unwrap();
        let back: Vec3Fixed = ron::from_str(&text).unwrap();
        assert_eq!(v, back);
    }
}

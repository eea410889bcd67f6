//! Hounsfield units.

use serde::{Deserialize, Serialize};

/// A CT intensity in Hounsfield units, clamped to `[-1024, 3071]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Huv(i16);

impl Huv {
    /// Lowest representable value (air).
    pub const MIN: Huv = Huv(-1024);
    /// Highest representable value.
    pub const MAX: Huv = Huv(3071);
    /// Water.
    pub const WATER: Huv = Huv(0);

    /// Creates a value, clamping into the valid range.
    pub fn new(value: i32) -> Self {
        let clamped = value.clamp(i32::from(Self::MIN.0), i32::from(Self::MAX.0));
        #[allow(clippy::cast_possible_truncation)]
        Self(clamped as i16)
    }

    /// Returns the raw value.
    pub fn value(self) -> i16 {
        self.0
    }

    /// Maps this value onto `[0, 1]`.
    pub fn to_intensity(self) -> f32 {
        (f32::from(self.0) + 1024.0) / 4095.0
    }

    /// Maps an intensity in `[0, 1]` back to the nearest Hounsfield unit.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_intensity(intensity: f32) -> Self {
        Self::new((intensity.clamp(0.0, 1.0) * 4095.0 - 1024.0).round() as i32)
    }
}

impl Default for Huv {
    fn default() -> Self {
        Self::MIN
    }
}

impl From<i16> for Huv {
    fn from(value: i16) -> Self {
        Self::new(i32::from(value))
    }
}

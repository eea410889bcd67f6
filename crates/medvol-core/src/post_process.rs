//! Configuration of the 2D pass applied after ray marching.

use glam::{Mat4, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Color transform applied by the post-process pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ColorOperation {
    /// Colors pass through unchanged.
    #[default]
    None,
    /// Gray pixels are inverted, colored pixels are kept.
    InvertBlackWhite,
    /// Every channel is inverted.
    InvertAllColors,
}

impl ColorOperation {
    /// Shader-side code of the operation.
    pub fn code(self) -> u32 {
        match self {
            Self::None => 0,
            Self::InvertBlackWhite => 1,
            Self::InvertAllColors => 2,
        }
    }

    /// Applies the operation to a color on the CPU.
    pub fn apply(self, color: Vec4) -> Vec4 {
        match self {
            Self::None => color,
            Self::InvertAllColors => (Vec3::ONE - color.truncate()).extend(color.w),
            Self::InvertBlackWhite => {
                let rgb = color.truncate();
                if rgb.max_element() - rgb.min_element() <= GRAY_TOLERANCE {
                    (Vec3::ONE - rgb).extend(color.w)
                } else {
                    color
                }
            }
        }
    }
}

/// Channel spread below which a pixel counts as gray.
pub const GRAY_TOLERANCE: f32 = 1.0 / 255.0;

/// Post-process configuration.
///
/// The operations apply in a fixed order: horizontal flip, vertical flip,
/// rotation, color operation, circular mask.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct PostProcessConfig {
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    /// Counter-clockwise rotation of the image in degrees.
    pub rotation_degrees: u32,
    pub color_operation: ColorOperation,
    /// Blacks out everything outside the circle inscribed in the image.
    pub circular_mask: bool,
}

impl PostProcessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flip_horizontal(mut self, flip: bool) -> Self {
        self.flip_horizontal = flip;
        self
    }

    pub fn with_flip_vertical(mut self, flip: bool) -> Self {
        self.flip_vertical = flip;
        self
    }

    /// Sets the rotation, normalized into `[0, 360)`.
    pub fn with_rotation(mut self, degrees: i32) -> Self {
        self.set_rotation(degrees);
        self
    }

    pub fn with_color_operation(mut self, operation: ColorOperation) -> Self {
        self.color_operation = operation;
        self
    }

    pub fn with_circular_mask(mut self, mask: bool) -> Self {
        self.circular_mask = mask;
        self
    }

    /// Sets the rotation, normalized into `[0, 360)`.
    #[allow(clippy::cast_sign_loss)]
    pub fn set_rotation(&mut self, degrees: i32) {
        self.rotation_degrees = degrees.rem_euclid(360) as u32;
    }

    /// Whether the pass changes anything at all.
    pub fn is_identity(&self) -> bool {
        !self.flip_horizontal
            && !self.flip_vertical
            && self.rotation_degrees % 360 == 0
            && self.color_operation == ColorOperation::None
            && !self.circular_mask
    }

    /// Matrix mapping output texture coordinates to source coordinates.
    ///
    /// Flips and rotation act around the texture center `(0.5, 0.5)`.
    #[allow(clippy::cast_precision_loss)]
    pub fn texture_transform(&self) -> Mat4 {
        let mut flip = Vec3::ONE;
        if self.flip_horizontal {
            flip.x = -1.0;
        }
        if self.flip_vertical {
            flip.y = -1.0;
        }
        let angle = -((self.rotation_degrees % 360) as f32).to_radians();
        let center = Vec3::new(0.5, 0.5, 0.0);
        Mat4::from_translation(center)
            * Mat4::from_scale(flip)
            * Mat4::from_rotation_z(angle)
            * Mat4::from_translation(-center)
    }

    /// Source texture coordinate sampled for output coordinate `uv`.
    pub fn source_coordinate(&self, uv: Vec2) -> Vec2 {
        self.texture_transform()
            .transform_point3(uv.extend(0.0))
            .truncate()
    }
}

/// Whether `pixel` lies inside the circle inscribed in a `width`×`height`
/// image, whose diameter is the shorter side.
#[allow(clippy::cast_precision_loss)]
pub fn inside_circular_mask(pixel: Vec2, width: u32, height: u32) -> bool {
    let size = Vec2::new(width as f32, height as f32);
    let radius = size.min_element() / 2.0;
    (pixel - size / 2.0).length() <= radius
}

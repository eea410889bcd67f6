//! Parameters of the ray-marching and cutting-plane render modes.

use serde::{Deserialize, Serialize};

use crate::huv::Huv;

/// Digital radiograph reconstruction parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DrrConfig {
    /// Attenuation of water per unit length.
    pub water_attenuation: f32,
    /// Brightness of unattenuated rays.
    pub base_intensity: f32,
    /// Samples below this value do not attenuate.
    pub lower_threshold: Huv,
    /// Samples above this value attenuate `upper_multiplier` times stronger.
    pub upper_threshold: Huv,
    pub upper_multiplier: f32,
    /// Renders bright air on dark bone instead.
    pub render_inverse: bool,
}

impl Default for DrrConfig {
    fn default() -> Self {
        Self {
            water_attenuation: 2.0,
            base_intensity: 1.0,
            lower_threshold: Huv::new(-400),
            upper_threshold: Huv::new(400),
            upper_multiplier: 1.5,
            render_inverse: false,
        }
    }
}

impl DrrConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_water_attenuation(mut self, water_attenuation: f32) -> Self {
        self.water_attenuation = water_attenuation;
        self
    }

    pub fn with_base_intensity(mut self, base_intensity: f32) -> Self {
        self.base_intensity = base_intensity;
        self
    }

    pub fn with_thresholds(mut self, lower: Huv, upper: Huv) -> Self {
        self.lower_threshold = lower;
        self.upper_threshold = upper;
        self
    }

    pub fn with_upper_multiplier(mut self, upper_multiplier: f32) -> Self {
        self.upper_multiplier = upper_multiplier;
        self
    }

    pub fn with_render_inverse(mut self, render_inverse: bool) -> Self {
        self.render_inverse = render_inverse;
        self
    }

    /// Attenuation contributed by one sample of `huv` over `step_length`.
    pub fn attenuation(&self, huv: Huv, step_length: f32) -> f32 {
        if huv < self.lower_threshold {
            return 0.0;
        }
        let multiplier = if huv > self.upper_threshold {
            self.upper_multiplier
        } else {
            1.0
        };
        let mu = self.water_attenuation * (1.0 + f32::from(huv.value()) / 1000.0);
        multiplier * mu.max(0.0) * step_length
    }

    /// Final pixel brightness for an accumulated attenuation.
    pub fn brightness(&self, accumulated: f32) -> f32 {
        let transmitted = self.base_intensity * (-accumulated).exp();
        if self.render_inverse {
            1.0 - transmitted
        } else {
            transmitted
        }
    }
}

/// What the DVR shader writes per sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DvrDrawMode {
    /// Color map classification.
    #[default]
    Colors,
    /// The sampled normal as RGB, for inspecting normal maps.
    Normals,
}

impl DvrDrawMode {
    /// Value passed to the shader.
    pub fn code(self) -> u32 {
        match self {
            Self::Colors => 0,
            Self::Normals => 1,
        }
    }
}

/// Direct volume rendering parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DvrConfig {
    /// Higher values make samples more transparent.
    pub translucence: f32,
    /// Shade samples with the segment normal maps.
    pub lighting: bool,
    /// Diffuse light contribution when lighting is on.
    pub diffuse_light: f32,
    pub draw_mode: DvrDrawMode,
}

impl Default for DvrConfig {
    fn default() -> Self {
        Self {
            translucence: 50.0,
            lighting: false,
            diffuse_light: 1.0,
            draw_mode: DvrDrawMode::Colors,
        }
    }
}

impl DvrConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_translucence(mut self, translucence: f32) -> Self {
        self.translucence = translucence.max(0.0);
        self
    }

    pub fn with_lighting(mut self, lighting: bool) -> Self {
        self.lighting = lighting;
        self
    }

    pub fn with_diffuse_light(mut self, diffuse_light: f32) -> Self {
        self.diffuse_light = diffuse_light.clamp(0.0, 1.0);
        self
    }

    pub fn with_draw_mode(mut self, draw_mode: DvrDrawMode) -> Self {
        self.draw_mode = draw_mode;
        self
    }
}

/// Maximum intensity projection parameters.
///
/// Maxima inside `[min_intensity, max_intensity]` are stretched over the
/// whole color map; maxima below the window stay transparent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MipConfig {
    pub min_intensity: f32,
    pub max_intensity: f32,
}

impl Default for MipConfig {
    fn default() -> Self {
        Self {
            min_intensity: 0.0,
            max_intensity: 1.0,
        }
    }
}

impl MipConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the window from Hounsfield units.
    pub fn with_hu_window(mut self, min: Huv, max: Huv) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        self.min_intensity = min.to_intensity();
        self.max_intensity = max.to_intensity();
        self
    }

    /// Position of `intensity` within the window, clamped to `[0, 1]`.
    pub fn normalize(&self, intensity: f32) -> f32 {
        let range = (self.max_intensity - self.min_intensity).max(1e-6);
        ((intensity - self.min_intensity) / range).clamp(0.0, 1.0)
    }
}

/// Mask rendering parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MaskConfig {
    /// Straight RGBA color of masked regions.
    pub color: [f32; 4],
    /// Fills masked regions; otherwise only their outlines are drawn.
    pub filling: bool,
    /// Intensity from which on voxels are labeled when a mask is derived
    /// by thresholding.
    pub threshold: f32,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            color: [0.0, 1.0, 0.0, 1.0],
            filling: true,
            threshold: 0.5,
        }
    }
}

impl MaskConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        self.color = color.map(|c| c.clamp(0.0, 1.0));
        self
    }

    pub fn with_filling(mut self, filling: bool) -> Self {
        self.filling = filling;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Global thresholding of an intensity.
    pub fn labels(&self, intensity: f32) -> bool {
        intensity >= self.threshold
    }

    /// Whether only the outlines of masked regions are drawn.
    pub fn render_borders(&self) -> bool {
        !self.filling
    }
}

/// Windowing of the HU slices drawn on cutting planes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CuttingPlanesConfig {
    pub windowing_level: Huv,
    pub windowing_width: u32,
    pub render_inverse: bool,
}

impl Default for CuttingPlanesConfig {
    fn default() -> Self {
        Self {
            windowing_level: Huv::new(4096 / 2 - 1024),
            windowing_width: 4096,
            render_inverse: false,
        }
    }
}

impl CuttingPlanesConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_windowing(mut self, level: Huv, width: u32) -> Self {
        self.windowing_level = level;
        self.windowing_width = width.max(1);
        self
    }

    pub fn with_render_inverse(mut self, render_inverse: bool) -> Self {
        self.render_inverse = render_inverse;
        self
    }

    /// Lower end of the window as intensity.
    #[allow(clippy::cast_possible_wrap)]
    pub fn min_intensity(&self) -> f32 {
        let hu = i32::from(self.windowing_level.value()) - (self.windowing_width / 2) as i32;
        (hu as f32 + 1024.0) / 4095.0
    }

    /// Upper end of the window as intensity.
    #[allow(clippy::cast_possible_wrap)]
    pub fn max_intensity(&self) -> f32 {
        let hu = i32::from(self.windowing_level.value()) + (self.windowing_width / 2) as i32;
        (hu as f32 + 1024.0) / 4095.0
    }
}

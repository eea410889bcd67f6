//! Direct volume rendering.

use glam::Vec4;
use medvol_core::{ColorMap, DvrConfig, Huv, Role};

use super::RayMarchingMode;

/// GPU representation of [`DvrConfig`].
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DvrUniforms {
    pub translucence: f32,
    pub diffuse_light: f32,
    pub lighting: u32,
    pub draw_mode: u32,
}

impl From<&DvrConfig> for DvrUniforms {
    fn from(config: &DvrConfig) -> Self {
        Self {
            translucence: config.translucence.max(f32::EPSILON),
            diffuse_light: config.diffuse_light,
            lighting: u32::from(config.lighting),
            draw_mode: config.draw_mode.code(),
        }
    }
}

/// Classifies samples through a color map and composites them back to front.
#[derive(Debug, Clone)]
pub struct DvrMode {
    pub config: DvrConfig,
    pub color_map: ColorMap,
}

impl Default for DvrMode {
    fn default() -> Self {
        Self::new(DvrConfig::default(), default_color_map())
    }
}

impl DvrMode {
    pub fn new(config: DvrConfig, color_map: ColorMap) -> Self {
        Self { config, color_map }
    }
}

/// Soft tissue in red and bone in white, air transparent.
pub fn default_color_map() -> ColorMap {
    let mut color_map = ColorMap::default();
    color_map
        .write_hu_segment(
            Huv::new(-100),
            Huv::new(200),
            Vec4::new(0.6, 0.2, 0.1, 0.0),
            Vec4::new(0.9, 0.5, 0.4, 0.3),
        )
        .write_hu_segment(
            Huv::new(200),
            Huv::MAX,
            Vec4::new(0.9, 0.85, 0.8, 0.6),
            Vec4::ONE,
        );
    color_map
}

impl RayMarchingMode for DvrMode {
    type Uniforms = DvrUniforms;

    fn label(&self) -> &'static str {
        "DVR"
    }

    fn roles(&self) -> &'static [Role] {
        &[Role::Intensities, Role::Normals]
    }


    fn march_source(&self) -> &'static str {
        include_str!("../shaders/dvr.wgsl")
    }

    fn resolve_source(&self) -> &'static str {
        include_str!("../shaders/dvr_resolve.wgsl")
    }

    fn accumulation_blend(&self) -> wgpu::BlendState {
        wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING
    }

    fn clear_value(&self) -> wgpu::Color {
        wgpu::Color::TRANSPARENT
    }

    fn uniforms(&self) -> DvrUniforms {
        DvrUniforms::from(&self.config)
    }

    fn color_map_mut(&mut self) -> Option<&mut ColorMap> {
        Some(&mut self.color_map)
    }
}

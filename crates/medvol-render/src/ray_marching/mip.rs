//! Maximum intensity projection.

use glam::Vec4;
use medvol_core::{ColorMap, MipConfig, Role};

use super::RayMarchingMode;

/// GPU representation of [`MipConfig`].
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[allow(clippy::pub_underscore_fields)]
pub struct MipUniforms {
    pub min_intensity: f32,
    pub max_intensity: f32,
    pub _padding: [f32; 2],
}

impl From<&MipConfig> for MipUniforms {
    fn from(config: &MipConfig) -> Self {
        Self {
            min_intensity: config.min_intensity,
            max_intensity: config.max_intensity,
            _padding: [0.0; 2],
        }
    }
}

/// Keeps the brightest sample along each ray and colors it on resolve.
#[derive(Debug, Clone)]
pub struct MipMode {
    pub config: MipConfig,
    pub color_map: ColorMap,
}

impl Default for MipMode {
    fn default() -> Self {
        let mut color_map = ColorMap::default();
        color_map.write_linear_segment(0.0, 1.0, Vec4::new(0.0, 0.0, 0.0, 1.0), Vec4::ONE);
        Self::new(MipConfig::default(), color_map)
    }
}

impl MipMode {
    pub fn new(config: MipConfig, color_map: ColorMap) -> Self {
        Self { config, color_map }
    }
}

impl RayMarchingMode for MipMode {
    type Uniforms = MipUniforms;

    fn label(&self) -> &'static str {
        "MIP"
    }

    fn roles(&self) -> &'static [Role] {
        &[Role::Intensities]
    }


    fn march_source(&self) -> &'static str {
        include_str!("../shaders/mip.wgsl")
    }

    fn resolve_source(&self) -> &'static str {
        include_str!("../shaders/mip_resolve.wgsl")
    }

    fn accumulation_blend(&self) -> wgpu::BlendState {
        let max = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Max,
        };
        wgpu::BlendState { color: max, alpha: max }
    }

    // Below any intensity, so untouched pixels stay transparent on resolve.
    fn clear_value(&self) -> wgpu::Color {
        wgpu::Color {
            r: -1.0,
            g: -1.0,
            b: -1.0,
            a: 0.0,
        }
    }

    fn uniforms(&self) -> MipUniforms {
        MipUniforms::from(&self.config)
    }

    fn color_map_mut(&mut self) -> Option<&mut ColorMap> {
        Some(&mut self.color_map)
    }
}

//! Digital radiograph reconstruction.

use medvol_core::{DrrConfig, Role};

use super::RayMarchingMode;

/// GPU representation of [`DrrConfig`]. Thresholds are intensities.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[allow(clippy::pub_underscore_fields)]
pub struct DrrUniforms {
    pub water_attenuation: f32,
    pub base_intensity: f32,
    pub lower_threshold: f32,
    pub upper_threshold: f32,
    pub upper_multiplier: f32,
    pub render_inverse: u32,
    pub _padding: [f32; 2],
}

impl From<&DrrConfig> for DrrUniforms {
    fn from(config: &DrrConfig) -> Self {
        Self {
            water_attenuation: config.water_attenuation,
            base_intensity: config.base_intensity,
            lower_threshold: config.lower_threshold.to_intensity(),
            upper_threshold: config.upper_threshold.to_intensity(),
            upper_multiplier: config.upper_multiplier,
            render_inverse: u32::from(config.render_inverse),
            _padding: [0.0; 2],
        }
    }
}

/// Sums attenuation along each ray and converts it to transmitted light.
#[derive(Debug, Clone, Default)]
pub struct DrrMode {
    pub config: DrrConfig,
}

impl DrrMode {
    pub fn new(config: DrrConfig) -> Self {
        Self { config }
    }
}

impl RayMarchingMode for DrrMode {
    type Uniforms = DrrUniforms;

    fn label(&self) -> &'static str {
        "DRR"
    }

    fn roles(&self) -> &'static [Role] {
        &[Role::Intensities]
    }


    fn march_source(&self) -> &'static str {
        include_str!("../shaders/drr.wgsl")
    }

    fn resolve_source(&self) -> &'static str {
        include_str!("../shaders/drr_resolve.wgsl")
    }

    fn accumulation_blend(&self) -> wgpu::BlendState {
        let add = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        };
        wgpu::BlendState { color: add, alpha: add }
    }

    fn clear_value(&self) -> wgpu::Color {
        wgpu::Color::TRANSPARENT
    }

    fn uniforms(&self) -> DrrUniforms {
        DrrUniforms::from(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medvol_core::Huv;

    #[test]
    fn test_thresholds_become_intensities() {
        let config = DrrConfig::default().with_thresholds(Huv::new(-1024), Huv::new(3071));
        let uniforms = DrrUniforms::from(&config);
        assert_eq!(uniforms.lower_threshold, 0.0);
        assert_eq!(uniforms.upper_threshold, 1.0);
        assert_eq!(std::mem::size_of::<DrrUniforms>(), 32);
    }

    #[test]
    fn test_march_shader_reads_step_length() {
        let mut mode = DrrMode::default();
        assert!(mode.march_source().contains("segment.step_length"));
        assert!(mode.color_map_mut().is_none());
    }
}

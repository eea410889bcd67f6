//! Binary mask rendering.
//!
//! The march pass projects the segment label maps into the accumulation
//! target, keeping 1 wherever any sample along the ray is labeled. The
//! resolve pass either fills the projected region with the mask color or,
//! with filling off, draws only the pixels on its outline.

use medvol_core::{MaskConfig, Role};

use super::RayMarchingMode;

/// GPU representation of [`MaskConfig`].
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[allow(clippy::pub_underscore_fields)]
pub struct MaskUniforms {
    pub color: [f32; 4],
    pub filling: u32,
    pub _padding: [u32; 3],
}

impl From<&MaskConfig> for MaskUniforms {
    fn from(config: &MaskConfig) -> Self {
        Self {
            color: config.color,
            filling: u32::from(config.filling),
            _padding: [0; 3],
        }
    }
}

/// Draws the regions labeled in the segment masks.
#[derive(Debug, Clone, Default)]
pub struct MaskMode {
    pub config: MaskConfig,
}

impl MaskMode {
    pub fn new(config: MaskConfig) -> Self {
        Self { config }
    }

    pub fn set_color(&mut self, color: [f32; 4]) {
        self.config = self.config.clone().with_color(color);
    }

    /// Draws outlines only when `borders` is set.
    pub fn set_render_borders(&mut self, borders: bool) {
        self.config.filling = !borders;
    }
}

impl RayMarchingMode for MaskMode {
    type Uniforms = MaskUniforms;

    fn label(&self) -> &'static str {
        "Mask"
    }

    fn roles(&self) -> &'static [Role] {
        &[Role::Mask]
    }

    fn march_source(&self) -> &'static str {
        include_str!("../shaders/mask.wgsl")
    }

    fn resolve_source(&self) -> &'static str {
        include_str!("../shaders/mask_resolve.wgsl")
    }

    fn accumulation_blend(&self) -> wgpu::BlendState {
        let max = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Max,
        };
        wgpu::BlendState { color: max, alpha: max }
    }

    fn clear_value(&self) -> wgpu::Color {
        wgpu::Color::TRANSPARENT
    }

    fn uniforms(&self) -> MaskUniforms {
        MaskUniforms::from(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ray_marching::volume_declarations;
    use crate::shader::{ShaderBuilder, ShaderCapabilities};

    #[test]
    fn test_uniforms_layout() {
        assert_eq!(std::mem::size_of::<MaskUniforms>(), 32);
        let uniforms = MaskUniforms::from(&MaskConfig::default());
        assert_eq!(uniforms.color, [0.0, 1.0, 0.0, 1.0]);
        assert_eq!(uniforms.filling, 1);
    }

    #[test]
    fn test_render_borders_toggles_filling() {
        let mut mode = MaskMode::default();
        mode.set_render_borders(true);
        assert_eq!(mode.uniforms().filling, 0);
        assert!(mode.config.render_borders());
        mode.set_color([1.0, 0.0, 0.0, 0.5]);
        assert_eq!(mode.uniforms().color, [1.0, 0.0, 0.0, 0.5]);
    }

    #[test]
    fn test_mask_is_the_only_volume_binding() {
        let mode = MaskMode::default();
        assert_eq!(mode.roles(), &[Role::Mask]);
        assert_eq!(mode.uniform_name(Role::Mask), "mask");

        let source = ShaderBuilder::new()
            .with_chunk(volume_declarations(&mode, 0))
            .with_vertex(include_str!("../shaders/segment.wgsl"))
            .with_fragment(mode.march_source())
            .combined_source()
            .unwrap();
        let caps = ShaderCapabilities::reflect(&source).unwrap();
        assert_eq!(caps.volume_bindings.len(), 1);
        assert_eq!(caps.volume_bindings[0].name, "mask");
        assert!(!caps.uses_step_length);
    }

    #[test]
    fn test_resolve_source_parses() {
        let source = ShaderBuilder::new()
            .with_vertex(include_str!("../shaders/fullscreen.wgsl"))
            .with_fragment(MaskMode::default().resolve_source())
            .combined_source()
            .unwrap();
        let caps = ShaderCapabilities::reflect(&source).unwrap();
        assert!(caps.volume_bindings.is_empty());
    }

    #[test]
    fn test_blend_keeps_coverage() {
        let blend = MaskMode::default().accumulation_blend();
        assert_eq!(blend.color.operation, wgpu::BlendOperation::Max);
        assert_eq!(MaskMode::default().clear_value(), wgpu::Color::TRANSPARENT);
    }
}

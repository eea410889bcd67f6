//! Interface between the engine and its render stages.

use glam::Mat4;
use medvol_core::Node;

use crate::error::RenderResult;
use crate::framebuffer::Framebuffer;
use crate::texture3d::ManagedTexture3D;

/// Scene graph whose geometries carry GPU volume textures.
pub type SceneNode = Node<ManagedTexture3D>;

/// Geometry type of volume segments unless configured otherwise.
pub const VOLUME_GEOMETRY_TYPE: u32 = 1;

/// Per-frame state handed to every stage.
pub struct FrameContext<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub framebuffer: &'a Framebuffer,
    pub view: Mat4,
    pub projection: Mat4,
}

/// One step of a frame, drawing into the framebuffer's scene and depth targets.
///
/// Stages run in the order they were appended to the engine. They must load,
/// not clear, the scene and depth targets; the engine clears them.
pub trait RenderStage {
    fn name(&self) -> &str;

    fn render(
        &mut self,
        frame: &FrameContext<'_>,
        encoder: &mut wgpu::CommandEncoder,
        root: &SceneNode,
    ) -> RenderResult<()>;
}

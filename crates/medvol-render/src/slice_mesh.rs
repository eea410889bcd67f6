//! GPU buffers of the ray-marching slice stack.

use medvol_core::SliceMesh;

use crate::buffer::{create_index_buffer, create_vertex_buffer};
use crate::error::RenderResult;

/// Vertex layout of a slice mesh: one `vec3<f32>` tangent-space position.
pub const SLICE_VERTEX_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: 12,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &[wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Float32x3,
        offset: 0,
        shader_location: 0,
    }],
};

/// Uploaded slice stack for one sample rate.
pub struct SliceMeshBuffers {
    sample_rate: u32,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

impl SliceMeshBuffers {
    pub fn new(device: &wgpu::Device, sample_rate: u32) -> RenderResult<Self> {
        let mesh = SliceMesh::new(sample_rate)?;
        let vertex_buffer =
            create_vertex_buffer(device, &mesh.vertices, Some("slice mesh vertices"));
        let index_buffer = create_index_buffer(device, &mesh.indices, Some("slice mesh indices"));
        #[allow(clippy::cast_possible_truncation)]
        let index_count = mesh.indices.len() as u32;
        Ok(Self {
            sample_rate,
            vertex_buffer,
            index_buffer,
            index_count,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Binds the buffers and draws all slices.
    pub fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        render_pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

/// Holds the slice mesh of the current sample rate, rebuilding it on change.
#[derive(Default)]
pub struct SliceMeshCache {
    current: Option<SliceMeshBuffers>,
}

impl SliceMeshCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the buffers for `sample_rate`, uploading a new mesh if it differs.
    pub fn get(&mut self, device: &wgpu::Device, sample_rate: u32) -> RenderResult<&SliceMeshBuffers> {
        let mesh = match self.current.take() {
            Some(mesh) if mesh.sample_rate == sample_rate => mesh,
            _ => {
                let mesh = SliceMeshBuffers::new(device, sample_rate)?;
                log::debug!("created new slice mesh with {sample_rate} samples per pixel");
                mesh
            }
        };
        Ok(self.current.insert(mesh))
    }

    pub fn current(&self) -> Option<&SliceMeshBuffers> {
        self.current.as_ref()
    }
}

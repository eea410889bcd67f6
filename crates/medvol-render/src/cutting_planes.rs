//! Opaque, windowed HU slices where planes cut through volume segments.

use glam::{Mat4, Vec3};
use medvol_core::cutting_plane::triangulate_fan;
use medvol_core::{CuttingPlane, CuttingPlanesConfig, RenderOrder, RenderQueue, Role, VolumeTexture};

use crate::buffer::{create_uniform_buffer, create_vertex_buffer};
use crate::error::RenderResult;
use crate::framebuffer::{DEPTH_FORMAT, SCENE_FORMAT};
use crate::shader::ShaderBuilder;
use crate::slice_mesh::SLICE_VERTEX_LAYOUT;
use crate::stage::{FrameContext, RenderStage, SceneNode};

/// GPU representation of the per-segment plane uniforms.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[allow(clippy::pub_underscore_fields)]
pub struct PlaneUniforms {
    pub model_view_projection: [[f32; 4]; 4],
    pub model_texture: [[f32; 4]; 4],
    pub min_intensity: f32,
    pub max_intensity: f32,
    pub render_inverse: u32,
    pub _padding: f32,
}

/// Triangles of `plane` clipped to the segment placed by `world`, in the
/// segment's model space. Empty when the plane misses the segment.
pub fn plane_triangles(plane: &CuttingPlane, world: &Mat4) -> Vec<[f32; 3]> {
    plane
        .to_model_space(world)
        .intersect_unit_box()
        .map(|polygon| {
            triangulate_fan(&polygon)
                .into_iter()
                .flatten()
                .map(|v| v.to_array())
                .collect()
        })
        .unwrap_or_default()
}

struct PlaneDraw {
    vertex_buffer: wgpu::Buffer,
    vertex_count: u32,
    bind_group: wgpu::BindGroup,
}

/// Draws world-space cutting planes through every segment of one geometry type.
pub struct CuttingPlanesStage {
    geometry_type: u32,
    planes: Vec<CuttingPlane>,
    config: CuttingPlanesConfig,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

impl CuttingPlanesStage {
    pub fn new(device: &wgpu::Device, geometry_type: u32, config: CuttingPlanesConfig) -> RenderResult<Self> {
        // Create bind group layout
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Cutting Plane Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D3,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        // Create shader
        let source = include_str!("shaders/cutting_plane.wgsl");
        let (shader, _) = ShaderBuilder::new()
            .with_vertex(source)
            .with_fragment(source)
            .with_label("Cutting Plane Shader")
            .build_module(device)?;

        // Create pipeline layout
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Cutting Plane Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        // Create render pipeline
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Cutting Plane Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[SLICE_VERTEX_LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: SCENE_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Cutting Plane Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(Self {
            geometry_type,
            planes: Vec::new(),
            config,
            pipeline,
            bind_group_layout,
            sampler,
        })
    }

    /// Adds a plane given in world space.
    pub fn add_plane(&mut self, plane: CuttingPlane) {
        self.planes.push(plane);
    }

    pub fn clear_planes(&mut self) {
        self.planes.clear();
    }

    pub fn planes(&self) -> &[CuttingPlane] {
        &self.planes
    }

    pub fn config(&self) -> &CuttingPlanesConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: CuttingPlanesConfig) {
        self.config = config;
    }
}

impl RenderStage for CuttingPlanesStage {
    fn name(&self) -> &str {
        "Cutting Planes"
    }

    fn render(
        &mut self,
        frame: &FrameContext<'_>,
        encoder: &mut wgpu::CommandEncoder,
        root: &SceneNode,
    ) -> RenderResult<()> {
        if self.planes.is_empty() {
            return Ok(());
        }
        let device = frame.device;
        let render_queue = RenderQueue::build(root, frame.view, self.geometry_type, RenderOrder::FrontToBack);

        let mut draws = Vec::new();
        for renderable in render_queue.iter() {
            let Some(texture) = renderable.geometry().feature(Role::Intensities) else {
                continue;
            };
            let uniforms = PlaneUniforms {
                model_view_projection: (frame.projection * renderable.model_view()).to_cols_array_2d(),
                model_texture: (texture.texture_coordinates_correction()
                    * Mat4::from_translation(Vec3::splat(0.5)))
                .to_cols_array_2d(),
                min_intensity: self.config.min_intensity(),
                max_intensity: self.config.max_intensity(),
                render_inverse: u32::from(self.config.render_inverse),
                _padding: 0.0,
            };
            let uniform_buffer = create_uniform_buffer(device, &uniforms, Some("Cutting Plane Uniform Buffer"));
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Cutting Plane Bind Group"),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(texture.view()),
                    },
                ],
            });

            let world = renderable.world_transform();
            let vertices: Vec<[f32; 3]> = self
                .planes
                .iter()
                .flat_map(|plane| plane_triangles(plane, &world))
                .collect();
            if vertices.is_empty() {
                continue;
            }
            #[allow(clippy::cast_possible_truncation)]
            let vertex_count = vertices.len() as u32;
            draws.push(PlaneDraw {
                vertex_buffer: create_vertex_buffer(device, &vertices, Some("Cutting Plane Vertices")),
                vertex_count,
                bind_group,
            });
        }

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Cutting Plane Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: frame.framebuffer.scene().view(),
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: frame.framebuffer.depth().view(),
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });

        render_pass.set_pipeline(&self.pipeline);
        for draw in &draws {
            render_pass.set_bind_group(0, &draw.bind_group, &[]);
            render_pass.set_vertex_buffer(0, draw.vertex_buffer.slice(..));
            render_pass.draw(0..draw.vertex_count, 0..1);
        }
        Ok(())
    }
}

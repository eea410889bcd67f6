//! Slice-based ray marching through volume segments.
//!
//! Every segment is drawn as a stack of camera-facing slices. Fragments of
//! each slice sample the segment textures and write into the framebuffer's
//! accumulation target with a mode-specific blend operator; a fullscreen
//! resolve pass then composites the accumulated result onto the scene.
//!
//! Segments are visited back to front by bounding-box distance, and every
//! slice is depth tested against the scene depth without writing it.

mod drr;
mod dvr;
mod mask;
mod mip;

pub use drr::{DrrMode, DrrUniforms};
pub use dvr::{DvrMode, DvrUniforms};
pub use mask::{MaskMode, MaskUniforms};
pub use mip::{MipMode, MipUniforms};

use std::collections::BTreeMap;

use glam::{Mat4, Vec3};
use medvol_core::math::{basis, max_abs_element};
use medvol_core::{
    ColorMap, Geometry, MedvolError, RenderOrder, RenderQueue, Role, VolumeTexture, DEFAULT_SAMPLE_RATE,
};

use crate::buffer::{create_uniform_buffer, update_uniform_buffer};
use crate::color_map::ColorMapTexture;
use crate::error::RenderResult;
use crate::framebuffer::{ACCUMULATION_FORMAT, DEPTH_FORMAT, SCENE_FORMAT};
use crate::shader::{ShaderBuilder, ShaderCapabilities};
use crate::slice_mesh::{SliceMeshCache, SLICE_VERTEX_LAYOUT};
use crate::stage::{FrameContext, RenderStage, SceneNode};
use crate::texture3d::{ManagedTexture3D, INTENSITY_FORMAT, MASK_FORMAT, NORMALS_FORMAT};

/// GPU representation of the per-segment uniforms.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[allow(clippy::pub_underscore_fields)]
pub struct SegmentUniforms {
    pub model_view_projection: [[f32; 4]; 4],
    pub model_texture: [[f32; 4]; 4],
    pub tangent_model: [[f32; 4]; 4],
    pub view_direction: [f32; 4],
    pub step_length: f32,
    pub _padding: [f32; 3],
}

/// Transforms needed to draw the slice stack of one segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentTransforms {
    pub model_view_projection: Mat4,
    /// Model space `[-0.5, 0.5]^3` to corrected texture coordinates.
    pub model_texture: Mat4,
    /// Tangent space of the slices to model space, including the cover scale.
    pub tangent_model: Mat4,
    /// Normalized view direction in model space.
    pub view_direction: Vec3,
    /// World-space distance between two successive slices.
    pub step_length: f32,
}

impl SegmentTransforms {
    /// Computes the transforms of a segment seen through `model_view`.
    ///
    /// The slice normal points against the view direction so that slice 0 is
    /// the farthest one. Tangent and bitangent are the view axes in model
    /// space; they stay unorthogonalized so that slices are parallel to the
    /// image plane even under non-uniform model scaling.
    #[allow(clippy::cast_precision_loss)]
    pub fn compute(
        world: Mat4,
        model_view: Mat4,
        projection: Mat4,
        texture_correction: Mat4,
        sample_rate: u32,
    ) -> Self {
        let view_model = model_view.inverse();
        let view_direction = view_model.transform_vector3(Vec3::NEG_Z).normalize_or_zero();
        let normal = -view_direction;
        let tangent = view_model.transform_vector3(Vec3::X).normalize_or_zero();
        let bitangent = view_model.transform_vector3(Vec3::Y).normalize_or_zero();
        let slice_basis = basis(tangent, bitangent, normal);
        let scale = cover_scale(&slice_basis);

        let last_slice = view_direction * (3.0_f32.sqrt() / 2.0);
        let total_length = (world.transform_point3(-last_slice) - world.transform_point3(last_slice)).length();

        Self {
            model_view_projection: projection * model_view,
            model_texture: texture_correction * Mat4::from_translation(Vec3::splat(0.5)),
            tangent_model: slice_basis * Mat4::from_scale(Vec3::splat(scale)),
            view_direction,
            step_length: total_length / (sample_rate + 1) as f32,
        }
    }

    /// Packs the transforms for upload. `step_length` is zeroed when unused.
    pub fn uniforms(&self, upload_step_length: bool) -> SegmentUniforms {
        SegmentUniforms {
            model_view_projection: self.model_view_projection.to_cols_array_2d(),
            model_texture: self.model_texture.to_cols_array_2d(),
            tangent_model: self.tangent_model.to_cols_array_2d(),
            view_direction: self.view_direction.extend(0.0).to_array(),
            step_length: if upload_step_length { self.step_length } else { 0.0 },
            _padding: [0.0; 3],
        }
    }
}

/// Uniform scale of the slice stack that keeps every corner of the unit cube
/// within the stack's reach, however skewed `slice_basis` is.
pub fn cover_scale(slice_basis: &Mat4) -> f32 {
    if slice_basis.determinant().abs() <= f32::EPSILON {
        return 1.0;
    }
    let model_tangent = slice_basis.inverse();
    let reach = unit_cube_corners()
        .map(|corner| max_abs_element(model_tangent.transform_vector3(corner)))
        .fold(0.0_f32, f32::max);
    (reach / (3.0_f32.sqrt() / 2.0)).max(1.0)
}

fn unit_cube_corners() -> impl Iterator<Item = Vec3> {
    (0..8).map(|i| {
        Vec3::new(
            if i & 1 == 0 { -0.5 } else { 0.5 },
            if i & 2 == 0 { -0.5 } else { 0.5 },
            if i & 4 == 0 { -0.5 } else { 0.5 },
        )
    })
}

/// Shader-level specialization of the ray-marching stage.
pub trait RayMarchingMode {
    /// Mode parameters as laid out in the shaders.
    type Uniforms: bytemuck::Pod;

    fn label(&self) -> &'static str;

    /// Texture roles the shader samples, in binding order.
    fn roles(&self) -> &'static [Role];

    /// Name of the WGSL variable bound to `role`.
    fn uniform_name(&self, role: Role) -> &'static str {
        match role {
            Role::Intensities => "intensities",
            Role::Normals => "normals",
            Role::Mask => "mask",
        }
    }

    /// Fragment stage writing one sample into the accumulation target.
    fn march_source(&self) -> &'static str;

    /// Fragment stage compositing the accumulation target onto the scene.
    fn resolve_source(&self) -> &'static str;

    /// Operator combining samples in the accumulation target.
    fn accumulation_blend(&self) -> wgpu::BlendState;

    /// Initial value of the accumulation target.
    fn clear_value(&self) -> wgpu::Color;

    fn uniforms(&self) -> Self::Uniforms;

    fn color_map_mut(&mut self) -> Option<&mut ColorMap> {
        None
    }
}

struct SegmentSlot {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// Renders all geometries of one type through a [`RayMarchingMode`].
pub struct RayMarchingStage<M: RayMarchingMode> {
    mode: M,
    geometry_type: u32,
    sample_rate: u32,
    first_volume_unit: u32,
    capabilities: ShaderCapabilities,
    march_pipeline: wgpu::RenderPipeline,
    resolve_pipeline: wgpu::RenderPipeline,
    segment_layout: wgpu::BindGroupLayout,
    volume_layout: wgpu::BindGroupLayout,
    mode_layout: wgpu::BindGroupLayout,
    resolve_layout: wgpu::BindGroupLayout,
    volume_sampler: wgpu::Sampler,
    mode_buffer: wgpu::Buffer,
    color_map: ColorMapTexture,
    fallback_color_map: ColorMap,
    placeholders: BTreeMap<Role, ManagedTexture3D>,
    segment_slots: Vec<SegmentSlot>,
    slice_mesh: SliceMeshCache,
    drawn_segments: usize,
}

impl<M: RayMarchingMode> RayMarchingStage<M> {
    /// Creates a stage drawing geometries of `geometry_type`.
    ///
    /// Segment textures are bound from `first_volume_unit` on in the order
    /// of [`RayMarchingMode::roles`].
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        mut mode: M,
        geometry_type: u32,
        first_volume_unit: u32,
    ) -> RenderResult<Self> {
        let label = mode.label();

        // Create shaders
        let (march_shader, capabilities) = ShaderBuilder::new()
            .with_chunk(volume_declarations(&mode, first_volume_unit))
            .with_vertex(include_str!("../shaders/segment.wgsl"))
            .with_fragment(mode.march_source())
            .with_label(format!("{label} March Shader"))
            .build_module(device)?;
        if !capabilities.uses_step_length {
            log::debug!("{label} shader does not read the step length");
        }

        let (resolve_shader, _) = ShaderBuilder::new()
            .with_vertex(include_str!("../shaders/fullscreen.wgsl"))
            .with_fragment(mode.resolve_source())
            .with_label(format!("{label} Resolve Shader"))
            .build_module(device)?;

        // Create bind group layouts
        let segment_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Segment Bind Group Layout"),
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
            ],
        });

        let volume_entries: Vec<wgpu::BindGroupLayoutEntry> = capabilities
            .volume_bindings
            .iter()
            .map(|binding| wgpu::BindGroupLayoutEntry {
                binding: binding.binding,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D3,
                    multisampled: false,
                },
                count: None,
            })
            .collect();
        let volume_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Volume Textures Bind Group Layout"),
            entries: &volume_entries,
        });

        let mode_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Mode Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
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
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D1,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let resolve_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Resolve Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }],
        });

        // Create pipelines
        let march_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Ray Marching Pipeline Layout"),
            bind_group_layouts: &[&segment_layout, &volume_layout, &mode_layout],
            push_constant_ranges: &[],
        });

        let march_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{label} March Pipeline")),
            layout: Some(&march_layout),
            vertex: wgpu::VertexState {
                module: &march_shader,
                entry_point: Some("vs_main"),
                buffers: &[SLICE_VERTEX_LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &march_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: ACCUMULATION_FORMAT,
                    blend: Some(mode.accumulation_blend()),
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
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let resolve_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Resolve Pipeline Layout"),
            bind_group_layouts: &[&resolve_layout, &mode_layout],
            push_constant_ranges: &[],
        });

        let resolve_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{label} Resolve Pipeline")),
            layout: Some(&resolve_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &resolve_shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &resolve_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: SCENE_FORMAT,
                    blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let volume_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Volume Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let mode_buffer = create_uniform_buffer(device, &mode.uniforms(), Some("Mode Uniform Buffer"));

        let mut fallback_color_map = ColorMap::new(2);
        let color_map = match mode.color_map_mut() {
            Some(color_map) => ColorMapTexture::new(device, queue, color_map),
            None => ColorMapTexture::new(device, queue, &mut fallback_color_map),
        };

        let placeholders = mode
            .roles()
            .iter()
            .map(|&role| {
                let format = match role {
                    Role::Intensities => INTENSITY_FORMAT,
                    Role::Normals => NORMALS_FORMAT,
                    Role::Mask => MASK_FORMAT,
                };
                (role, ManagedTexture3D::placeholder(device, queue, format))
            })
            .collect();

        Ok(Self {
            mode,
            geometry_type,
            sample_rate: DEFAULT_SAMPLE_RATE,
            first_volume_unit,
            capabilities,
            march_pipeline,
            resolve_pipeline,
            segment_layout,
            volume_layout,
            mode_layout,
            resolve_layout,
            volume_sampler,
            mode_buffer,
            color_map,
            fallback_color_map,
            placeholders,
            segment_slots: Vec::new(),
            slice_mesh: SliceMeshCache::new(),
            drawn_segments: 0,
        })
    }

    pub fn mode(&self) -> &M {
        &self.mode
    }

    /// Mutable access to the mode; changes take effect on the next frame.
    pub fn mode_mut(&mut self) -> &mut M {
        &mut self.mode
    }

    pub fn geometry_type(&self) -> u32 {
        self.geometry_type
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Sets the number of slices per segment. At least two are required.
    pub fn set_sample_rate(&mut self, sample_rate: u32) -> RenderResult<()> {
        if sample_rate < 2 {
            return Err(MedvolError::InvalidSampleRate(sample_rate).into());
        }
        self.sample_rate = sample_rate;
        Ok(())
    }

    pub fn first_volume_unit(&self) -> u32 {
        self.first_volume_unit
    }

    pub fn capabilities(&self) -> &ShaderCapabilities {
        &self.capabilities
    }

    /// Number of segments drawn by the last frame.
    pub fn drawn_segments(&self) -> usize {
        self.drawn_segments
    }

    fn ensure_segment_slots(&mut self, device: &wgpu::Device, count: usize) {
        while self.segment_slots.len() < count {
            let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Segment Uniform Buffer"),
                size: std::mem::size_of::<SegmentUniforms>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Segment Bind Group"),
                layout: &self.segment_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.volume_sampler),
                    },
                ],
            });
            self.segment_slots.push(SegmentSlot { buffer, bind_group });
        }
    }

    /// Binds every declared volume texture to the matching geometry feature.
    fn volume_bind_group(
        &self,
        device: &wgpu::Device,
        geometry: &Geometry<ManagedTexture3D>,
    ) -> wgpu::BindGroup {
        let views: Vec<(u32, &wgpu::TextureView)> = self
            .capabilities
            .volume_bindings
            .iter()
            .filter_map(|binding| {
                let role = *self
                    .mode
                    .roles()
                    .iter()
                    .find(|&&role| self.mode.uniform_name(role) == binding.name)?;
                let texture = geometry
                    .feature(role)
                    .map(|texture| &**texture)
                    .or_else(|| self.placeholders.get(&role))?;
                Some((binding.binding, texture.view()))
            })
            .collect();

        let entries: Vec<wgpu::BindGroupEntry<'_>> = views
            .iter()
            .map(|(binding, view)| wgpu::BindGroupEntry {
                binding: *binding,
                resource: wgpu::BindingResource::TextureView(view),
            })
            .collect();

        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Volume Textures Bind Group"),
            layout: &self.volume_layout,
            entries: &entries,
        })
    }
}

impl<M: RayMarchingMode> RenderStage for RayMarchingStage<M> {
    fn name(&self) -> &str {
        self.mode.label()
    }

    fn render(
        &mut self,
        frame: &FrameContext<'_>,
        encoder: &mut wgpu::CommandEncoder,
        root: &SceneNode,
    ) -> RenderResult<()> {
        let device = frame.device;

        // Mode parameters and color map
        update_uniform_buffer(frame.queue, &self.mode_buffer, &self.mode.uniforms());
        let color_map = match self.mode.color_map_mut() {
            Some(color_map) => color_map,
            None => &mut self.fallback_color_map,
        };
        self.color_map.sync(device, frame.queue, color_map);

        let mode_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Mode Bind Group"),
            layout: &self.mode_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.mode_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(self.color_map.view()),
                },
            ],
        });

        // Segments, farthest first
        let render_queue = RenderQueue::build(root, frame.view, self.geometry_type, RenderOrder::BackToFront);
        self.ensure_segment_slots(device, render_queue.len());

        let mut volume_bind_groups = Vec::with_capacity(render_queue.len());
        for (renderable, slot) in render_queue.iter().zip(&self.segment_slots) {
            let geometry = renderable.geometry();
            // Every role of a segment shares the same texel grid
            let correction = self
                .mode
                .roles()
                .iter()
                .find_map(|&role| geometry.feature(role))
                .map_or(Mat4::IDENTITY, |texture| texture.texture_coordinates_correction());
            let transforms = SegmentTransforms::compute(
                renderable.world_transform(),
                renderable.model_view(),
                frame.projection,
                correction,
                self.sample_rate,
            );
            update_uniform_buffer(
                frame.queue,
                &slot.buffer,
                &transforms.uniforms(self.capabilities.uses_step_length),
            );
            volume_bind_groups.push(self.volume_bind_group(device, geometry));
        }

        let slice_mesh = self.slice_mesh.get(device, self.sample_rate)?;

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Ray Marching Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: frame.framebuffer.accumulation().view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.mode.clear_value()),
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

            render_pass.set_pipeline(&self.march_pipeline);
            render_pass.set_bind_group(2, &mode_bind_group, &[]);
            for (slot, volume_bind_group) in self.segment_slots.iter().zip(&volume_bind_groups) {
                render_pass.set_bind_group(0, &slot.bind_group, &[]);
                render_pass.set_bind_group(1, volume_bind_group, &[]);
                slice_mesh.draw(&mut render_pass);
            }
        }

        let resolve_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Resolve Bind Group"),
            layout: &self.resolve_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(frame.framebuffer.accumulation().view()),
            }],
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Ray Marching Resolve Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: frame.framebuffer.scene().view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                ..Default::default()
            });

            render_pass.set_pipeline(&self.resolve_pipeline);
            render_pass.set_bind_group(0, &resolve_bind_group, &[]);
            render_pass.set_bind_group(1, &mode_bind_group, &[]);
            render_pass.draw(0..3, 0..1); // Fullscreen triangle
        }

        self.drawn_segments = volume_bind_groups.len();
        Ok(())
    }
}

/// WGSL declarations of the segment textures, one binding per role.
fn volume_declarations<M: RayMarchingMode>(mode: &M, first_volume_unit: u32) -> String {
    (first_volume_unit..)
        .zip(mode.roles())
        .map(|(binding, &role)| {
            format!(
                "@group(1) @binding({binding}) var {}: texture_3d<f32>;",
                mode.uniform_name(role)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use medvol_core::slice_mesh::slice_radius;
    use proptest::prelude::*;

    #[test]
    fn test_segment_uniforms_size() {
        assert_eq!(std::mem::size_of::<SegmentUniforms>(), 224);
    }

    #[test]
    fn test_axis_aligned_view() {
        let model_view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        let t = SegmentTransforms::compute(Mat4::IDENTITY, model_view, Mat4::IDENTITY, Mat4::IDENTITY, 200);
        assert!(t.view_direction.abs_diff_eq(Vec3::NEG_Z, 1e-6));
        assert!(t.tangent_model.abs_diff_eq(Mat4::IDENTITY, 1e-6));
        assert_abs_diff_eq!(t.step_length, 3.0_f32.sqrt() / 201.0, epsilon = 1e-6);
    }

    #[test]
    fn test_step_length_is_world_scaled() {
        let world = Mat4::from_scale(Vec3::new(1.0, 1.0, 4.0));
        let model_view = Mat4::from_translation(Vec3::new(0.0, 0.0, -10.0)) * world;
        let t = SegmentTransforms::compute(world, model_view, Mat4::IDENTITY, Mat4::IDENTITY, 99);
        assert_abs_diff_eq!(t.step_length, 4.0 * 3.0_f32.sqrt() / 100.0, epsilon = 1e-5);
    }

    #[test]
    fn test_first_slice_is_farthest() {
        let model_view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0))
            * Mat4::from_rotation_y(0.4);
        let t = SegmentTransforms::compute(Mat4::IDENTITY, model_view, Mat4::IDENTITY, Mat4::IDENTITY, 10);
        let first = model_view.transform_point3(t.tangent_model.transform_point3(Vec3::new(0.0, 0.0, -1.0)));
        let last = model_view.transform_point3(t.tangent_model.transform_point3(Vec3::new(0.0, 0.0, 1.0)));
        assert!(first.z < last.z);
    }

    #[test]
    fn test_model_texture_maps_corners_to_texel_centers() {
        let correction = medvol_core::texture::texture_coordinates_correction(glam::UVec3::splat(4));
        let t = SegmentTransforms::compute(
            Mat4::IDENTITY,
            Mat4::from_translation(Vec3::NEG_Z * 3.0),
            Mat4::IDENTITY,
            correction,
            10,
        );
        let low = t.model_texture.transform_point3(Vec3::splat(-0.5));
        let high = t.model_texture.transform_point3(Vec3::splat(0.5));
        assert!(low.abs_diff_eq(Vec3::splat(0.125), 1e-6));
        assert!(high.abs_diff_eq(Vec3::splat(0.875), 1e-6));
    }

    #[test]
    fn test_orthonormal_basis_needs_no_scale() {
        let rotation = Mat4::from_rotation_x(0.3) * Mat4::from_rotation_z(1.1);
        assert_abs_diff_eq!(cover_scale(&rotation), 1.0, epsilon = 1e-6);
        assert_eq!(cover_scale(&Mat4::ZERO), 1.0);
    }

    #[test]
    fn test_volume_declarations() {
        let source = volume_declarations(&DvrMode::default(), 3);
        assert!(source.contains("@group(1) @binding(3) var intensities: texture_3d<f32>;"));
        assert!(source.contains("@group(1) @binding(4) var normals: texture_3d<f32>;"));
        let caps = ShaderCapabilities::reflect(&source).unwrap();
        assert_eq!(caps.volume_bindings.len(), 2);
    }

    proptest! {
        #[test]
        fn prop_slices_cover_unit_cube(
            yaw in -3.0f32..3.0,
            pitch in -1.5f32..1.5,
            sx in 0.2f32..5.0,
            sy in 0.2f32..5.0,
            sz in 0.2f32..5.0,
        ) {
            let world = Mat4::from_scale(Vec3::new(sx, sy, sz));
            let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -20.0))
                * Mat4::from_rotation_x(pitch)
                * Mat4::from_rotation_y(yaw);
            let model_view = view * world;
            let t = SegmentTransforms::compute(world, model_view, Mat4::IDENTITY, Mat4::IDENTITY, 50);
            let model_tangent = t.tangent_model.inverse();
            for corner in unit_cube_corners() {
                let reach = max_abs_element(model_tangent.transform_point3(corner));
                prop_assert!(reach <= slice_radius() + 1e-4);
            }
        }
    }
}

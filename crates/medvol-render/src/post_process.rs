//! Post-processing of the composited scene: flips, rotation, color
//! operation and circular mask.

use medvol_core::PostProcessConfig;

use crate::buffer::{create_uniform_buffer, update_uniform_buffer};
use crate::error::RenderResult;
use crate::framebuffer::{Framebuffer, COLOR_FORMAT, DEPTH_IMAGE_FORMAT};
use crate::shader::ShaderBuilder;

/// GPU representation of post-process uniforms.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PostProcessUniforms {
    pub texture_transform: [[f32; 4]; 4],
    pub viewport: [f32; 2],
    pub color_operation: u32,
    pub circular_mask: u32, // 0 = disabled, 1 = enabled
}

impl PostProcessUniforms {
    #[allow(clippy::cast_precision_loss)]
    pub fn new(config: &PostProcessConfig, width: u32, height: u32) -> Self {
        Self {
            texture_transform: config.texture_transform().to_cols_array_2d(),
            viewport: [width as f32, height as f32],
            color_operation: config.color_operation.code(),
            circular_mask: u32::from(config.circular_mask),
        }
    }
}

impl Default for PostProcessUniforms {
    fn default() -> Self {
        Self::new(&PostProcessConfig::default(), 1, 1)
    }
}

/// Post-process render resources.
///
/// The color pipeline resamples the scene target into the color target; the
/// depth pipeline applies the same geometric transform to the depth buffer
/// and writes the depth image.
pub struct PostProcessPass {
    color_pipeline: wgpu::RenderPipeline,
    depth_pipeline: wgpu::RenderPipeline,
    color_layout: wgpu::BindGroupLayout,
    depth_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
}

impl PostProcessPass {
    /// Creates a new post-process pass.
    pub fn new(device: &wgpu::Device) -> RenderResult<Self> {
        let uniform_entry = wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        // Create bind group layouts
        let color_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Post Process Bind Group Layout"),
            entries: &[
                uniform_entry,
                // Scene texture
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let depth_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Post Process Depth Bind Group Layout"),
            entries: &[
                uniform_entry,
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        // Create shaders
        let (color_shader, _) = ShaderBuilder::new()
            .with_vertex(include_str!("shaders/fullscreen.wgsl"))
            .with_fragment(include_str!("shaders/post_process.wgsl"))
            .with_label("Post Process Shader")
            .build_module(device)?;
        let (depth_shader, _) = ShaderBuilder::new()
            .with_vertex(include_str!("shaders/fullscreen.wgsl"))
            .with_fragment(include_str!("shaders/post_process_depth.wgsl"))
            .with_label("Post Process Depth Shader")
            .build_module(device)?;

        let color_pipeline =
            create_fullscreen_pipeline(device, "Post Process", &color_layout, &color_shader, COLOR_FORMAT);
        let depth_pipeline = create_fullscreen_pipeline(
            device,
            "Post Process Depth",
            &depth_layout,
            &depth_shader,
            DEPTH_IMAGE_FORMAT,
        );

        // Create uniform buffer
        let uniform_buffer = create_uniform_buffer(
            device,
            &PostProcessUniforms::default(),
            Some("Post Process Uniform Buffer"),
        );

        // Create sampler
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Post Process Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(Self {
            color_pipeline,
            depth_pipeline,
            color_layout,
            depth_layout,
            uniform_buffer,
            sampler,
        })
    }

    /// Updates the post-process uniforms.
    pub fn update_uniforms(&self, queue: &wgpu::Queue, config: &PostProcessConfig, width: u32, height: u32) {
        let uniforms = PostProcessUniforms::new(config, width, height);
        update_uniform_buffer(queue, &self.uniform_buffer, &uniforms);
    }

    /// Renders scene to color and depth to depth image.
    pub fn render(&self, device: &wgpu::Device, encoder: &mut wgpu::CommandEncoder, framebuffer: &Framebuffer) {
        let color_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Post Process Bind Group"),
            layout: &self.color_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(framebuffer.scene().view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        let depth_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Post Process Depth Bind Group"),
            layout: &self.depth_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(framebuffer.depth().view()),
                },
            ],
        });

        draw_fullscreen(
            encoder,
            "Post Process Pass",
            framebuffer.color().view(),
            &self.color_pipeline,
            &color_bind_group,
        );
        draw_fullscreen(
            encoder,
            "Post Process Depth Pass",
            framebuffer.depth_image().view(),
            &self.depth_pipeline,
            &depth_bind_group,
        );
    }
}

fn create_fullscreen_pipeline(
    device: &wgpu::Device,
    label: &str,
    bind_group_layout: &wgpu::BindGroupLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{label} Pipeline Layout")),
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&format!("{label} Pipeline")),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
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
    })
}

fn draw_fullscreen(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    target: &wgpu::TextureView,
    pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
) {
    let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: None,
        ..Default::default()
    });

    render_pass.set_pipeline(pipeline);
    render_pass.set_bind_group(0, bind_group, &[]);
    render_pass.draw(0..3, 0..1); // Fullscreen triangle
}

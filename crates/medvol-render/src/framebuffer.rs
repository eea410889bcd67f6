//! Off-screen render targets and pixel readback.

use crate::buffer::{aligned_bytes_per_row, strip_row_padding};
use crate::error::{RenderError, RenderResult};

/// Final, post-processed color.
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
/// Scene depth shared by all stages.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// Per-mode accumulation of ray-marching samples.
pub const ACCUMULATION_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Composited scene before post-processing.
pub const SCENE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Post-processed copy of the depth buffer.
pub const DEPTH_IMAGE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;

/// Usages shared by every target.
pub const TARGET_USAGES: wgpu::TextureUsages = wgpu::TextureUsages::RENDER_ATTACHMENT
    .union(wgpu::TextureUsages::TEXTURE_BINDING)
    .union(wgpu::TextureUsages::COPY_SRC);

/// Target formats and whether stages blend into them.
const TARGET_FORMATS: [(wgpu::TextureFormat, bool); 5] = [
    (COLOR_FORMAT, false),
    (DEPTH_FORMAT, false),
    (SCENE_FORMAT, true),
    (ACCUMULATION_FORMAT, true),
    (DEPTH_IMAGE_FORMAT, false),
];

/// Checks that `adapter` can create every framebuffer target.
///
/// Downlevel adapters, such as GLES, may refuse some formats as render
/// attachments; creating them anyway aborts inside wgpu.
pub fn check_adapter_support(adapter: &wgpu::Adapter) -> RenderResult<()> {
    for (format, blended) in TARGET_FORMATS {
        if let Some(requirement) = missing_requirement(adapter.get_texture_format_features(format), blended) {
            return Err(RenderError::UnsupportedTargetFormat { format, requirement });
        }
    }
    Ok(())
}

fn missing_requirement(features: wgpu::TextureFormatFeatures, blended: bool) -> Option<&'static str> {
    if !features.allowed_usages.contains(wgpu::TextureUsages::RENDER_ATTACHMENT) {
        Some("render attachment")
    } else if !features.allowed_usages.contains(TARGET_USAGES) {
        Some("sampled and copyable target")
    } else if blended && !features.flags.contains(wgpu::TextureFormatFeatureFlags::BLENDABLE) {
        Some("blendable target")
    } else {
        None
    }
}

/// A texture with its default view.
pub struct RenderTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl RenderTarget {
    fn new(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
        label: &str,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

/// Color, depth and intermediate targets of one viewport.
pub struct Framebuffer {
    width: u32,
    height: u32,
    color: RenderTarget,
    depth: RenderTarget,
    scene: RenderTarget,
    accumulation: RenderTarget,
    depth_image: RenderTarget,
}

impl Framebuffer {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            color: RenderTarget::new(device, width, height, COLOR_FORMAT, TARGET_USAGES, "color target"),
            depth: RenderTarget::new(device, width, height, DEPTH_FORMAT, TARGET_USAGES, "depth target"),
            scene: RenderTarget::new(device, width, height, SCENE_FORMAT, TARGET_USAGES, "scene target"),
            accumulation: RenderTarget::new(
                device,
                width,
                height,
                ACCUMULATION_FORMAT,
                TARGET_USAGES,
                "accumulation target",
            ),
            depth_image: RenderTarget::new(
                device,
                width,
                height,
                DEPTH_IMAGE_FORMAT,
                TARGET_USAGES,
                "depth image target",
            ),
        }
    }

    /// Recreates all targets if the size changed.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if width.max(1) != self.width || height.max(1) != self.height {
            *self = Self::new(device, width, height);
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn color(&self) -> &RenderTarget {
        &self.color
    }

    pub fn depth(&self) -> &RenderTarget {
        &self.depth
    }

    pub fn scene(&self) -> &RenderTarget {
        &self.scene
    }

    pub fn accumulation(&self) -> &RenderTarget {
        &self.accumulation
    }

    pub fn depth_image(&self) -> &RenderTarget {
        &self.depth_image
    }

    /// Reads the final color buffer into an image.
    pub fn read_color(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> RenderResult<image::RgbaImage> {
        let data = read_texture(device, queue, &self.color.texture, self.width, self.height, 4)?;
        image::RgbaImage::from_raw(self.width, self.height, data).ok_or(RenderError::BufferMapFailed)
    }

    /// Reads the post-processed depth, row by row.
    pub fn read_depth(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> RenderResult<Vec<f32>> {
        let data = read_texture(device, queue, &self.depth_image.texture, self.width, self.height, 4)?;
        Ok(data
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// Reads the raw accumulation buffer of the last ray-marching stage.
    pub fn read_accumulation(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> RenderResult<Vec<[f32; 4]>> {
        let data = read_texture(device, queue, &self.accumulation.texture, self.width, self.height, 8)?;
        Ok(data
            .chunks_exact(8)
            .map(|texel| {
                let mut rgba = [0.0; 4];
                for (channel, bytes) in rgba.iter_mut().zip(texel.chunks_exact(2)) {
                    *channel = half::f16::from_ne_bytes([bytes[0], bytes[1]]).to_f32();
                }
                rgba
            })
            .collect())
    }
}

/// Copies a 2D texture into host memory, removing the row padding.
pub fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    width: u32,
    height: u32,
    bytes_per_pixel: u32,
) -> RenderResult<Vec<u8>> {
    let bytes_per_row = aligned_bytes_per_row(width, bytes_per_pixel);
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback buffer"),
        size: u64::from(bytes_per_row) * u64::from(height),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("readback copy encoder"),
    });

    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );

    queue.submit(std::iter::once(encoder.finish()));

    // Map buffer and read data
    let buffer_slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    let _ = device.poll(wgpu::PollType::wait_indefinitely());
    rx.recv()
        .map_err(|_| RenderError::BufferMapFailed)?
        .map_err(|_| RenderError::BufferMapFailed)?;

    let data = buffer_slice.get_mapped_range();
    let result = strip_row_padding(
        &data,
        (width * bytes_per_pixel) as usize,
        bytes_per_row as usize,
        height as usize,
    );
    drop(data);
    buffer.unmap();

    Ok(result)
}

//! Color map lookup textures.

use medvol_core::ColorMap;

/// Format of color map textures.
pub const COLOR_MAP_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// A 1D texture mirroring a [`ColorMap`].
///
/// The texture is re-uploaded by [`sync`](Self::sync) only when the map was
/// changed since the previous frame. Shaders read it with `textureLoad` at
/// the same locations as [`ColorMap::lookup`].
pub struct ColorMapTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    resolution: u32,
}

impl ColorMapTexture {
    /// Creates the texture and uploads `color_map`.
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, color_map: &mut ColorMap) -> Self {
        fit_to_device(device, color_map);
        let resolution = resolution_of(color_map);
        let (texture, view) = create_texture(device, resolution);

        color_map.take_dirty();
        let result = Self {
            texture,
            view,
            resolution,
        };
        result.upload(queue, color_map);
        result
    }

    /// Uploads `color_map` if it is dirty. Returns whether anything was written.
    pub fn sync(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, color_map: &mut ColorMap) -> bool {
        if !color_map.is_dirty() {
            return false;
        }
        fit_to_device(device, color_map);
        color_map.take_dirty();
        let resolution = resolution_of(color_map);
        if resolution != self.resolution {
            let (texture, view) = create_texture(device, resolution);
            self.texture = texture;
            self.view = view;
            self.resolution = resolution;
        }
        self.upload(queue, color_map);
        true
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    fn upload(&self, queue: &wgpu::Queue, color_map: &ColorMap) {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(color_map.colors()),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * self.resolution),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: self.resolution,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
    }
}

#[allow(clippy::cast_possible_truncation)]
fn resolution_of(color_map: &ColorMap) -> u32 {
    color_map.resolution() as u32
}

fn fit_to_device(device: &wgpu::Device, color_map: &mut ColorMap) {
    let limit = device.limits().max_texture_dimension_1d as usize;
    if color_map.resolution() > limit {
        color_map.sample_down_to(limit);
    }
}

fn create_texture(device: &wgpu::Device, resolution: u32) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("color map texture"),
        size: wgpu::Extent3d {
            width: resolution,
            height: 1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D1,
        format: COLOR_MAP_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

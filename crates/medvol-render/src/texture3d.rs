//! 3D textures holding segment intensities and normal maps.
//!
//! Intensities of both voxel types are uploaded as `Rg8Unorm`: the low byte
//! goes to red and the high byte to green, so a 16-bit value is recovered in
//! the shader as `(g * 65280 + r * 255) / 65535`. Linear filtering commutes
//! with that sum, so interpolation stays exact. 8-bit voxels store the same
//! byte in both channels, which decodes to `b / 255`.

use glam::UVec3;
use medvol_core::{IntensityVolume, MedvolError, NormalMap, TextureFactory, VolumeTexture, Voxel};

use crate::error::{RenderError, RenderResult};

/// Format of intensity textures.
pub const INTENSITY_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rg8Unorm;

/// Format of normal map textures.
pub const NORMALS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Snorm;

/// Format of mask label textures.
pub const MASK_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

/// A 3D texture attached to a segment geometry.
#[derive(Debug)]
pub struct ManagedTexture3D {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: UVec3,
}

impl ManagedTexture3D {
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.texture.format()
    }

    /// A 1x1x1 texture bound where a segment lacks a role the shader declares.
    pub fn placeholder(device: &wgpu::Device, queue: &wgpu::Queue, format: wgpu::TextureFormat) -> Self {
        let texture = create_texture_3d(device, UVec3::ONE, format, "placeholder volume texture");
        let bytes_per_texel = format.block_copy_size(None).unwrap_or(4);
        write_texture_3d(queue, &texture, UVec3::ONE, bytes_per_texel, &[0u8; 16]);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            size: UVec3::ONE,
        }
    }
}

impl VolumeTexture for ManagedTexture3D {
    fn size(&self) -> UVec3 {
        self.size
    }
}

/// Splits voxels into the two-channel byte layout of [`INTENSITY_FORMAT`].
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn encode_intensities<V: Voxel>(voxels: &[V]) -> Vec<u8> {
    if V::BITS == 8 {
        let bytes: &[u8] = bytemuck::cast_slice(voxels);
        return bytes.iter().flat_map(|&b| [b, b]).collect();
    }
    voxels
        .iter()
        .flat_map(|voxel| {
            let value = (voxel.to_intensity() * f32::from(u16::MAX)).round() as u16;
            value.to_le_bytes()
        })
        .collect()
}

/// Inverse of the shader-side decoding, used by tests and readback tools.
pub fn decode_intensity(red: u8, green: u8) -> f32 {
    (f32::from(green) * 65280.0 + f32::from(red) * 255.0) / (65535.0 * 255.0)
}

fn create_texture_3d(
    device: &wgpu::Device,
    size: UVec3,
    format: wgpu::TextureFormat,
    label: &str,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: extent_of(size),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D3,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    })
}

fn write_texture_3d(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    size: UVec3,
    bytes_per_texel: u32,
    data: &[u8],
) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(bytes_per_texel * size.x),
            rows_per_image: Some(size.y),
        },
        extent_of(size),
    );
}

fn extent_of(size: UVec3) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: size.x,
        height: size.y,
        depth_or_array_layers: size.z,
    }
}

/// Uploads segment buffers as [`ManagedTexture3D`]s.
pub struct GpuTextureFactory<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
}

impl<'a> GpuTextureFactory<'a> {
    pub fn new(device: &'a wgpu::Device, queue: &'a wgpu::Queue) -> Self {
        Self { device, queue }
    }

    fn check_size(&self, size: UVec3) -> RenderResult<()> {
        let limit = self.device.limits().max_texture_dimension_3d;
        let requested = size.max_element();
        if requested > limit {
            return Err(RenderError::TextureTooLarge { requested, limit });
        }
        if size.min_element() == 0 {
            return Err(MedvolError::TextureCreation(format!("empty texture of size {size}")).into());
        }
        Ok(())
    }

    fn upload(
        &self,
        size: UVec3,
        format: wgpu::TextureFormat,
        data: &[u8],
        label: &str,
    ) -> medvol_core::Result<ManagedTexture3D> {
        self.check_size(size)
            .map_err(|e| MedvolError::TextureCreation(e.to_string()))?;
        let texture = create_texture_3d(self.device, size, format, label);
        let bytes_per_texel = format.block_copy_size(None).unwrap_or(4);
        write_texture_3d(self.queue, &texture, size, bytes_per_texel, data);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(ManagedTexture3D {
            texture,
            view,
            size,
        })
    }
}

impl TextureFactory for GpuTextureFactory<'_> {
    type Texture = ManagedTexture3D;

    fn create_intensity_texture<V: Voxel>(
        &self,
        volume: &IntensityVolume<V>,
    ) -> medvol_core::Result<ManagedTexture3D> {
        let data = encode_intensities(volume.as_slice());
        self.upload(volume.size(), INTENSITY_FORMAT, &data, "segment intensities")
    }

    fn create_normals_texture(&self, normals: &NormalMap) -> medvol_core::Result<ManagedTexture3D> {
        let data: &[u8] = bytemuck::cast_slice(normals.as_slice());
        self.upload(normals.size(), NORMALS_FORMAT, data, "segment normals")
    }

    fn create_mask_texture(&self, mask: &IntensityVolume<u8>) -> medvol_core::Result<ManagedTexture3D> {
        self.upload(mask.size(), MASK_FORMAT, mask.as_slice(), "segment mask")
    }
}

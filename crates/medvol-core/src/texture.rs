//! Backend-neutral texture interfaces and the per-helper texture cache.

use std::collections::HashMap;
use std::sync::Arc;

use glam::{Mat4, UVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::volume::{IntensityVolume, NormalMap, Voxel};

/// What a 3D texture attached to a geometry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Scalar intensities of a segment.
    Intensities,
    /// Encoded normals of a segment.
    Normals,
    /// Binary label map of a segment; nonzero voxels are masked.
    Mask,
}

/// A 3D texture living on some device.
pub trait VolumeTexture {
    /// Size of the texture in texels.
    fn size(&self) -> UVec3;

    /// Maps `[0, 1]` model coordinates onto the centers of the edge texels.
    fn texture_coordinates_correction(&self) -> Mat4 {
        texture_coordinates_correction(self.size())
    }
}

/// Creates device textures from segment buffers.
pub trait TextureFactory {
    type Texture: VolumeTexture;

    /// Uploads an intensity buffer.
    fn create_intensity_texture<V: Voxel>(&self, volume: &IntensityVolume<V>) -> Result<Self::Texture>;

    /// Uploads a normal map.
    fn create_normals_texture(&self, normals: &NormalMap) -> Result<Self::Texture>;

    /// Uploads a label map. Labels are sampled without filtering.
    fn create_mask_texture(&self, mask: &IntensityVolume<u8>) -> Result<Self::Texture>;
}

/// Affine map taking `[0, 1]` onto `[0.5/s, 1 - 0.5/s]` per axis.
///
/// Sampling at the result hits the first and last texel centers at the
/// bounds, so edge voxels are never extrapolated against the clamp border.
pub fn texture_coordinates_correction(size: UVec3) -> Mat4 {
    let s = size.max(UVec3::ONE).as_vec3();
    Mat4::from_translation(Vec3::splat(0.5) / s) * Mat4::from_scale((s - Vec3::ONE) / s)
}

/// Cache key: segment linear index and texture role.
pub type TextureKey = (usize, Role);

/// Lazily populated textures, at most one per key.
///
/// Entries are reference counted: dropping the cache (or calling
/// [`release`](Self::release)) gives up the cache's share, and the device
/// texture is freed once the last scene node referencing it goes away.
#[derive(Debug)]
pub struct TextureCache<T> {
    entries: HashMap<TextureKey, Arc<T>>,
}

impl<T> Default for TextureCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> TextureCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached texture for `key` or creates it with `create`.
    pub fn get_or_create(
        &mut self,
        key: TextureKey,
        create: impl FnOnce() -> Result<T>,
    ) -> Result<Arc<T>> {
        if let Some(texture) = self.entries.get(&key) {
            return Ok(Arc::clone(texture));
        }
        let texture = Arc::new(create()?);
        log::debug!("created {:?} texture for segment {}", key.1, key.0);
        self.entries.insert(key, Arc::clone(&texture));
        Ok(texture)
    }

    pub fn get(&self, key: TextureKey) -> Option<&Arc<T>> {
        self.entries.get(&key)
    }

    pub fn contains(&self, key: TextureKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every cached entry and returns how many there were.
    pub fn release(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        if count > 0 {
            log::debug!("released {count} cached volume textures");
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_correction_hits_texel_centers() {
        let m = texture_coordinates_correction(UVec3::new(4, 2, 10));
        let lo = m.transform_point3(Vec3::ZERO);
        let hi = m.transform_point3(Vec3::ONE);
        assert_abs_diff_eq!(lo.x, 0.125);
        assert_abs_diff_eq!(hi.x, 0.875);
        assert_abs_diff_eq!(lo.y, 0.25);
        assert_abs_diff_eq!(hi.z, 0.95);
    }

    #[test]
    fn test_cache_reuses_entries() {
        let mut cache: TextureCache<u32> = TextureCache::new();
        let a = cache.get_or_create((0, Role::Intensities), || Ok(1)).unwrap();
        let b = cache.get_or_create((0, Role::Intensities), || Ok(2)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(*b, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_release() {
        let mut cache: TextureCache<u32> = TextureCache::new();
        let a = cache.get_or_create((3, Role::Normals), || Ok(7)).unwrap();
        assert_eq!(cache.release(), 1);
        assert!(cache.is_empty());
        let b = cache.get_or_create((3, Role::Normals), || Ok(7)).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_cache_propagates_creation_errors() {
        let mut cache: TextureCache<u32> = TextureCache::new();
        let result = cache.get_or_create((0, Role::Intensities), || {
            Err(crate::MedvolError::TextureCreation("too large".into()))
        });
        assert!(result.is_err());
        assert!(cache.is_empty());
    }
}

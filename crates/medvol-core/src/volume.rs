//! Dense voxel buffers backing a single segment.
//!
//! Buffers are stored as `ndarray::Array3` in `[z, y, x]` order so that the
//! contiguous slice is x-fastest, which matches the row layout of a 3D texture
//! upload.

use glam::{UVec3, Vec3};
use ndarray::Array3;

use crate::error::{MedvolError, Result};

/// Scalar storage type of an intensity volume.
pub trait Voxel:
    Copy + Default + PartialEq + Send + Sync + std::fmt::Debug + bytemuck::Pod + 'static
{
    /// Number of bits per voxel.
    const BITS: u32;

    /// Quantizes an intensity in `[0, 1]`.
    fn from_intensity(intensity: f32) -> Self;

    /// Maps the stored value back onto `[0, 1]`.
    fn to_intensity(self) -> f32;

    /// Number of bytes per voxel.
    fn byte_size() -> usize {
        (Self::BITS / 8) as usize
    }
}

impl Voxel for u8 {
    const BITS: u32 = 8;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from_intensity(intensity: f32) -> Self {
        (intensity.clamp(0.0, 1.0) * f32::from(u8::MAX)).round() as u8
    }

    fn to_intensity(self) -> f32 {
        f32::from(self) / f32::from(u8::MAX)
    }
}

impl Voxel for u16 {
    const BITS: u32 = 16;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from_intensity(intensity: f32) -> Self {
        (intensity.clamp(0.0, 1.0) * f32::from(u16::MAX)).round() as u16
    }

    fn to_intensity(self) -> f32 {
        f32::from(self) / f32::from(u16::MAX)
    }
}

fn shape_of(size: UVec3) -> (usize, usize, usize) {
    (size.z as usize, size.y as usize, size.x as usize)
}

fn index_of(coord: UVec3) -> [usize; 3] {
    [coord.z as usize, coord.y as usize, coord.x as usize]
}

/// A dense 3D buffer of intensities.
#[derive(Debug, Clone, PartialEq)]
pub struct IntensityVolume<V: Voxel> {
    data: Array3<V>,
}

impl<V: Voxel> IntensityVolume<V> {
    /// Creates a zero-filled volume of the given size.
    pub fn new(size: UVec3) -> Self {
        Self {
            data: Array3::from_elem(shape_of(size), V::default()),
        }
    }

    /// Wraps raw x-fastest data.
    pub fn from_raw(size: UVec3, values: Vec<V>) -> Result<Self> {
        let expected = crate::math::volume_of(size);
        let actual = values.len();
        let data = Array3::from_shape_vec(shape_of(size), values)
            .map_err(|_| MedvolError::SizeMismatch { expected, actual })?;
        Ok(Self { data })
    }

    /// Returns the size as `(x, y, z)`.
    pub fn size(&self) -> UVec3 {
        let (z, y, x) = self.data.dim();
        #[allow(clippy::cast_possible_truncation)]
        UVec3::new(x as u32, y as u32, z as u32)
    }

    /// Returns the voxel at `coord`, or `None` outside the buffer.
    pub fn get(&self, coord: UVec3) -> Option<V> {
        self.data.get(index_of(coord)).copied()
    }

    /// Writes the voxel at `coord`.
    pub fn set(&mut self, coord: UVec3, value: V) -> Result<()> {
        let bounds = self.size();
        match self.data.get_mut(index_of(coord)) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(MedvolError::IndexOutOfRange {
                index: coord.to_array(),
                bounds: bounds.to_array(),
            }),
        }
    }

    /// Intensity in `[0, 1]` at `coord`.
    pub fn intensity(&self, coord: UVec3) -> Option<f32> {
        self.get(coord).map(Voxel::to_intensity)
    }

    /// Contiguous x-fastest view of the voxels.
    pub fn as_slice(&self) -> &[V] {
        // Arrays built by this type are always in standard layout.
        self.data.as_slice().unwrap_or(&[])
    }

    /// Borrow of the underlying array in `[z, y, x]` order.
    pub fn array(&self) -> &Array3<V> {
        &self.data
    }
}

/// Per-voxel surface normals, quantized to signed bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalMap {
    data: Array3<[i8; 4]>,
}

impl NormalMap {
    /// Creates a map of zero normals.
    pub fn new(size: UVec3) -> Self {
        Self {
            data: Array3::from_elem(shape_of(size), [0; 4]),
        }
    }

    pub(crate) fn from_array(data: Array3<[i8; 4]>) -> Self {
        Self { data }
    }

    /// Returns the size as `(x, y, z)`.
    pub fn size(&self) -> UVec3 {
        let (z, y, x) = self.data.dim();
        #[allow(clippy::cast_possible_truncation)]
        UVec3::new(x as u32, y as u32, z as u32)
    }

    /// Decodes the normal at `coord`.
    pub fn get(&self, coord: UVec3) -> Option<Vec3> {
        self.data.get(index_of(coord)).map(|n| decode_normal(*n))
    }

    /// Encodes and stores a normal at `coord`.
    pub fn set(&mut self, coord: UVec3, normal: Vec3) -> Result<()> {
        let bounds = self.size();
        match self.data.get_mut(index_of(coord)) {
            Some(slot) => {
                *slot = encode_normal(normal);
                Ok(())
            }
            None => Err(MedvolError::IndexOutOfRange {
                index: coord.to_array(),
                bounds: bounds.to_array(),
            }),
        }
    }

    /// Contiguous x-fastest view of the encoded normals.
    pub fn as_slice(&self) -> &[[i8; 4]] {
        self.data.as_slice().unwrap_or(&[])
    }
}

/// Quantizes a unit vector into four signed bytes (`w` is unused).
#[allow(clippy::cast_possible_truncation)]
pub fn encode_normal(n: Vec3) -> [i8; 4] {
    let q = (n.clamp(Vec3::splat(-1.0), Vec3::ONE) * 127.0).round();
    [q.x as i8, q.y as i8, q.z as i8, 0]
}

/// Inverse of [`encode_normal`].
pub fn decode_normal(n: [i8; 4]) -> Vec3 {
    Vec3::new(f32::from(n[0]), f32::from(n[1]), f32::from(n[2])) / 127.0
}

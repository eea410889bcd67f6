//! A single grid cell.

use glam::UVec3;

use crate::volume::{IntensityVolume, NormalMap, Voxel};

/// One rectangular block of the grid, stored as its own texture.
///
/// Along every non-tail axis the buffer is one voxel larger than the regular
/// partition size; that last layer duplicates the first layer of the
/// neighbouring segment.
#[derive(Debug, Clone)]
pub struct Segment<V: Voxel> {
    offset: UVec3,
    intensities: IntensityVolume<V>,
    normals: Option<NormalMap>,
    mask: Option<IntensityVolume<u8>>,
}

impl<V: Voxel> Segment<V> {
    /// Creates a zero-filled segment of `volume_size` voxels at `offset`.
    pub fn new(offset: UVec3, volume_size: UVec3) -> Self {
        Self {
            offset,
            intensities: IntensityVolume::new(volume_size),
            normals: None,
            mask: None,
        }
    }

    /// Origin of the segment in global voxel coordinates.
    pub fn offset(&self) -> UVec3 {
        self.offset
    }

    /// Buffer size, border voxels included.
    pub fn volume_size(&self) -> UVec3 {
        self.intensities.size()
    }

    pub fn intensities(&self) -> &IntensityVolume<V> {
        &self.intensities
    }

    pub fn intensities_mut(&mut self) -> &mut IntensityVolume<V> {
        &mut self.intensities
    }

    pub fn normals(&self) -> Option<&NormalMap> {
        self.normals.as_ref()
    }

    pub fn set_normals(&mut self, normals: Option<NormalMap>) {
        self.normals = normals;
    }

    /// Whether a normal map has been computed for this segment.
    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    /// Label map covering the same voxels as the intensities, if loaded.
    pub fn mask(&self) -> Option<&IntensityVolume<u8>> {
        self.mask.as_ref()
    }

    /// Label map of the segment, allocated unmasked on first access.
    pub fn mask_mut(&mut self) -> &mut IntensityVolume<u8> {
        let size = self.intensities.size();
        self.mask.get_or_insert_with(|| IntensityVolume::new(size))
    }

    pub fn clear_mask(&mut self) {
        self.mask = None;
    }
}

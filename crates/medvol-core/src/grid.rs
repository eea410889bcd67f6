//! Grid of segments with border-duplicating voxel writes.

use glam::UVec3;

use crate::error::{MedvolError, Result};
use crate::segment::Segment;
use crate::volume::Voxel;

/// A 3D array of [`Segment`]s covering one logical dataset.
///
/// Global voxel `c` maps canonically to segment `c / max_segment_size` at
/// local coordinate `c % max_segment_size`. Writes through [`set_voxel`]
/// are mirrored into the border layer of every lower neighbour that shares
/// the voxel.
///
/// [`set_voxel`]: VolumeGrid::set_voxel
#[derive(Debug, Clone)]
pub struct VolumeGrid<V: Voxel> {
    max_segment_size: UVec3,
    segment_counts: UVec3,
    segments: Vec<Segment<V>>,
}

impl<V: Voxel> VolumeGrid<V> {
    /// Creates the grid, asking `segment_size` for the buffer size of each
    /// segment coordinate.
    pub fn new(
        max_segment_size: UVec3,
        segment_counts: UVec3,
        mut segment_size: impl FnMut(UVec3) -> UVec3,
    ) -> Result<Self> {
        if max_segment_size.cmpeq(UVec3::ZERO).any() {
            return Err(MedvolError::InvalidDimensions(format!(
                "max segment size {max_segment_size} has a zero component"
            )));
        }
        if segment_counts.cmpeq(UVec3::ZERO).any() {
            return Err(MedvolError::InvalidDimensions(format!(
                "segment counts {segment_counts} has a zero component"
            )));
        }
        let segments = crate::math::coords(segment_counts)
            .map(|coord| Segment::new(coord * max_segment_size, segment_size(coord)))
            .collect();
        Ok(Self {
            max_segment_size,
            segment_counts,
            segments,
        })
    }

    /// Creates a grid whose segments all have the regular size plus border.
    pub fn uniform(max_segment_size: UVec3, segment_counts: UVec3) -> Result<Self> {
        Self::new(max_segment_size, segment_counts, |_| max_segment_size + UVec3::ONE)
    }

    pub fn max_segment_size(&self) -> UVec3 {
        self.max_segment_size
    }

    pub fn segment_counts(&self) -> UVec3 {
        self.segment_counts
    }

    /// Number of segments in the grid.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Linear index of a segment coordinate: `x + y*cx + z*cx*cy`.
    pub fn linear_index(&self, segment_coord: UVec3) -> usize {
        let c = self.segment_counts;
        segment_coord.x as usize
            + segment_coord.y as usize * c.x as usize
            + segment_coord.z as usize * c.x as usize * c.y as usize
    }

    /// Inverse of [`linear_index`](Self::linear_index).
    #[allow(clippy::cast_possible_truncation)]
    pub fn segment_coord(&self, linear_index: usize) -> UVec3 {
        let cx = self.segment_counts.x as usize;
        let cy = self.segment_counts.y as usize;
        UVec3::new(
            (linear_index % cx) as u32,
            ((linear_index / cx) % cy) as u32,
            (linear_index / (cx * cy)) as u32,
        )
    }

    fn check_segment_coord(&self, segment_coord: UVec3) -> Result<()> {
        if segment_coord.cmplt(self.segment_counts).all() {
            Ok(())
        } else {
            Err(MedvolError::IndexOutOfRange {
                index: segment_coord.to_array(),
                bounds: self.segment_counts.to_array(),
            })
        }
    }

    /// Returns the segment at `segment_coord`.
    pub fn segment_at(&self, segment_coord: UVec3) -> Result<&Segment<V>> {
        self.check_segment_coord(segment_coord)?;
        Ok(&self.segments[self.linear_index(segment_coord)])
    }

    /// Mutable access to the segment at `segment_coord`.
    pub fn segment_at_mut(&mut self, segment_coord: UVec3) -> Result<&mut Segment<V>> {
        self.check_segment_coord(segment_coord)?;
        let index = self.linear_index(segment_coord);
        Ok(&mut self.segments[index])
    }

    /// All segments in linear-index order.
    pub fn segments(&self) -> &[Segment<V>] {
        &self.segments
    }

    pub fn segments_mut(&mut self) -> &mut [Segment<V>] {
        &mut self.segments
    }

    /// Splits a global coordinate into segment coordinate and local coordinate.
    pub fn locate(&self, coord: UVec3) -> (UVec3, UVec3) {
        (coord / self.max_segment_size, coord % self.max_segment_size)
    }

    /// Reads the voxel at global coordinate `coord`.
    pub fn get_voxel(&self, coord: UVec3) -> Result<V> {
        let (segment_coord, local) = self.locate(coord);
        let segment = self.segment_at(segment_coord)?;
        segment
            .intensities()
            .get(local)
            .ok_or_else(|| MedvolError::IndexOutOfRange {
                index: coord.to_array(),
                bounds: (segment.offset() + segment.volume_size()).to_array(),
            })
    }

    /// Writes the voxel at global coordinate `coord`, including every border
    /// duplicate of it.
    ///
    /// For each axis where the local coordinate is `0` and the segment is not
    /// the first, the voxel is also written at local `max_segment_size` of the
    /// lower neighbour. All combinations of such axes are covered, so a corner
    /// voxel reaches up to 8 segments.
    pub fn set_voxel(&mut self, coord: UVec3, value: V) -> Result<()> {
        let (segment_coord, local) = self.locate(coord);
        let shared = [
            local.x == 0 && segment_coord.x > 0,
            local.y == 0 && segment_coord.y > 0,
            local.z == 0 && segment_coord.z > 0,
        ];
        for mask in 0u32..8 {
            let mut target_segment = segment_coord;
            let mut target_local = local;
            let mut applicable = true;
            for axis in 0..3 {
                if mask & (1 << axis) == 0 {
                    continue;
                }
                if !shared[axis] {
                    applicable = false;
                    break;
                }
                target_segment[axis] -= 1;
                target_local[axis] = self.max_segment_size[axis];
            }
            if applicable {
                self.segment_at_mut(target_segment)?
                    .intensities_mut()
                    .set(target_local, value)?;
            }
        }
        Ok(())
    }

    /// Writes a mask label to every segment storing `coord`.
    pub fn set_mask_voxel(&mut self, coord: UVec3, label: u8) -> Result<()> {
        for (segment_coord, local) in self.locations_of(coord) {
            self.segment_at_mut(segment_coord)?.mask_mut().set(local, label)?;
        }
        Ok(())
    }

    /// Reads the mask label of `coord`; unmasked when no mask was loaded.
    pub fn get_mask_voxel(&self, coord: UVec3) -> Result<u8> {
        let (segment_coord, local) = self.locate(coord);
        let segment = self.segment_at(segment_coord)?;
        Ok(segment.mask().and_then(|mask| mask.get(local)).unwrap_or(0))
    }

    /// Returns every `(segment_coord, local_coord)` pair storing `coord`.
    pub fn locations_of(&self, coord: UVec3) -> Vec<(UVec3, UVec3)> {
        let (segment_coord, local) = self.locate(coord);
        let mut out = vec![(segment_coord, local)];
        for axis in 0..3 {
            if local[axis] == 0 && segment_coord[axis] > 0 {
                let extra: Vec<_> = out
                    .iter()
                    .map(|&(s, l)| {
                        let mut s = s;
                        let mut l = l;
                        s[axis] -= 1;
                        l[axis] = self.max_segment_size[axis];
                        (s, l)
                    })
                    .collect();
                out.extend(extra);
            }
        }
        out
    }
}

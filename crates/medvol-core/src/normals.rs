//! Normal map computation over a loaded grid.

use glam::{UVec3, Vec3};
use ndarray::Array3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::grid::VolumeGrid;
use crate::segment::Segment;
use crate::volume::{encode_normal, NormalMap, Voxel};

/// Enables normal maps on a grid helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalsConfig {
    /// Compute segments on the rayon thread pool.
    pub parallel: bool,
}

impl Default for NormalsConfig {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// Normal at global voxel `coord` of a grid covering `resolution`.
///
/// Voxels on the outer faces get the outward axis normal. Interior voxels use
/// the negated central-difference gradient, normalized, or zero where the
/// gradient vanishes.
pub fn normal_at<V: Voxel>(grid: &VolumeGrid<V>, resolution: UVec3, coord: UVec3) -> Vec3 {
    let last = resolution - UVec3::ONE;
    for axis in 0..3 {
        if coord[axis] == 0 {
            let mut n = Vec3::ZERO;
            n[axis] = -1.0;
            return n;
        }
        if coord[axis] >= last[axis] {
            let mut n = Vec3::ZERO;
            n[axis] = 1.0;
            return n;
        }
    }
    let sample = |c: UVec3| grid.get_voxel(c).map(Voxel::to_intensity).unwrap_or(0.0);
    let mut gradient = Vec3::ZERO;
    for axis in 0..3 {
        let mut lo = coord;
        let mut hi = coord;
        lo[axis] -= 1;
        hi[axis] += 1;
        gradient[axis] = (sample(lo) - sample(hi)) / 2.0;
    }
    gradient.try_normalize().unwrap_or(Vec3::ZERO)
}

fn segment_normals<V: Voxel>(grid: &VolumeGrid<V>, resolution: UVec3, segment: &Segment<V>) -> NormalMap {
    let size = segment.volume_size();
    let offset = segment.offset();
    #[allow(clippy::cast_possible_truncation)]
    let data = Array3::from_shape_fn(
        (size.z as usize, size.y as usize, size.x as usize),
        |(z, y, x)| {
            let coord = offset + UVec3::new(x as u32, y as u32, z as u32);
            encode_normal(normal_at(grid, resolution, coord))
        },
    );
    NormalMap::from_array(data)
}

/// Recomputes the normal map of every segment.
pub fn compute_normals<V: Voxel>(grid: &mut VolumeGrid<V>, resolution: UVec3, config: NormalsConfig) {
    let maps: Vec<NormalMap> = {
        let grid_ref: &VolumeGrid<V> = grid;
        if config.parallel {
            grid_ref
                .segments()
                .par_iter()
                .map(|segment| segment_normals(grid_ref, resolution, segment))
                .collect()
        } else {
            grid_ref
                .segments()
                .iter()
                .map(|segment| segment_normals(grid_ref, resolution, segment))
                .collect()
        }
    };
    for (segment, map) in grid.segments_mut().iter_mut().zip(maps) {
        segment.set_normals(Some(map));
    }
}

//! Partitioning policy: how a resolution is split into bounded segments.

use glam::UVec3;
use serde::{Deserialize, Serialize};

use crate::error::{MedvolError, Result};
use crate::math::make_even;

/// Default per-segment byte budget (two bytes per voxel at 300³).
pub const DEFAULT_MAX_SEGMENT_BYTESIZE: usize = 2 * 300 * 300 * 300;

/// Partitioning of one axis into equally sized partitions plus a tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partitioning {
    /// Number of voxels covered by the axis.
    pub total_size: u32,
    /// Size of every partition but the last, without the border voxel.
    pub regular_partition_size: u32,
    /// Number of partitions along the axis.
    pub partitions_count: u32,
    /// Size of the last partition.
    pub tail_size: u32,
}

impl Partitioning {
    /// Splits `total_size` voxels into partitions of `regular_partition_size`.
    pub fn new(total_size: u32, regular_partition_size: u32) -> Result<Self> {
        if total_size == 0 || regular_partition_size == 0 {
            return Err(MedvolError::InvalidDimensions(format!(
                "cannot partition {total_size} voxels into partitions of {regular_partition_size}"
            )));
        }
        let partitions_count = total_size.div_ceil(regular_partition_size);
        let tail_size = total_size - (partitions_count - 1) * regular_partition_size;
        Ok(Self {
            total_size,
            regular_partition_size,
            partitions_count,
            tail_size,
        })
    }

    /// Whether partition `index` is the last one along the axis.
    pub fn is_tail(&self, index: u32) -> bool {
        index + 1 == self.partitions_count
    }

    /// Buffer size of partition `index`, including the redundant border voxel.
    pub fn buffer_size(&self, index: u32) -> u32 {
        if self.is_tail(index) {
            self.tail_size
        } else {
            self.regular_partition_size + 1
        }
    }

    /// Voxels covered by the partitions, not counting border duplicates.
    pub fn covered_size(&self) -> u32 {
        (self.partitions_count - 1) * self.regular_partition_size + self.tail_size
    }
}

/// Computes the largest segment size whose buffer, border included, fits into
/// `max_segment_bytesize`.
///
/// The side length of the buffer is rounded down to even; one voxel of it is
/// reserved for the border.
pub fn compute_max_segment_size(max_segment_bytesize: usize, voxel_bytes: usize) -> Result<u32> {
    let voxels = max_segment_bytesize / voxel_bytes.max(1);
    let side = integer_cbrt(voxels);
    let max_side_length = make_even(side, -1);
    if max_side_length < 2 {
        return Err(MedvolError::SegmentBudgetTooSmall {
            budget: max_segment_bytesize,
            voxel_bytes,
        });
    }
    Ok(max_side_length - 1)
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn integer_cbrt(n: usize) -> u32 {
    let mut root = (n as f64).cbrt().floor() as u64;
    let n = n as u64;
    while (root + 1).pow(3) <= n {
        root += 1;
    }
    while root > 0 && root.pow(3) > n {
        root -= 1;
    }
    root.min(u64::from(u32::MAX)) as u32
}

/// The full three-axis partitioning of a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPartitioning {
    /// Resolution of the data source.
    pub native_resolution: UVec3,
    /// Native resolution rounded up to even per axis.
    pub resolution: UVec3,
    /// Largest segment size without the border voxel.
    pub max_segment_size: u32,
    pub x: Partitioning,
    pub y: Partitioning,
    pub z: Partitioning,
}

impl GridPartitioning {
    /// Computes the partitioning for `native_resolution` under a byte budget.
    pub fn new(native_resolution: UVec3, max_segment_bytesize: usize, voxel_bytes: usize) -> Result<Self> {
        if native_resolution.cmpeq(UVec3::ZERO).any() {
            return Err(MedvolError::InvalidDimensions(format!(
                "native resolution {native_resolution} has a zero component"
            )));
        }
        let resolution = crate::math::make_even_up(native_resolution);
        let max_segment_size = compute_max_segment_size(max_segment_bytesize, voxel_bytes)?;
        Ok(Self {
            native_resolution,
            resolution,
            max_segment_size,
            x: Partitioning::new(resolution.x, max_segment_size)?,
            y: Partitioning::new(resolution.y, max_segment_size)?,
            z: Partitioning::new(resolution.z, max_segment_size)?,
        })
    }

    /// Number of segments per axis.
    pub fn segment_counts(&self) -> UVec3 {
        UVec3::new(
            self.x.partitions_count,
            self.y.partitions_count,
            self.z.partitions_count,
        )
    }

    /// Buffer size of the segment at `segment_coord`.
    pub fn segment_size(&self, segment_coord: UVec3) -> UVec3 {
        UVec3::new(
            self.x.buffer_size(segment_coord.x),
            self.y.buffer_size(segment_coord.y),
            self.z.buffer_size(segment_coord.z),
        )
    }

    /// Regular partition size per axis.
    pub fn regular_partition_size(&self) -> UVec3 {
        UVec3::new(
            self.x.regular_partition_size,
            self.y.regular_partition_size,
            self.z.regular_partition_size,
        )
    }

    /// Whether the segment is the tail along each axis.
    pub fn is_tail(&self, segment_coord: UVec3) -> [bool; 3] {
        [
            self.x.is_tail(segment_coord.x),
            self.y.is_tail(segment_coord.y),
            self.z.is_tail(segment_coord.z),
        ]
    }

    /// Whether `coord` lies inside the padded resolution but outside the data.
    pub fn is_padding(&self, coord: UVec3) -> bool {
        coord.cmpge(self.native_resolution).any()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_budget_gives_16bit_segments() {
        // cbrt(300³) = 300, already even, minus the border voxel
        assert_eq!(compute_max_segment_size(DEFAULT_MAX_SEGMENT_BYTESIZE, 2).unwrap(), 299);
    }

    #[test]
    fn test_odd_side_rounded_down() {
        // 7³ bytes of 8-bit voxels: side 7 rounds down to 6
        assert_eq!(compute_max_segment_size(343, 1).unwrap(), 5);
        assert_eq!(compute_max_segment_size(216, 1).unwrap(), 5);
    }

    #[test]
    fn test_budget_too_small() {
        assert!(matches!(
            compute_max_segment_size(7, 1),
            Err(MedvolError::SegmentBudgetTooSmall { .. })
        ));
        assert_eq!(compute_max_segment_size(8, 1).unwrap(), 1);
    }

    #[test]
    fn test_partitioning_with_tail() {
        let p = Partitioning::new(12, 5).unwrap();
        assert_eq!(p.partitions_count, 3);
        assert_eq!(p.tail_size, 2);
        assert_eq!(p.buffer_size(0), 6);
        assert_eq!(p.buffer_size(2), 2);
        assert_eq!(p.covered_size(), 12);
    }

    #[test]
    fn test_partitioning_even_division() {
        let p = Partitioning::new(10, 5).unwrap();
        assert_eq!(p.partitions_count, 2);
        assert_eq!(p.tail_size, 5);
    }

    #[test]
    fn test_zero_resolution_rejected() {
        assert!(matches!(
            GridPartitioning::new(UVec3::new(4, 0, 4), 216, 1),
            Err(MedvolError::InvalidDimensions(_))
        ));
    }

    #[test]
    fn test_ten_cubed_scenario() {
        let p = GridPartitioning::new(UVec3::splat(10), 216, 1).unwrap();
        assert_eq!(p.resolution, UVec3::splat(10));
        assert_eq!(p.segment_counts(), UVec3::splat(2));
        assert_eq!(p.segment_size(UVec3::ZERO), UVec3::splat(6));
        assert_eq!(p.segment_size(UVec3::ONE), UVec3::splat(5));
    }

    proptest! {
        #[test]
        fn prop_partition_covers_native_resolution(
            nx in 1u32..200,
            ny in 1u32..200,
            nz in 1u32..200,
            side in 2usize..64,
            voxel_bytes in 1usize..=2,
        ) {
            let native = UVec3::new(nx, ny, nz);
            let budget = side * side * side * voxel_bytes;
            let p = GridPartitioning::new(native, budget, voxel_bytes).unwrap();

            prop_assert!(p.resolution.x % 2 == 0 && p.resolution.y % 2 == 0 && p.resolution.z % 2 == 0);
            for axis in [p.x, p.y, p.z] {
                prop_assert!(axis.tail_size >= 1);
                prop_assert!(axis.tail_size <= axis.regular_partition_size);
                prop_assert_eq!(axis.covered_size(), axis.total_size);
                prop_assert!(axis.partitions_count * axis.regular_partition_size >= axis.total_size);
            }
            prop_assert!(p.resolution.cmpge(native).all());
        }
    }
}

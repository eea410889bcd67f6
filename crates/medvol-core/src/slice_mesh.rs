//! Geometry of the camera-facing slice stack used for ray marching.

use crate::error::{MedvolError, Result};

/// Default number of slices per segment.
pub const DEFAULT_SAMPLE_RATE: u32 = 200;

/// Enlargement of the stack radius beyond `sqrt(3)/2`.
///
/// Without it, floating-point error leaves the farthest cube corner
/// uncovered at some view angles.
pub const RADIUS_CORRECTION: f32 = 1.0 + 1e-2;

/// Half side length of every slice quad and half depth of the stack.
pub fn slice_radius() -> f32 {
    RADIUS_CORRECTION * 3f32.sqrt() / 2.0
}

/// Indexed triangle list of `sample_rate` quads in tangent space.
///
/// Slices are evenly spaced along z over `[-radius, +radius]`; slice 0 lies
/// at `-radius` and is drawn first.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceMesh {
    pub sample_rate: u32,
    pub vertices: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl SliceMesh {
    /// Builds the stack. At least two slices are required.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(sample_rate: u32) -> Result<Self> {
        if sample_rate < 2 {
            return Err(MedvolError::InvalidSampleRate(sample_rate));
        }
        let radius = slice_radius();
        let mut vertices = Vec::with_capacity(4 * sample_rate as usize);
        let mut indices = Vec::with_capacity(6 * sample_rate as usize);
        for i in 0..sample_rate {
            let progress = i as f32 / (sample_rate - 1) as f32;
            let z = -2.0 * radius * (0.5 - progress);
            let base = i * 4;
            vertices.push([-radius, -radius, z]);
            vertices.push([radius, -radius, z]);
            vertices.push([radius, radius, z]);
            vertices.push([-radius, radius, z]);
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }
        Ok(Self {
            sample_rate,
            vertices,
            indices,
        })
    }

    /// Z coordinate of slice `i`, `None` past the last slice.
    pub fn slice_depth(&self, i: u32) -> Option<f32> {
        self.vertices.get((i as usize).saturating_mul(4)).map(|vertex| vertex[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_rejects_single_slice() {
        assert!(matches!(SliceMesh::new(1), Err(MedvolError::InvalidSampleRate(1))));
        assert!(SliceMesh::new(0).is_err());
    }

    #[test]
    fn test_counts_and_spacing() {
        let mesh = SliceMesh::new(5).unwrap();
        assert_eq!(mesh.vertices.len(), 20);
        assert_eq!(mesh.indices.len(), 30);
        let r = slice_radius();
        assert_abs_diff_eq!(mesh.slice_depth(0).unwrap(), -r);
        assert_abs_diff_eq!(mesh.slice_depth(4).unwrap(), r);
        assert_abs_diff_eq!(mesh.slice_depth(2).unwrap(), 0.0);
        for i in 1..5 {
            assert!(mesh.slice_depth(i) > mesh.slice_depth(i - 1));
        }
        assert_eq!(mesh.slice_depth(5), None);
        assert_eq!(mesh.slice_depth(u32::MAX), None);
    }

    #[test]
    fn test_quads_cover_unit_cube() {
        let mesh = SliceMesh::new(2).unwrap();
        assert!(slice_radius() > 3f32.sqrt() / 2.0);
        assert_eq!(&mesh.indices[6..], &[4, 5, 6, 6, 7, 4]);
        let [x, y, _] = mesh.vertices[2];
        assert_abs_diff_eq!(x, slice_radius());
        assert_abs_diff_eq!(y, slice_radius());
    }

    #[test]
    fn test_default_rate() {
        let mesh = SliceMesh::new(DEFAULT_SAMPLE_RATE).unwrap();
        assert_eq!(mesh.indices.len(), 1200);
    }
}

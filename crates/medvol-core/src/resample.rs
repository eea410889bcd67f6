//! Trilinear resampling of a volume to a new resolution.

use glam::{UVec3, Vec3};

use crate::error::Result;
use crate::parallel::Parallelization;
use crate::volume::{IntensityVolume, Voxel};

/// Resolution giving isotropic voxels at the finest of `spacing`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn isotropic_resolution(size: UVec3, spacing: Vec3) -> UVec3 {
    let finest = spacing.min_element();
    let scaled = size.as_vec3() * spacing / finest;
    scaled.max(Vec3::ONE).as_uvec3()
}

/// Intensity at fractional voxel coordinate `p`, clamped to the volume.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn trilinear<V: Voxel>(volume: &IntensityVolume<V>, p: Vec3) -> f32 {
    let size = volume.size();
    let max = (size - UVec3::ONE).as_vec3();
    let p = p.clamp(Vec3::ZERO, max);
    let p0 = p.floor().as_uvec3();
    let p1 = (p0 + UVec3::ONE).min(size - UVec3::ONE);
    let d = p - p0.as_vec3();

    let at = |x: u32, y: u32, z: u32| volume.intensity(UVec3::new(x, y, z)).unwrap_or(0.0);
    let lerp = |a: f32, b: f32, t: f32| a.mul_add(1.0 - t, b * t);

    let c00 = lerp(at(p0.x, p0.y, p0.z), at(p1.x, p0.y, p0.z), d.x);
    let c10 = lerp(at(p0.x, p1.y, p0.z), at(p1.x, p1.y, p0.z), d.x);
    let c01 = lerp(at(p0.x, p0.y, p1.z), at(p1.x, p0.y, p1.z), d.x);
    let c11 = lerp(at(p0.x, p1.y, p1.z), at(p1.x, p1.y, p1.z), d.x);
    let c0 = lerp(c00, c10, d.y);
    let c1 = lerp(c01, c11, d.y);
    lerp(c0, c1, d.z)
}

/// Resamples `source` to `target` voxels using texel-center alignment.
#[allow(clippy::cast_precision_loss)]
pub fn resample<V: Voxel>(
    source: &IntensityVolume<V>,
    target: UVec3,
    parallelization: &Parallelization,
) -> Result<IntensityVolume<V>> {
    let scale = source.size().as_vec3() / target.max(UVec3::ONE).as_vec3();
    let mut out = vec![V::default(); crate::math::volume_of(target)];
    let slice_len = (target.x * target.y) as usize;
    parallelization.for_each_slice(&mut out, slice_len, |z, slice| {
        for (i, voxel) in slice.iter_mut().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let (x, y) = ((i % target.x as usize) as u32, (i / target.x as usize) as u32);
            let t = UVec3::new(x, y, z).as_vec3();
            let p = (t + Vec3::splat(0.5)) * scale - Vec3::splat(0.5);
            *voxel = V::from_intensity(trilinear(source, p));
        }
    })?;
    IntensityVolume::from_raw(target, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ramp(size: UVec3) -> IntensityVolume<u16> {
        let values = crate::math::coords(size)
            .map(|c| u16::from_intensity(c.x as f32 / (size.x - 1) as f32))
            .collect();
        IntensityVolume::from_raw(size, values).unwrap()
    }

    #[test]
    fn test_isotropic_resolution() {
        let r = isotropic_resolution(UVec3::new(512, 512, 100), Vec3::new(0.5, 0.5, 2.5));
        assert_eq!(r, UVec3::new(512, 512, 500));
    }

    #[test]
    fn test_trilinear_midpoint() {
        let volume = ramp(UVec3::new(3, 2, 2));
        assert_abs_diff_eq!(trilinear(&volume, Vec3::new(0.5, 0.5, 0.5)), 0.25, epsilon = 1e-4);
        assert_abs_diff_eq!(trilinear(&volume, Vec3::new(9.0, 0.0, 0.0)), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_same_size_resample_is_identity() {
        let volume = ramp(UVec3::new(5, 3, 4));
        let par = Parallelization::new(2).unwrap();
        let out = resample(&volume, volume.size(), &par).unwrap();
        assert_eq!(out, volume);
    }

    #[test]
    fn test_upsample_keeps_range() {
        let volume = ramp(UVec3::new(4, 4, 4));
        let par = Parallelization::new(4).unwrap();
        let out = resample(&volume, UVec3::new(8, 4, 6), &par).unwrap();
        assert_eq!(out.size(), UVec3::new(8, 4, 6));
        assert_eq!(out.get(UVec3::ZERO), Some(0));
        assert_eq!(out.get(UVec3::new(7, 0, 0)), Some(u16::MAX));
        let mid = out.intensity(UVec3::new(3, 1, 1)).unwrap();
        assert!(mid > 0.0 && mid < 1.0);
    }
}

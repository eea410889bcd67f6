//! Small numeric helpers shared by the partitioning and rendering code.

use glam::{Mat4, UVec3, Vec3};

/// Rounds `n` to an even number, moving in the direction of `step` when odd.
///
/// `step` must be `1` or `-1`.
pub fn make_even(n: u32, step: i32) -> u32 {
    if n % 2 == 0 {
        n
    } else if step < 0 {
        n - 1
    } else {
        n + 1
    }
}

/// Rounds every component of `v` up to the next even number.
pub fn make_even_up(v: UVec3) -> UVec3 {
    UVec3::new(make_even(v.x, 1), make_even(v.y, 1), make_even(v.z, 1))
}

/// Returns the largest absolute component of `v`.
pub fn max_abs_element(v: Vec3) -> f32 {
    v.abs().max_element()
}

/// Builds a matrix whose first three columns are the given basis vectors.
pub fn basis(x: Vec3, y: Vec3, z: Vec3) -> Mat4 {
    Mat4::from_cols(x.extend(0.0), y.extend(0.0), z.extend(0.0), glam::Vec4::W)
}

/// Number of elements of a 3D extent.
pub fn volume_of(size: UVec3) -> usize {
    size.x as usize * size.y as usize * size.z as usize
}

/// Iterates all integer coordinates inside `size` in x-fastest order.
pub fn coords(size: UVec3) -> impl Iterator<Item = UVec3> {
    (0..size.z).flat_map(move |z| {
        (0..size.y).flat_map(move |y| (0..size.x).map(move |x| UVec3::new(x, y, z)))
    })
}

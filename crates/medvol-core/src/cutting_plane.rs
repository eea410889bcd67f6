//! Planes cutting through volume segments.

use glam::{Mat4, Vec3};

/// A plane given by a point and a unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CuttingPlane {
    origin: Vec3,
    normal: Vec3,
}

impl CuttingPlane {
    /// Creates a plane; `normal` is normalized.
    pub fn new(origin: Vec3, normal: Vec3) -> Self {
        Self {
            origin,
            normal: normal.try_normalize().unwrap_or(Vec3::Z),
        }
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    /// Positive on the side the normal points to.
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        (point - self.origin).dot(self.normal)
    }

    /// Projects a point onto the plane.
    pub fn project(&self, point: Vec3) -> Vec3 {
        point - self.signed_distance(point) * self.normal
    }

    /// The plane expressed in the frame mapped to world by `model`.
    pub fn to_model_space(&self, model: &Mat4) -> Self {
        let inverse = model.inverse();
        let origin = inverse.transform_point3(self.origin);
        let normal = model.transpose().transform_vector3(self.normal);
        Self::new(origin, normal)
    }

    /// Polygon where the plane cuts the box `[-0.5, 0.5]³`, ordered
    /// counter-clockwise around the normal.
    ///
    /// Returns `None` when the plane meets the box in fewer than three
    /// points; callers skip the plane for this box.
    #[allow(clippy::cast_precision_loss)]
    pub fn intersect_unit_box(&self) -> Option<Vec<Vec3>> {
        const CORNERS: [Vec3; 8] = [
            Vec3::new(-0.5, -0.5, -0.5),
            Vec3::new(0.5, -0.5, -0.5),
            Vec3::new(0.5, 0.5, -0.5),
            Vec3::new(-0.5, 0.5, -0.5),
            Vec3::new(-0.5, -0.5, 0.5),
            Vec3::new(0.5, -0.5, 0.5),
            Vec3::new(0.5, 0.5, 0.5),
            Vec3::new(-0.5, 0.5, 0.5),
        ];
        const EDGES: [(usize, usize); 12] = [
            (0, 1), (1, 2), (2, 3), (3, 0),
            (4, 5), (5, 6), (6, 7), (7, 4),
            (0, 4), (1, 5), (2, 6), (3, 7),
        ];
        const EPSILON: f32 = 1e-6;

        let mut points: Vec<Vec3> = Vec::with_capacity(6);
        let push_unique = |p: Vec3, points: &mut Vec<Vec3>| {
            if !points.iter().any(|q| q.distance_squared(p) < EPSILON) {
                points.push(p);
            }
        };
        for (a, b) in EDGES {
            let pa = CORNERS[a];
            let pb = CORNERS[b];
            let da = self.signed_distance(pa);
            let db = self.signed_distance(pb);
            if da.abs() < EPSILON {
                push_unique(pa, &mut points);
            }
            if db.abs() < EPSILON {
                push_unique(pb, &mut points);
            }
            if (da < -EPSILON && db > EPSILON) || (da > EPSILON && db < -EPSILON) {
                let t = da / (da - db);
                push_unique(pa + (pb - pa) * t, &mut points);
            }
        }
        if points.len() < 3 {
            return None;
        }

        let center = points.iter().copied().sum::<Vec3>() / points.len() as f32;
        let u = self.normal.any_orthonormal_vector();
        let v = self.normal.cross(u);
        points.sort_by(|p, q| {
            let ap = (*p - center).dot(v).atan2((*p - center).dot(u));
            let aq = (*q - center).dot(v).atan2((*q - center).dot(u));
            ap.total_cmp(&aq)
        });
        Some(points)
    }
}

/// Splits a convex polygon into a triangle fan.
pub fn triangulate_fan(polygon: &[Vec3]) -> Vec<[Vec3; 3]> {
    if polygon.len() < 3 {
        return Vec::new();
    }
    (1..polygon.len() - 1)
        .map(|i| [polygon[0], polygon[i], polygon[i + 1]])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_signed_distance_and_project() {
        let plane = CuttingPlane::new(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 2.0, 0.0));
        assert_abs_diff_eq!(plane.signed_distance(Vec3::new(3.0, 4.0, 0.0)), 3.0);
        assert_eq!(plane.project(Vec3::new(3.0, 4.0, 1.0)), Vec3::new(3.0, 1.0, 1.0));
    }

    #[test]
    fn test_axis_plane_gives_square() {
        let plane = CuttingPlane::new(Vec3::ZERO, Vec3::Z);
        let polygon = plane.intersect_unit_box().unwrap();
        assert_eq!(polygon.len(), 4);
        for p in &polygon {
            assert_abs_diff_eq!(p.z, 0.0);
            assert_abs_diff_eq!(p.x.abs(), 0.5);
        }
        assert_eq!(triangulate_fan(&polygon).len(), 2);
    }

    #[test]
    fn test_diagonal_plane_gives_hexagon() {
        let plane = CuttingPlane::new(Vec3::ZERO, Vec3::ONE);
        let polygon = plane.intersect_unit_box().unwrap();
        assert_eq!(polygon.len(), 6);
        // consecutive vertices wind positively around the normal
        let n = (polygon[1] - polygon[0]).cross(polygon[2] - polygon[1]);
        assert!(n.dot(Vec3::ONE) > 0.0);
    }

    #[test]
    fn test_missing_or_touching_plane_is_degenerate() {
        assert!(CuttingPlane::new(Vec3::new(0.0, 0.0, 2.0), Vec3::Z)
            .intersect_unit_box()
            .is_none());
        // touches a single corner
        let corner = Vec3::splat(0.5);
        assert!(CuttingPlane::new(corner, Vec3::ONE).intersect_unit_box().is_none());
    }

    #[test]
    fn test_to_model_space() {
        let model = Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0)) * Mat4::from_scale(Vec3::splat(2.0));
        let plane = CuttingPlane::new(Vec3::new(0.0, 0.0, 5.5), Vec3::Z).to_model_space(&model);
        assert_abs_diff_eq!(plane.origin().z, 0.25);
        assert_abs_diff_eq!(plane.normal().z, 1.0);
    }
}

//! Minimal scene nodes produced by the grid helper and consumed by the
//! render stages.

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::{Mat4, Vec3};

use crate::texture::Role;

/// Axis-aligned box centered at the model-space origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub size: Vec3,
}

impl BoundingBox {
    pub fn new(size: Vec3) -> Self {
        Self { size }
    }

    /// Point of the box closest to `point`, both in model space.
    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        let half = self.size * 0.5;
        point.clamp(-half, half)
    }

    /// Distance from the view-space origin to the box under `model_view`.
    pub fn distance_to_eye(&self, model_view: &Mat4) -> f32 {
        let eye_in_model = model_view.inverse().transform_point3(Vec3::ZERO);
        model_view
            .transform_point3(self.closest_point(eye_in_model))
            .length()
    }
}

/// Leaf payload of a node: typed geometry with attached textures.
#[derive(Debug)]
pub struct Geometry<T> {
    geometry_type: u32,
    bounding_box: Option<BoundingBox>,
    features: BTreeMap<Role, Arc<T>>,
}

impl<T> Geometry<T> {
    pub fn new(geometry_type: u32) -> Self {
        Self {
            geometry_type,
            bounding_box: None,
            features: BTreeMap::new(),
        }
    }

    pub fn geometry_type(&self) -> u32 {
        self.geometry_type
    }

    pub fn bounding_box(&self) -> Option<&BoundingBox> {
        self.bounding_box.as_ref()
    }

    pub fn set_bounding_box(&mut self, bounding_box: BoundingBox) {
        self.bounding_box = Some(bounding_box);
    }

    /// Attaches `feature` under `role`, replacing any previous one.
    pub fn put_feature(&mut self, role: Role, feature: Arc<T>) {
        self.features.insert(role, feature);
    }

    pub fn feature(&self, role: Role) -> Option<&Arc<T>> {
        self.features.get(&role)
    }

    /// Attached features ordered by role.
    pub fn features(&self) -> impl Iterator<Item = (Role, &Arc<T>)> {
        self.features.iter().map(|(role, feature)| (*role, feature))
    }
}

/// A transform node with optional geometry and children.
#[derive(Debug)]
pub struct Node<T> {
    pub local_transform: Mat4,
    pub movable: bool,
    geometry: Option<Geometry<T>>,
    children: Vec<Node<T>>,
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Self {
            local_transform: Mat4::IDENTITY,
            movable: true,
            geometry: None,
            children: Vec::new(),
        }
    }
}

impl<T> Node<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a node carrying `geometry`.
    pub fn with_geometry(geometry: Geometry<T>, local_transform: Mat4) -> Self {
        Self {
            local_transform,
            movable: false,
            geometry: Some(geometry),
            children: Vec::new(),
        }
    }

    pub fn attach_child(&mut self, child: Node<T>) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[Node<T>] {
        &self.children
    }

    pub fn geometry(&self) -> Option<&Geometry<T>> {
        self.geometry.as_ref()
    }

    /// Visits every geometry in depth-first order with its world transform.
    pub fn visit_geometries<'a>(&'a self, parent_world: Mat4, visit: &mut impl FnMut(&'a Geometry<T>, Mat4)) {
        let world = parent_world * self.local_transform;
        if let Some(geometry) = &self.geometry {
            visit(geometry, world);
        }
        for child in &self.children {
            child.visit_geometries(world, visit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_closest_point_distance() {
        let bbox = BoundingBox::new(Vec3::ONE);
        let model_view = Mat4::from_translation(Vec3::new(0.0, 0.0, -3.0));
        assert_abs_diff_eq!(bbox.distance_to_eye(&model_view), 2.5);
    }

    #[test]
    fn test_distance_inside_box_is_zero() {
        let bbox = BoundingBox::new(Vec3::splat(4.0));
        assert_abs_diff_eq!(bbox.distance_to_eye(&Mat4::IDENTITY), 0.0);
    }

    #[test]
    fn test_world_transforms_accumulate() {
        let mut root: Node<()> = Node::new();
        root.local_transform = Mat4::from_translation(Vec3::X);
        root.attach_child(Node::with_geometry(
            Geometry::new(3),
            Mat4::from_translation(Vec3::Y),
        ));
        let mut seen = Vec::new();
        root.visit_geometries(Mat4::IDENTITY, &mut |geometry, world| {
            seen.push((geometry.geometry_type(), world.transform_point3(Vec3::ZERO)));
        });
        assert_eq!(seen, vec![(3, Vec3::new(1.0, 1.0, 0.0))]);
    }
}

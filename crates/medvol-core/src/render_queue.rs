//! Per-frame render queues built from a scene subtree.

use glam::Mat4;

use crate::scene::{Geometry, Node};

/// A geometry instance prepared for one frame.
#[derive(Debug)]
pub struct Renderable<'a, T> {
    geometry: &'a Geometry<T>,
    world_transform: Mat4,
    model_view: Mat4,
}

impl<'a, T> Renderable<'a, T> {
    pub fn geometry(&self) -> &'a Geometry<T> {
        self.geometry
    }

    pub fn world_transform(&self) -> Mat4 {
        self.world_transform
    }

    pub fn model_view(&self) -> Mat4 {
        self.model_view
    }

    /// Distance from the eye to the geometry's bounding box, falling back to
    /// the model origin for geometries without one.
    pub fn eye_distance(&self) -> f32 {
        match self.geometry.bounding_box() {
            Some(bbox) => bbox.distance_to_eye(&self.model_view),
            None => self.model_view.w_axis.truncate().length(),
        }
    }
}

/// Order in which a queue hands out its renderables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderOrder {
    /// Traversal order.
    #[default]
    Unsorted,
    /// Farthest bounding box first.
    BackToFront,
    /// Nearest bounding box first.
    FrontToBack,
}

/// Geometries of one type, collected and ordered for rendering.
#[derive(Debug)]
pub struct RenderQueue<'a, T> {
    geometry_type: u32,
    order: RenderOrder,
    items: Vec<Renderable<'a, T>>,
}

impl<'a, T> RenderQueue<'a, T> {
    /// Collects all geometries of `geometry_type` below `root` and orders them.
    pub fn build(root: &'a Node<T>, view: Mat4, geometry_type: u32, order: RenderOrder) -> Self {
        let mut items = Vec::new();
        root.visit_geometries(Mat4::IDENTITY, &mut |geometry, world| {
            if geometry.geometry_type() == geometry_type {
                items.push(Renderable {
                    geometry,
                    world_transform: world,
                    model_view: view * world,
                });
            }
        });
        let mut queue = Self {
            geometry_type,
            order,
            items,
        };
        queue.sort();
        queue
    }

    /// Recomputes view-dependent transforms and re-sorts for a new `view`.
    pub fn update_view(&mut self, view: Mat4) {
        for item in &mut self.items {
            item.model_view = view * item.world_transform;
        }
        self.sort();
    }

    fn sort(&mut self) {
        match self.order {
            RenderOrder::Unsorted => {}
            RenderOrder::BackToFront => self
                .items
                .sort_by(|a, b| b.eye_distance().total_cmp(&a.eye_distance())),
            RenderOrder::FrontToBack => self
                .items
                .sort_by(|a, b| a.eye_distance().total_cmp(&b.eye_distance())),
        }
    }

    pub fn geometry_type(&self) -> u32 {
        self.geometry_type
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Renderable<'a, T>> {
        self.items.iter()
    }
}

//! Sizing, loading and scene construction for a partitioned volume.

use glam::{Mat4, UVec3, Vec3};

use crate::error::{MedvolError, Result};
use crate::grid::VolumeGrid;
use crate::huv::Huv;
use crate::normals::{compute_normals, NormalsConfig};
use crate::partitioning::GridPartitioning;
use crate::scene::{BoundingBox, Geometry, Node};
use crate::segment::Segment;
use crate::texture::{Role, TextureCache, TextureFactory};
use crate::volume::Voxel;

/// Physical size of one voxel along each axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spacing(pub Vec3);

/// Physical size of the whole native volume, measured between the centers
/// of the first and last voxel along each axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent(pub Vec3);

/// Either form of physical dimensions accepted by
/// [`VolumeGridHelper::create_node`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeDimensions {
    Spacing(Vec3),
    Extent(Vec3),
}

impl From<Spacing> for NodeDimensions {
    fn from(spacing: Spacing) -> Self {
        Self::Spacing(spacing.0)
    }
}

impl From<Extent> for NodeDimensions {
    fn from(extent: Extent) -> Self {
        Self::Extent(extent.0)
    }
}

impl NodeDimensions {
    /// Resolves to `(spacing, extent)` using `extent = spacing * (native - 1)`.
    pub fn resolve(self, native_resolution: UVec3) -> Result<(Spacing, Extent)> {
        let intervals = (native_resolution.as_vec3() - Vec3::ONE).max(Vec3::ZERO);
        match self {
            Self::Spacing(spacing) => {
                if spacing.cmple(Vec3::ZERO).any() {
                    return Err(MedvolError::InvalidDimensions(format!(
                        "spacing {spacing} must be positive"
                    )));
                }
                Ok((Spacing(spacing), Extent(spacing * intervals)))
            }
            Self::Extent(extent) => {
                if extent.cmple(Vec3::ZERO).any() || intervals.cmple(Vec3::ZERO).any() {
                    return Err(MedvolError::InvalidDimensions(format!(
                        "extent {extent} cannot be distributed over {native_resolution} voxels"
                    )));
                }
                Ok((Spacing(extent / intervals), Extent(extent)))
            }
        }
    }
}

/// Owns a [`VolumeGrid`] together with its partitioning and the textures
/// created for its segments.
///
/// `T` is the texture type of the backend that [`create_node`] uploads to.
///
/// [`create_node`]: VolumeGridHelper::create_node
pub struct VolumeGridHelper<V: Voxel, T> {
    partitioning: GridPartitioning,
    grid: VolumeGrid<V>,
    normals: Option<NormalsConfig>,
    textures: TextureCache<T>,
    loaded: bool,
}

impl<V: Voxel, T> VolumeGridHelper<V, T> {
    /// Creates a helper for data of `native_resolution`, keeping each
    /// segment's intensity buffer within `max_segment_bytesize` bytes.
    pub fn new(
        native_resolution: UVec3,
        max_segment_bytesize: usize,
        normals: Option<NormalsConfig>,
    ) -> Result<Self> {
        let partitioning = GridPartitioning::new(native_resolution, max_segment_bytesize, V::byte_size())?;
        let grid = VolumeGrid::new(
            UVec3::splat(partitioning.max_segment_size),
            partitioning.segment_counts(),
            |coord| partitioning.segment_size(coord),
        )?;
        log::debug!(
            "partitioned {} voxels (padded to {}) into segments of at most {}",
            native_resolution,
            partitioning.resolution,
            partitioning.max_segment_size
        );
        Ok(Self {
            partitioning,
            grid,
            normals,
            textures: TextureCache::new(),
            loaded: false,
        })
    }

    /// Creates a helper with the default per-segment budget.
    pub fn with_default_budget(native_resolution: UVec3) -> Result<Self> {
        Self::new(
            native_resolution,
            crate::partitioning::DEFAULT_MAX_SEGMENT_BYTESIZE,
            None,
        )
    }

    pub fn partitioning(&self) -> &GridPartitioning {
        &self.partitioning
    }

    pub fn native_resolution(&self) -> UVec3 {
        self.partitioning.native_resolution
    }

    /// Native resolution rounded up to even.
    pub fn resolution(&self) -> UVec3 {
        self.partitioning.resolution
    }

    pub fn grid(&self) -> &VolumeGrid<V> {
        &self.grid
    }

    /// Mutable grid access. Changing voxels this way leaves normals and
    /// cached textures stale until [`compute_normals`](Self::compute_normals)
    /// and [`release_geometry_features`](Self::release_geometry_features) run.
    pub fn grid_mut(&mut self) -> &mut VolumeGrid<V> {
        &mut self.grid
    }

    pub fn normals_config(&self) -> Option<NormalsConfig> {
        self.normals
    }

    pub fn texture_cache(&self) -> &TextureCache<T> {
        &self.textures
    }

    /// Whether intensities were loaded at least once.
    pub fn has_data(&self) -> bool {
        self.loaded
    }

    /// Fills the grid from `data`, which is queried exactly once for every
    /// voxel inside the native resolution. Padding voxels are set to zero
    /// intensity.
    pub fn load_intensities(&mut self, mut data: impl FnMut(UVec3) -> f32) -> Result<()> {
        self.release_geometry_features();
        let background = V::from_intensity(0.0);
        for coord in crate::math::coords(self.partitioning.resolution) {
            let value = if self.partitioning.is_padding(coord) {
                background
            } else {
                V::from_intensity(data(coord))
            };
            self.grid.set_voxel(coord, value)?;
        }
        self.loaded = true;
        self.compute_normals();
        Ok(())
    }

    /// Fills the grid from Hounsfield units; padding reads as -1024 HU.
    pub fn load_hu_data(&mut self, mut data: impl FnMut(UVec3) -> Huv) -> Result<()> {
        self.load_intensities(|coord| data(coord).to_intensity())
    }

    /// Fills the segment label maps from `mask`, which is queried exactly
    /// once for every voxel inside the native resolution. Padding voxels
    /// stay unmasked.
    pub fn load_mask(&mut self, mut mask: impl FnMut(UVec3) -> bool) -> Result<()> {
        self.release_geometry_features();
        for coord in crate::math::coords(self.partitioning.resolution) {
            let masked = !self.partitioning.is_padding(coord) && mask(coord);
            self.grid.set_mask_voxel(coord, if masked { u8::MAX } else { 0 })?;
        }
        log::debug!("loaded mask for {} segments", self.grid.len());
        Ok(())
    }

    /// Whether a label map is attached to the segments.
    pub fn has_mask(&self) -> bool {
        self.grid.segments().iter().any(|segment| segment.mask().is_some())
    }

    /// Drops the label maps; nodes created afterwards carry no mask.
    pub fn clear_mask(&mut self) {
        if self.has_mask() {
            self.release_geometry_features();
            self.grid.segments_mut().iter_mut().for_each(Segment::clear_mask);
        }
    }

    /// Recomputes the normal maps if normals are enabled.
    pub fn compute_normals(&mut self) {
        if let Some(config) = self.normals {
            compute_normals(&mut self.grid, self.partitioning.resolution, config);
        }
    }

    /// Drops every cached texture and returns how many were released.
    ///
    /// Textures still referenced by previously created nodes stay alive until
    /// those nodes are dropped; the next [`create_node`](Self::create_node)
    /// uploads fresh ones.
    pub fn release_geometry_features(&mut self) -> usize {
        self.textures.release()
    }

    /// Builds a pivot node centering the grid at the origin with one geometry
    /// child per segment.
    ///
    /// Each child has a unit bounding box scaled by its `local_transform` to
    /// the segment's physical extent; tail segments are shifted so they stay
    /// flush with their neighbours.
    pub fn create_node<F>(
        &mut self,
        factory: &F,
        geometry_type: u32,
        dimensions: impl Into<NodeDimensions>,
    ) -> Result<Node<T>>
    where
        F: TextureFactory<Texture = T>,
    {
        if !self.loaded {
            return Err(MedvolError::NoDataLoaded);
        }
        let (Spacing(spacing), Extent(extent)) =
            dimensions.into().resolve(self.partitioning.native_resolution)?;

        let regular_extent =
            extent.min(spacing * self.partitioning.regular_partition_size().as_vec3());

        let mut pivot = Node::new();
        pivot.local_transform = Mat4::from_translation((regular_extent - extent) / 2.0);
        pivot.movable = false;

        for index in 0..self.grid.len() {
            let segment_coord = self.grid.segment_coord(index);
            let segment = &self.grid.segments()[index];
            let tails = self.partitioning.is_tail(segment_coord);
            let volume_size = segment.volume_size().as_vec3();

            let mut segment_extent = regular_extent;
            let mut translation = segment_coord.as_vec3() * regular_extent;
            for axis in 0..3 {
                if tails[axis] {
                    segment_extent[axis] = (volume_size[axis] - 1.0) * spacing[axis];
                    translation[axis] -= (regular_extent[axis] - segment_extent[axis]) / 2.0;
                }
            }

            let mut geometry = Geometry::new(geometry_type);
            geometry.set_bounding_box(BoundingBox::new(Vec3::ONE));

            let intensities = self.textures.get_or_create((index, Role::Intensities), || {
                factory.create_intensity_texture(segment.intensities())
            })?;
            geometry.put_feature(Role::Intensities, intensities);

            if let Some(normal_map) = segment.normals() {
                let normals = self
                    .textures
                    .get_or_create((index, Role::Normals), || factory.create_normals_texture(normal_map))?;
                geometry.put_feature(Role::Normals, normals);
            }

            if let Some(mask) = segment.mask() {
                let mask = self
                    .textures
                    .get_or_create((index, Role::Mask), || factory.create_mask_texture(mask))?;
                geometry.put_feature(Role::Mask, mask);
            }

            pivot.attach_child(Node::with_geometry(
                geometry,
                Mat4::from_translation(translation) * Mat4::from_scale(segment_extent),
            ));
        }

        let counts = self.grid.segment_counts();
        log::info!(
            "computed {}-bit grid data using {}x{}x{} segments",
            V::BITS,
            counts.x,
            counts.y,
            counts.z
        );
        Ok(pivot)
    }
}

impl<V: Voxel, T> Drop for VolumeGridHelper<V, T> {
    fn drop(&mut self) {
        if !self.textures.is_empty() {
            log::warn!(
                "volume grid helper dropped with {} cached textures, releasing them",
                self.textures.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::coords;
    use crate::texture::VolumeTexture;
    use crate::volume::{IntensityVolume, NormalMap};
    use approx::assert_abs_diff_eq;
    use std::cell::Cell;
    use std::sync::Arc;

    #[derive(Debug)]
    struct MockTexture {
        size: UVec3,
        role: Role,
    }

    impl VolumeTexture for MockTexture {
        fn size(&self) -> UVec3 {
            self.size
        }
    }

    #[derive(Default)]
    struct MockFactory {
        created: Cell<usize>,
    }

    impl TextureFactory for MockFactory {
        type Texture = MockTexture;

        fn create_intensity_texture<V: Voxel>(&self, volume: &IntensityVolume<V>) -> Result<MockTexture> {
            self.created.set(self.created.get() + 1);
            Ok(MockTexture {
                size: volume.size(),
                role: Role::Intensities,
            })
        }

        fn create_normals_texture(&self, normals: &NormalMap) -> Result<MockTexture> {
            self.created.set(self.created.get() + 1);
            Ok(MockTexture {
                size: normals.size(),
                role: Role::Normals,
            })
        }

        fn create_mask_texture(&self, mask: &IntensityVolume<u8>) -> Result<MockTexture> {
            self.created.set(self.created.get() + 1);
            Ok(MockTexture {
                size: mask.size(),
                role: Role::Mask,
            })
        }
    }

    type Helper = VolumeGridHelper<u16, MockTexture>;

    fn pattern(c: UVec3) -> f32 {
        ((c.x * 7 + c.y * 3 + c.z) % 11) as f32 / 10.0
    }

    /// Budget for 6³ 16-bit voxels, i.e. segments of regular size 5.
    const SMALL_BUDGET: usize = 6 * 6 * 6 * 2;

    #[test]
    fn test_ten_cubed_grid_layout() {
        let helper = Helper::new(UVec3::splat(10), SMALL_BUDGET, None).unwrap();
        assert_eq!(helper.resolution(), UVec3::splat(10));
        assert_eq!(helper.grid().segment_counts(), UVec3::splat(2));
        let first = helper.grid().segment_at(UVec3::ZERO).unwrap();
        let last = helper.grid().segment_at(UVec3::ONE).unwrap();
        assert_eq!(first.volume_size(), UVec3::splat(6));
        assert_eq!(last.volume_size(), UVec3::splat(5));
        assert_eq!(last.offset(), UVec3::splat(5));
    }

    #[test]
    fn test_odd_resolution_is_padded_with_background() {
        let mut helper = Helper::new(UVec3::splat(3), SMALL_BUDGET, None).unwrap();
        assert_eq!(helper.resolution(), UVec3::splat(4));
        helper.load_intensities(|_| 1.0).unwrap();
        for c in coords(UVec3::splat(4)) {
            let value = helper.grid().get_voxel(c).unwrap();
            if c.x == 3 || c.y == 3 || c.z == 3 {
                assert_eq!(value, 0, "padding voxel {c}");
            } else {
                assert_eq!(value, u16::MAX);
            }
        }
    }

    #[test]
    fn test_data_source_never_queried_outside_native_bounds() {
        let native = UVec3::new(7, 4, 9);
        let mut helper = Helper::new(native, SMALL_BUDGET, None).unwrap();
        let calls = Cell::new(0usize);
        helper
            .load_intensities(|c| {
                assert!(c.cmplt(native).all(), "queried padding voxel {c}");
                calls.set(calls.get() + 1);
                0.5
            })
            .unwrap();
        assert_eq!(calls.get(), 7 * 4 * 9);
    }

    #[test]
    fn test_load_hu_pads_with_air() {
        let mut helper = Helper::new(UVec3::new(3, 2, 2), SMALL_BUDGET, None).unwrap();
        helper.load_hu_data(|_| Huv::new(400)).unwrap();
        let padded = helper.grid().get_voxel(UVec3::new(3, 0, 0)).unwrap();
        assert_eq!(Huv::from_intensity(padded.to_intensity()), Huv::MIN);
        let inside = helper.grid().get_voxel(UVec3::ZERO).unwrap();
        assert_eq!(Huv::from_intensity(inside.to_intensity()), Huv::new(400));
    }

    #[test]
    fn test_load_intensities_is_idempotent() {
        let mut helper = Helper::new(UVec3::new(11, 6, 13), SMALL_BUDGET, Some(NormalsConfig::default())).unwrap();
        helper.load_intensities(pattern).unwrap();
        let first: Vec<_> = helper.grid().segments().to_vec();
        helper.load_intensities(pattern).unwrap();
        for (a, b) in first.iter().zip(helper.grid().segments()) {
            assert_eq!(a.intensities(), b.intensities());
            assert_eq!(a.normals(), b.normals());
        }
    }

    #[test]
    fn test_loaded_values_read_back() {
        let native = UVec3::new(11, 6, 13);
        let mut helper = Helper::new(native, SMALL_BUDGET, None).unwrap();
        helper.load_intensities(pattern).unwrap();
        for c in coords(native) {
            assert_eq!(helper.grid().get_voxel(c).unwrap(), u16::from_intensity(pattern(c)));
        }
    }

    #[test]
    fn test_create_node_before_load_fails() {
        let mut helper = Helper::new(UVec3::splat(4), SMALL_BUDGET, None).unwrap();
        let factory = MockFactory::default();
        let result = helper.create_node(&factory, 1, Spacing(Vec3::ONE));
        assert!(matches!(result, Err(MedvolError::NoDataLoaded)));
    }

    #[test]
    fn test_create_node_places_segments() {
        let mut helper = Helper::new(UVec3::splat(10), SMALL_BUDGET, None).unwrap();
        helper.load_intensities(pattern).unwrap();
        let factory = MockFactory::default();
        let pivot = helper.create_node(&factory, 7, Spacing(Vec3::ONE)).unwrap();

        assert_eq!(pivot.children().len(), 8);
        assert_eq!(factory.created.get(), 8);
        assert_eq!(helper.texture_cache().len(), 8);

        // extent 9, regular segment extent 5
        let pivot_offset = pivot.local_transform.transform_point3(Vec3::ZERO);
        assert_abs_diff_eq!(pivot_offset.x, -2.0);

        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        pivot.visit_geometries(Mat4::IDENTITY, &mut |geometry, world| {
            assert_eq!(geometry.geometry_type(), 7);
            assert_eq!(geometry.bounding_box().unwrap().size, Vec3::ONE);
            assert!(geometry.feature(Role::Normals).is_none());
            min = min.min(world.transform_point3(Vec3::splat(-0.5)));
            max = max.max(world.transform_point3(Vec3::splat(0.5)));
        });
        // regular segments span 5 units, tails 4, so the grid spans 9
        assert_abs_diff_eq!(max.x - min.x, 9.0, epsilon = 1e-5);
        assert_abs_diff_eq!((max + min).length(), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_tail_segment_is_flush_with_neighbour() {
        let mut helper = Helper::new(UVec3::new(12, 2, 2), SMALL_BUDGET, None).unwrap();
        helper.load_intensities(pattern).unwrap();
        let pivot = helper.create_node(&MockFactory::default(), 1, Spacing(Vec3::ONE)).unwrap();

        let mut spans = Vec::new();
        pivot.visit_geometries(Mat4::IDENTITY, &mut |_, world| {
            spans.push((
                world.transform_point3(Vec3::splat(-0.5)).x,
                world.transform_point3(Vec3::splat(0.5)).x,
            ));
        });
        spans.sort_by(|a, b| a.0.total_cmp(&b.0));
        assert_eq!(spans.len(), 3);
        for pair in spans.windows(2) {
            assert_abs_diff_eq!(pair[0].1, pair[1].0, epsilon = 1e-5);
        }
        // the tail holds two voxels, one spacing wide
        assert_abs_diff_eq!(spans[2].1 - spans[2].0, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_extent_and_spacing_agree() {
        let native = UVec3::new(11, 5, 3);
        let (spacing, extent) = NodeDimensions::from(Spacing(Vec3::new(0.5, 1.0, 2.0)))
            .resolve(native)
            .unwrap();
        assert_eq!(extent.0, Vec3::new(5.0, 4.0, 4.0));
        let (back, _) = NodeDimensions::from(extent).resolve(native).unwrap();
        assert_eq!(back, spacing);
        assert!(NodeDimensions::Spacing(Vec3::new(1.0, 0.0, 1.0)).resolve(native).is_err());
        assert!(NodeDimensions::Extent(Vec3::ONE).resolve(UVec3::new(1, 4, 4)).is_err());
    }

    #[test]
    fn test_normals_attached_when_enabled() {
        let mut helper = Helper::new(UVec3::splat(6), SMALL_BUDGET, Some(NormalsConfig::default())).unwrap();
        helper.load_intensities(pattern).unwrap();
        let factory = MockFactory::default();
        let pivot = helper.create_node(&factory, 1, Extent(Vec3::splat(5.0))).unwrap();
        let mut roles = Vec::new();
        pivot.visit_geometries(Mat4::IDENTITY, &mut |geometry, _| {
            let normals = geometry.feature(Role::Normals).unwrap();
            roles.push(normals.role);
            assert_eq!(normals.size, geometry.feature(Role::Intensities).unwrap().size);
        });
        assert!(roles.iter().all(|r| *r == Role::Normals));
        assert_eq!(helper.texture_cache().len(), 2 * pivot.children().len());
    }

    #[test]
    fn test_release_then_create_makes_new_textures() {
        let mut helper = Helper::new(UVec3::splat(10), SMALL_BUDGET, None).unwrap();
        helper.load_intensities(pattern).unwrap();
        let factory = MockFactory::default();

        let first = helper.create_node(&factory, 1, Spacing(Vec3::ONE)).unwrap();
        let again = helper.create_node(&factory, 1, Spacing(Vec3::ONE)).unwrap();
        assert_eq!(factory.created.get(), 8);

        let before: Vec<Arc<MockTexture>> = first
            .children()
            .iter()
            .map(|c| Arc::clone(c.geometry().unwrap().feature(Role::Intensities).unwrap()))
            .collect();
        for (a, b) in first.children().iter().zip(again.children()) {
            let a = a.geometry().unwrap().feature(Role::Intensities).unwrap();
            let b = b.geometry().unwrap().feature(Role::Intensities).unwrap();
            assert!(Arc::ptr_eq(a, b));
        }

        assert_eq!(helper.release_geometry_features(), 8);
        assert_eq!(helper.texture_cache().len(), 0);

        let after = helper.create_node(&factory, 1, Spacing(Vec3::ONE)).unwrap();
        assert_eq!(factory.created.get(), 16);
        for (old, child) in before.iter().zip(after.children()) {
            let new = child.geometry().unwrap().feature(Role::Intensities).unwrap();
            assert!(!Arc::ptr_eq(old, new));
        }
    }

    #[test]
    fn test_reload_invalidates_cache() {
        let mut helper = Helper::new(UVec3::splat(4), SMALL_BUDGET, None).unwrap();
        helper.load_intensities(pattern).unwrap();
        helper.create_node(&MockFactory::default(), 1, Spacing(Vec3::ONE)).unwrap();
        assert_eq!(helper.texture_cache().len(), 1);
        helper.load_intensities(pattern).unwrap();
        assert!(helper.texture_cache().is_empty());
    }

    #[test]
    fn test_mask_attached_after_load() {
        let native = UVec3::new(9, 4, 4);
        let mut helper = Helper::new(native, SMALL_BUDGET, None).unwrap();
        helper.load_intensities(pattern).unwrap();
        assert!(!helper.has_mask());

        let calls = Cell::new(0usize);
        helper
            .load_mask(|c| {
                assert!(c.cmplt(native).all(), "queried padding voxel {c}");
                calls.set(calls.get() + 1);
                c.x >= 5
            })
            .unwrap();
        assert_eq!(calls.get(), 9 * 4 * 4);
        assert!(helper.has_mask());
        assert_eq!(helper.grid().get_mask_voxel(UVec3::new(5, 1, 1)).unwrap(), u8::MAX);
        assert_eq!(helper.grid().get_mask_voxel(UVec3::new(4, 1, 1)).unwrap(), 0);
        // padding column of the odd x resolution
        assert_eq!(helper.grid().get_mask_voxel(UVec3::new(9, 1, 1)).unwrap(), 0);

        let factory = MockFactory::default();
        let pivot = helper.create_node(&factory, 1, Spacing(Vec3::ONE)).unwrap();
        pivot.visit_geometries(Mat4::IDENTITY, &mut |geometry, _| {
            let mask = geometry.feature(Role::Mask).unwrap();
            assert_eq!(mask.role, Role::Mask);
            assert_eq!(mask.size, geometry.feature(Role::Intensities).unwrap().size);
        });
        assert_eq!(helper.texture_cache().len(), 2 * pivot.children().len());
    }

    #[test]
    fn test_clear_mask_detaches_feature() {
        let mut helper = Helper::new(UVec3::splat(4), SMALL_BUDGET, None).unwrap();
        helper.load_intensities(pattern).unwrap();
        helper.load_mask(|_| true).unwrap();
        let factory = MockFactory::default();
        helper.create_node(&factory, 1, Spacing(Vec3::ONE)).unwrap();
        assert_eq!(helper.texture_cache().len(), 2);

        helper.clear_mask();
        assert!(!helper.has_mask());
        assert!(helper.texture_cache().is_empty());
        let pivot = helper.create_node(&factory, 1, Spacing(Vec3::ONE)).unwrap();
        pivot.visit_geometries(Mat4::IDENTITY, &mut |geometry, _| {
            assert!(geometry.feature(Role::Mask).is_none());
        });
    }
}

//! Basic integration tests for medvol-rs that run without a GPU.
//!
//! A counting texture factory stands in for the wgpu backend so the whole
//! load / partition / node / queue path can be exercised on CI machines.

use std::cell::Cell;

use medvol::*;

#[derive(Debug)]
struct CpuTexture {
    size: UVec3,
}

impl VolumeTexture for CpuTexture {
    fn size(&self) -> UVec3 {
        self.size
    }
}

#[derive(Default)]
struct CountingFactory {
    uploads: Cell<usize>,
}

impl TextureFactory for CountingFactory {
    type Texture = CpuTexture;

    fn create_intensity_texture<V: Voxel>(&self, volume: &IntensityVolume<V>) -> Result<CpuTexture> {
        self.uploads.set(self.uploads.get() + 1);
        Ok(CpuTexture { size: volume.size() })
    }

    fn create_normals_texture(&self, normals: &NormalMap) -> Result<CpuTexture> {
        self.uploads.set(self.uploads.get() + 1);
        Ok(CpuTexture { size: normals.size() })
    }

    fn create_mask_texture(&self, mask: &IntensityVolume<u8>) -> Result<CpuTexture> {
        self.uploads.set(self.uploads.get() + 1);
        Ok(CpuTexture { size: mask.size() })
    }
}

fn gradient(c: UVec3) -> f32 {
    (c.x + c.y + c.z) as f32 / 30.0
}

#[test]
fn test_basics() {
    init();

    // 2 * 8^3 bytes of u16 gives segments of 7 voxels plus border
    let mut helper: VolumeGridHelper<u16, CpuTexture> =
        VolumeGridHelper::new(UVec3::splat(10), 2 * 8 * 8 * 8, Some(NormalsConfig::default()))
            .expect("helper creation failed");
    let factory = CountingFactory::default();

    // Test 1: Partitioning
    {
        assert_eq!(helper.resolution(), UVec3::splat(10));
        assert_eq!(helper.partitioning().segment_counts(), UVec3::splat(2));
        assert_eq!(helper.grid().len(), 8);
    }

    // Test 2: Nodes need data first
    {
        let result = helper.create_node(&factory, VOLUME_GEOMETRY_TYPE, Spacing(Vec3::ONE));
        assert!(matches!(result, Err(MedvolError::NoDataLoaded)));
        assert_eq!(factory.uploads.get(), 0);
    }

    // Test 3: Loading writes every voxel including border duplicates
    {
        helper.load_intensities(gradient).expect("load failed");
        let grid = helper.grid();
        for c in [UVec3::ZERO, UVec3::new(7, 0, 0), UVec3::splat(7), UVec3::splat(9)] {
            let expected = u16::from_intensity(gradient(c));
            assert_eq!(grid.get_voxel(c).expect("voxel in range"), expected);
        }
        assert_eq!(grid.locations_of(UVec3::splat(7)).len(), 8);
        assert_eq!(grid.locations_of(UVec3::new(7, 3, 3)).len(), 2);
        assert_eq!(grid.locations_of(UVec3::splat(3)).len(), 1);
    }

    // Test 4: Node construction uploads intensity and normal textures once
    let root = helper
        .create_node(&factory, VOLUME_GEOMETRY_TYPE, Extent(Vec3::splat(9.0)))
        .expect("node creation failed");
    {
        assert_eq!(root.children().len(), 8);
        assert_eq!(factory.uploads.get(), 16);
        assert_eq!(helper.texture_cache().len(), 16);

        helper
            .create_node(&factory, VOLUME_GEOMETRY_TYPE, Extent(Vec3::splat(9.0)))
            .expect("cached node creation failed");
        assert_eq!(factory.uploads.get(), 16, "second node should reuse cached textures");
    }

    // Test 5: Back-to-front queue
    {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 40.0), Vec3::ZERO, Vec3::Y);
        let queue = RenderQueue::build(&root, view, VOLUME_GEOMETRY_TYPE, RenderOrder::BackToFront);
        assert_eq!(queue.len(), 8);
        let distances: Vec<f32> = queue.iter().map(|r| r.eye_distance()).collect();
        assert!(distances.windows(2).all(|w| w[0] >= w[1]));

        let other = RenderQueue::build(&root, view, VOLUME_GEOMETRY_TYPE + 1, RenderOrder::BackToFront);
        assert!(other.is_empty());
    }

    // Test 6: Masks upload one more texture per segment
    {
        helper.load_mask(|c| c.z < 5).expect("mask load failed");
        assert!(helper.texture_cache().is_empty());
        let masked = helper
            .create_node(&factory, VOLUME_GEOMETRY_TYPE, Extent(Vec3::splat(9.0)))
            .expect("masked node creation failed");
        assert_eq!(factory.uploads.get(), 16 + 24);
        assert!(masked.children().iter().all(|c| c
            .geometry()
            .is_some_and(|g| g.feature(Role::Mask).is_some())));
        assert_eq!(helper.grid().get_mask_voxel(UVec3::new(9, 9, 4)).expect("label"), u8::MAX);
        assert_eq!(helper.grid().get_mask_voxel(UVec3::new(0, 0, 5)).expect("label"), 0);
        helper.clear_mask();
    }

    // Test 7: Release then reload
    {
        helper
            .create_node(&factory, VOLUME_GEOMETRY_TYPE, Extent(Vec3::splat(9.0)))
            .expect("node creation failed");
        assert_eq!(helper.release_geometry_features(), 16);
        assert!(helper.texture_cache().is_empty());
        helper
            .load_hu_data(|_| Huv::new(0))
            .expect("hu load failed");
        let water = u16::from_intensity(Huv::new(0).to_intensity());
        assert_eq!(helper.grid().get_voxel(UVec3::splat(5)).expect("voxel"), water);
    }
}

#[test]
fn test_options_json() {
    let options = Options::from_json_str(r#"{ "sample_rate": 64, "drr": { "render_inverse": true } }"#)
        .expect("options parse failed");
    assert_eq!(options.sample_rate, 64);
    assert!(options.drr.render_inverse);
    assert_eq!(options.max_segment_bytesize, DEFAULT_MAX_SEGMENT_BYTESIZE);

    let round_trip = Options::from_json_str(&options.to_json().expect("serialize")).expect("parse");
    assert_eq!(round_trip, options);
}

#[test]
fn test_resample_then_load() {
    let values = (0..4 * 4 * 4).map(|i| (i % 4) as u8 * 80).collect();
    let source = IntensityVolume::from_raw(UVec3::splat(4), values).expect("source volume");
    let pool = Parallelization::new(2).expect("worker pool");
    let resampled = resample(&source, UVec3::splat(8), &pool).expect("resample failed");
    assert_eq!(resampled.size(), UVec3::splat(8));
    assert!((pool.progress().fraction() - 1.0).abs() < f32::EPSILON);

    let mut helper: VolumeGridHelper<u8, CpuTexture> =
        VolumeGridHelper::with_default_budget(resampled.size()).expect("helper creation failed");
    helper
        .load_intensities(|c| resampled.intensity(c).unwrap_or(0.0))
        .expect("load failed");
    assert!(helper.has_data());
}

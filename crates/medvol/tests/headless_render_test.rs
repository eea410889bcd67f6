//! Headless rendering integration tests.
//!
//! These tests require a GPU adapter (real or software fallback). Without
//! one, engine creation fails and the tests print a skip message.

use medvol::*;

/// Helper: check that a pixel buffer is not all-black and not uniform.
fn has_nontrivial_content(image: &image::RgbaImage) -> bool {
    let pixels = image.as_raw();
    let all_black = pixels.chunks(4).all(|px| px[0] == 0 && px[1] == 0 && px[2] == 0);
    let first = &pixels[0..4];
    let all_uniform = pixels.chunks(4).all(|px| px == first);
    !all_black && !all_uniform
}

fn engine(width: u32, height: u32) -> Option<VolumeEngine> {
    match pollster::block_on(VolumeEngine::new_headless(width, height)) {
        Ok(engine) => Some(engine),
        Err(e) => {
            eprintln!("Skipping headless tests: no GPU adapter available ({e})");
            None
        }
    }
}

/// Ball of bone-like intensity inside air.
fn ball(resolution: u32) -> impl FnMut(UVec3) -> f32 {
    let center = Vec3::splat((resolution as f32 - 1.0) / 2.0);
    let radius = resolution as f32 * 0.35;
    move |c: UVec3| {
        if c.as_vec3().distance(center) < radius {
            Huv::new(1200).to_intensity()
        } else {
            Huv::MIN.to_intensity()
        }
    }
}

/// Labels the same ball that [`ball`] fills with bone.
fn ball_mask(resolution: u32) -> impl FnMut(UVec3) -> bool {
    let mut intensities = ball(resolution);
    move |c: UVec3| intensities(c) > Huv::WATER.to_intensity()
}

/// Counts pixels that are clearly green.
fn green_pixels(image: &image::RgbaImage) -> usize {
    image
        .pixels()
        .filter(|px| i32::from(px[1]) > i32::from(px[0]) + 64 && i32::from(px[1]) > i32::from(px[2]) + 64)
        .count()
}

/// Counts pixels in the central quarter that are not black.
fn lit_center_pixels(image: &image::RgbaImage) -> usize {
    let (w, h) = image.dimensions();
    (h / 4..3 * h / 4)
        .flat_map(|y| (w / 4..3 * w / 4).map(move |x| (x, y)))
        .filter(|&(x, y)| {
            let px = image.get_pixel(x, y);
            px[0] > 0 || px[1] > 0 || px[2] > 0
        })
        .count()
}

struct FailingStage;

impl RenderStage for FailingStage {
    fn name(&self) -> &str {
        "failing"
    }

    fn render(
        &mut self,
        _frame: &FrameContext<'_>,
        _encoder: &mut wgpu::CommandEncoder,
        _root: &SceneNode,
    ) -> RenderResult<()> {
        Err(RenderError::Device("injected failure".into()))
    }
}

#[test]
fn headless_render_tests() {
    medvol::init();
    let Some(mut engine) = engine(160, 120) else {
        return;
    };

    // --- Test 1: Empty scene ---
    {
        let root = SceneNode::new();
        engine.render_frame(&root).expect("empty scene render failed");
        let image = engine.read_color().expect("readback failed");
        assert_eq!(image.dimensions(), (160, 120));
        let first = *image.get_pixel(0, 0);
        assert!(image.pixels().all(|px| *px == first), "empty scene should be uniform");
        let depth = engine.read_depth().expect("depth readback failed");
        assert_eq!(depth.len(), 160 * 120);
        assert!(depth.iter().all(|&d| (d - 1.0).abs() < 1e-6));
    }

    // --- Test 2: Each ray-marching mode over a multi-segment grid ---
    engine.options.max_segment_bytesize = 16 * 16 * 16;
    let mut helper = engine
        .create_grid_helper::<u16>(UVec3::splat(24))
        .expect("helper creation failed");
    assert!(helper.partitioning().segment_counts().cmpgt(UVec3::ONE).all());
    helper.load_intensities(ball(24)).expect("load failed");
    let root = helper
        .create_node(&engine.texture_factory(), VOLUME_GEOMETRY_TYPE, Spacing(Vec3::ONE))
        .expect("node creation failed");
    engine.frame_volume(Vec3::splat(23.0));

    for mode in [RenderMode::Dvr, RenderMode::Mip, RenderMode::Drr] {
        engine.clear_stages();
        let stage: Box<dyn RenderStage> = match mode {
            RenderMode::Dvr => Box::new(engine.dvr_stage(VOLUME_GEOMETRY_TYPE).expect("dvr stage")),
            RenderMode::Mip => Box::new(engine.mip_stage(VOLUME_GEOMETRY_TYPE).expect("mip stage")),
            RenderMode::Drr => Box::new(engine.drr_stage(VOLUME_GEOMETRY_TYPE).expect("drr stage")),
            RenderMode::Mask => unreachable!(),
        };
        engine.append_stage(stage);
        engine.render_frame(&root).unwrap_or_else(|e| panic!("{mode:?} render failed: {e}"));
        let image = engine.read_color().expect("readback failed");
        assert!(has_nontrivial_content(&image), "{mode:?} should produce non-trivial output");
        assert!(lit_center_pixels(&image) > 0, "{mode:?} should cover the image center");
    }

    // --- Test 3: Mask stage fills, then outlines, the labeled ball ---
    {
        helper.load_mask(ball_mask(24)).expect("mask load failed");
        let masked = helper
            .create_node(&engine.texture_factory(), VOLUME_GEOMETRY_TYPE, Spacing(Vec3::ONE))
            .expect("masked node creation failed");
        assert!(masked.children().iter().all(|c| c
            .geometry()
            .is_some_and(|g| g.feature(Role::Mask).is_some())));

        engine.clear_stages();
        let mask_stage = engine.mask_stage(VOLUME_GEOMETRY_TYPE).expect("mask stage");
        assert_eq!(mask_stage.mode().config, MaskConfig::default());
        engine.append_stage(Box::new(mask_stage));
        engine.render_frame(&masked).expect("mask render failed");
        let filled = green_pixels(&engine.read_color().expect("readback failed"));
        assert!(filled > 0, "filled mask should be drawn in green");

        engine.clear_stages();
        let mut outline_stage = engine.mask_stage(VOLUME_GEOMETRY_TYPE).expect("mask stage");
        outline_stage.mode_mut().set_render_borders(true);
        engine.append_stage(Box::new(outline_stage));
        engine.render_frame(&masked).expect("outline render failed");
        let outlined = green_pixels(&engine.read_color().expect("readback failed"));
        assert!(outlined > 0, "outline should be drawn");
        assert!(outlined < filled, "outline ({outlined}) should cover less than the fill ({filled})");

        // Segments of the earlier node carry no mask and draw nothing
        engine.render_frame(&root).expect("unmasked render failed");
        assert_eq!(green_pixels(&engine.read_color().expect("readback failed")), 0);

        helper.clear_mask();
        assert!(!helper.has_mask());
        assert!(helper.texture_cache().is_empty());
        engine.clear_stages();
    }

    // --- Test 4: Post-process circular mask blacks out the corners ---
    {
        engine.options.post_process = PostProcessConfig::new()
            .with_color_operation(ColorOperation::InvertAllColors)
            .with_circular_mask(true);
        engine.render_frame(&root).expect("post-processed render failed");
        let image = engine.read_color().expect("readback failed");
        let corner = image.get_pixel(0, 0);
        assert_eq!([corner[0], corner[1], corner[2]], [0, 0, 0]);
        engine.options.post_process = PostProcessConfig::default();
    }

    // --- Test 5: Cutting plane writes depth ---
    {
        engine.clear_stages();
        let mut planes = engine
            .cutting_planes_stage(VOLUME_GEOMETRY_TYPE)
            .expect("cutting planes stage");
        planes.add_plane(CuttingPlane::new(Vec3::ZERO, Vec3::Z));
        engine.append_stage(Box::new(planes));
        engine.render_frame(&root).expect("cutting plane render failed");
        let depth = engine.read_depth().expect("depth readback failed");
        assert!(depth.iter().any(|&d| d < 1.0), "cutting plane should write depth");
    }

    // --- Test 6: Render lock ---
    {
        engine.append_stage(Box::new(FailingStage));
        assert!(engine.render_frame(&root).is_err());
        assert_eq!(engine.render_lock(), 1);
        assert!(matches!(engine.render_frame(&root), Err(RenderError::RenderLocked(1))));

        engine.clear_stages();
        assert!(engine.render_frame(&root).is_err(), "still locked until unlock()");
        engine.unlock();
        assert!(!engine.is_locked());
        engine.render_frame(&root).expect("render after unlock failed");
    }

    // --- Test 7: Releasing textures forces fresh uploads ---
    {
        let current = helper
            .create_node(&engine.texture_factory(), VOLUME_GEOMETRY_TYPE, Spacing(Vec3::ONE))
            .expect("node creation failed");
        let before = current.children()[0]
            .geometry()
            .and_then(|g| g.feature(Role::Intensities))
            .cloned()
            .expect("segment texture");
        assert!(helper.release_geometry_features() > 0);
        assert!(helper.texture_cache().is_empty());
        let rebuilt = helper
            .create_node(&engine.texture_factory(), VOLUME_GEOMETRY_TYPE, Spacing(Vec3::ONE))
            .expect("node creation failed");
        let after = rebuilt.children()[0]
            .geometry()
            .and_then(|g| g.feature(Role::Intensities))
            .cloned()
            .expect("segment texture");
        assert!(!std::sync::Arc::ptr_eq(&before, &after));
    }
}

#[test]
fn headless_render_to_image() {
    let source = VolumeSource::new(UVec3::splat(20), Vec3::splat(0.5), ball(20));
    match render_to_image::<u8, _>(source, RenderMode::Mip, &Options::default(), 96, 96) {
        Ok(image) => {
            assert_eq!(image.dimensions(), (96, 96));
            assert!(has_nontrivial_content(&image));
        }
        Err(RenderError::AdapterCreationFailed | RenderError::DeviceCreationFailed(_)) => {
            eprintln!("Skipping headless tests: no GPU adapter available");
        }
        Err(e @ RenderError::UnsupportedTargetFormat { .. }) => {
            eprintln!("Skipping headless tests: {e}");
        }
        Err(e) => panic!("render_to_image failed: {e}"),
    }
}

#[test]
fn headless_render_mask_overlay() {
    let options = Options {
        mask: MaskConfig::new().with_threshold(Huv::WATER.to_intensity()),
        ..Options::default()
    };
    let source = VolumeSource::new(UVec3::splat(20), Vec3::splat(0.5), ball(20));
    match render_to_image::<u16, _>(source, RenderMode::Mask, &options, 96, 96) {
        Ok(image) => assert!(green_pixels(&image) > 0, "mask overlay should be visible"),
        Err(RenderError::AdapterCreationFailed | RenderError::DeviceCreationFailed(_)) => {
            eprintln!("Skipping headless tests: no GPU adapter available");
        }
        Err(e @ RenderError::UnsupportedTargetFormat { .. }) => {
            eprintln!("Skipping headless tests: {e}");
        }
        Err(e) => panic!("mask render_to_image failed: {e}"),
    }
}

//! Headless rendering API for medvol-rs.
//!
//! Renders a scalar volume to an image buffer or file without opening a
//! window. Useful for integration tests, batch processing and automated
//! screenshot generation.

use std::path::Path;

use glam::{UVec3, Vec3};
use medvol_core::{Options, Spacing, Voxel};
use medvol_render::{RenderResult, VolumeEngine, VOLUME_GEOMETRY_TYPE};
use pollster::FutureExt;
use serde::{Deserialize, Serialize};

/// Ray-marching technique used by the headless helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RenderMode {
    /// Direct volume rendering through a color map.
    #[default]
    Dvr,
    /// Maximum intensity projection.
    Mip,
    /// Digital radiograph reconstruction.
    Drr,
    /// Maximum intensity projection overlaid with the voxels that pass the
    /// mask threshold.
    Mask,
}

/// A volume to render: its native resolution, voxel spacing and a data
/// source queried once per voxel.
pub struct VolumeSource<F> {
    pub native_resolution: UVec3,
    pub spacing: Vec3,
    pub data: F,
}

impl<F: FnMut(UVec3) -> f32> VolumeSource<F> {
    pub fn new(native_resolution: UVec3, spacing: Vec3, data: F) -> Self {
        Self {
            native_resolution,
            spacing,
            data,
        }
    }

    /// Physical size between the centers of the outermost voxels.
    pub fn extent(&self) -> Vec3 {
        self.spacing * (self.native_resolution.as_vec3() - Vec3::ONE).max(Vec3::ZERO)
    }
}

/// Renders `source` with `mode` into an RGBA image.
///
/// Creates a headless GPU context, partitions the volume into `V` voxels
/// according to `options`, fits the camera to the volume and renders one
/// frame.
///
/// # Example
/// ```no_run
/// use medvol::*;
///
/// let source = VolumeSource::new(UVec3::splat(32), Vec3::ONE, |c: UVec3| {
///     if c.as_vec3().distance(Vec3::splat(15.5)) < 12.0 { 1.0 } else { 0.0 }
/// });
/// let image = render_to_image::<u8, _>(source, RenderMode::Mip, &Options::default(), 256, 256).unwrap();
/// assert_eq!(image.dimensions(), (256, 256));
/// ```
pub fn render_to_image<V, F>(
    source: VolumeSource<F>,
    mode: RenderMode,
    options: &Options,
    width: u32,
    height: u32,
) -> RenderResult<image::RgbaImage>
where
    V: Voxel,
    F: FnMut(UVec3) -> f32,
{
    let mut engine = VolumeEngine::new_headless(width, height).block_on()?;
    engine.options = options.clone();

    let extent = source.extent();
    let native = source.native_resolution;
    let mut data = source.data;
    let mut helper = engine.create_grid_helper::<V>(native)?;
    if mode == RenderMode::Mask {
        let mask_config = options.mask.clone();
        let mut labels = vec![false; (native.x * native.y * native.z) as usize];
        helper.load_intensities(|c| {
            let intensity = data(c);
            labels[linear_index(native, c)] = mask_config.labels(intensity);
            intensity
        })?;
        helper.load_mask(|c| labels[linear_index(native, c)])?;
    } else {
        helper.load_intensities(data)?;
    }
    let root = helper.create_node(
        &engine.texture_factory(),
        VOLUME_GEOMETRY_TYPE,
        Spacing(source.spacing),
    )?;
    log::debug!(
        "rendering {} segments with {mode:?}",
        helper.grid().len()
    );

    let stage: Box<dyn medvol_render::RenderStage> = match mode {
        RenderMode::Dvr => Box::new(engine.dvr_stage(VOLUME_GEOMETRY_TYPE)?),
        RenderMode::Mip | RenderMode::Mask => Box::new(engine.mip_stage(VOLUME_GEOMETRY_TYPE)?),
        RenderMode::Drr => Box::new(engine.drr_stage(VOLUME_GEOMETRY_TYPE)?),
    };
    engine.append_stage(stage);
    if mode == RenderMode::Mask {
        let mask_stage = engine.mask_stage(VOLUME_GEOMETRY_TYPE)?;
        engine.append_stage(Box::new(mask_stage));
    }
    engine.frame_volume(extent);

    engine.render_frame(&root)?;
    engine.read_color()
}

fn linear_index(size: UVec3, c: UVec3) -> usize {
    (c.x + size.x * (c.y + size.y * c.z)) as usize
}

/// Renders `source` with `mode` and saves the result as PNG or JPEG.
pub fn render_to_file<V, F>(
    path: impl AsRef<Path>,
    source: VolumeSource<F>,
    mode: RenderMode,
    options: &Options,
    width: u32,
    height: u32,
) -> RenderResult<()>
where
    V: Voxel,
    F: FnMut(UVec3) -> f32,
{
    let image = render_to_image::<V, F>(source, mode, options, width, height)?;
    image.save(path.as_ref())?;
    log::info!("saved rendering to {}", path.as_ref().display());
    Ok(())
}

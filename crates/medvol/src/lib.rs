//! medvol-rs: partitioned GPU volume grids rendered by ray marching.
//!
//! A scalar volume, typically a CT scan, is split into segments small enough
//! to live in one 3D texture each. Neighbouring segments duplicate their
//! shared border voxels so that interpolation is seamless across the seams.
//! The segments are then drawn back to front as stacks of camera-facing
//! slices, accumulated by one of three techniques:
//!
//! - **DVR**: direct volume rendering through a color map
//! - **MIP**: maximum intensity projection
//! - **DRR**: digital radiograph reconstruction
//!
//! Binary label maps attached to the segments can be drawn on top, filled
//! or as outlines.
//!
//! # Quick Start
//!
//! ```no_run
//! use medvol::*;
//!
//! fn main() -> RenderResult<()> {
//!     init();
//!
//!     let mut engine = pollster::block_on(VolumeEngine::new_headless(512, 512))?;
//!     let mut helper = engine.create_grid_helper::<u16>(UVec3::new(64, 64, 32))?;
//!     helper.load_hu_data(|c| Huv::new(c.z as i32 * 40 - 1024))?;
//!     let root = helper.create_node(&engine.texture_factory(), VOLUME_GEOMETRY_TYPE, Spacing(Vec3::ONE))?;
//!
//!     let stage = engine.dvr_stage(VOLUME_GEOMETRY_TYPE)?;
//!     engine.append_stage(Box::new(stage));
//!     engine.frame_volume(Vec3::new(63.0, 63.0, 31.0));
//!     engine.render_frame(&root)?;
//!     engine.read_color()?.save("dvr.png")?;
//!     Ok(())
//! }
//! ```

mod headless;
mod init;

pub use headless::{render_to_file, render_to_image, RenderMode, VolumeSource};
pub use init::init;

// Re-export core types
pub use medvol_core::{
    error::{MedvolError, Result},
    BoundingBox, CancelToken, ColorMap, ColorOperation, CuttingPlane, CuttingPlanesConfig, DrrConfig,
    DvrConfig, DvrDrawMode, Extent, Geometry, GridPartitioning, Huv, MaskConfig, MipConfig, Node,
    NodeDimensions, NormalsConfig, Options, Parallelization, PostProcessConfig, RenderOrder, RenderQueue, Role,
    Segment, Spacing, TextureCache, TextureFactory, VolumeGrid, VolumeGridHelper, VolumeTexture, Voxel,
    DEFAULT_MAX_SEGMENT_BYTESIZE, DEFAULT_SAMPLE_RATE,
};
pub use medvol_core::{resample::resample, IntensityVolume, NormalMap, Progress};
pub use medvol_core::{Mat4, UVec3, Vec2, Vec3, Vec4};

// Re-export render types
pub use medvol_render::{
    Camera, CuttingPlanesStage, DrrMode, DvrMode, FrameContext, GpuTextureFactory, GpuVolumeGridHelper,
    ManagedTexture3D, MaskMode, MipMode, ProjectionMode, RayMarchingMode, RayMarchingStage, RenderError,
    RenderResult, RenderStage, SceneNode, VolumeEngine, VOLUME_GEOMETRY_TYPE,
};

// Stages are written against this wgpu version
pub use wgpu;

//! Rendering backend for medvol-rs.
//!
//! This crate provides the wgpu-based volume renderer, including:
//! - 3D texture upload of volume segments ([`GpuTextureFactory`])
//! - Slice-based ray marching with DVR, MIP and DRR modes
//! - Cutting planes through the volume
//! - Post-processing of the composited image
//! - A headless engine with pixel readback and a render lock

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// wgpu descriptors are filled with Default::default()
#![allow(clippy::default_trait_access)]
// Pass constructors are long by nature of wgpu descriptors
#![allow(clippy::too_many_lines)]

pub mod buffer;
pub mod camera;
pub mod color_map;
pub mod cutting_planes;
pub mod engine;
pub mod error;
pub mod framebuffer;
pub mod post_process;
pub mod ray_marching;
pub mod shader;
pub mod slice_mesh;
pub mod stage;
pub mod texture3d;

pub use camera::{Camera, ProjectionMode};
pub use color_map::ColorMapTexture;
pub use cutting_planes::{CuttingPlanesStage, PlaneUniforms};
pub use engine::{GpuVolumeGridHelper, VolumeEngine};
pub use error::{RenderError, RenderResult};
pub use framebuffer::{Framebuffer, RenderTarget};
pub use post_process::{PostProcessPass, PostProcessUniforms};
pub use ray_marching::{
    DrrMode, DrrUniforms, DvrMode, DvrUniforms, MaskMode, MaskUniforms, MipMode, MipUniforms, RayMarchingMode,
    RayMarchingStage, SegmentTransforms, SegmentUniforms,
};
pub use shader::{ShaderBuilder, ShaderCapabilities, VolumeBinding};
pub use slice_mesh::{SliceMeshBuffers, SliceMeshCache};
pub use stage::{FrameContext, RenderStage, SceneNode, VOLUME_GEOMETRY_TYPE};
pub use texture3d::{GpuTextureFactory, ManagedTexture3D};

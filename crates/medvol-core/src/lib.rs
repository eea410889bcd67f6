//! Core data model for medvol-rs.
//!
//! This crate holds everything that does not touch the GPU:
//! - [`GridPartitioning`] and [`VolumeGrid`] for splitting a volume into
//!   segments with duplicated border voxels
//! - [`VolumeGridHelper`] for loading data and building scene nodes
//! - [`TextureFactory`] and [`TextureCache`] describing the backend boundary
//! - [`RenderQueue`] for back-to-front ordering of segments
//! - Color maps, render mode parameters and post-process configuration

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Voxel coordinates are u32 and buffers are indexed with usize
#![allow(clippy::cast_possible_truncation)]
// Options structs legitimately have many boolean flags
#![allow(clippy::struct_excessive_bools)]

pub mod color_map;
pub mod cutting_plane;
pub mod error;
pub mod grid;
pub mod helper;
pub mod huv;
pub mod math;
pub mod modes;
pub mod normals;
pub mod options;
pub mod parallel;
pub mod partitioning;
pub mod post_process;
pub mod render_queue;
pub mod resample;
pub mod scene;
pub mod segment;
pub mod slice_mesh;
pub mod texture;
pub mod volume;

pub use color_map::{ColorMap, Rgba8};
pub use cutting_plane::CuttingPlane;
pub use error::{MedvolError, Result};
pub use grid::VolumeGrid;
pub use helper::{Extent, NodeDimensions, Spacing, VolumeGridHelper};
pub use huv::Huv;
pub use modes::{CuttingPlanesConfig, DrrConfig, DvrConfig, DvrDrawMode, MaskConfig, MipConfig};
pub use normals::NormalsConfig;
pub use options::Options;
pub use parallel::{CancelToken, Parallelization, Progress};
pub use partitioning::{GridPartitioning, Partitioning, DEFAULT_MAX_SEGMENT_BYTESIZE};
pub use post_process::{ColorOperation, PostProcessConfig};
pub use render_queue::{RenderOrder, RenderQueue, Renderable};
pub use scene::{BoundingBox, Geometry, Node};
pub use segment::Segment;
pub use slice_mesh::{SliceMesh, DEFAULT_SAMPLE_RATE};
pub use texture::{Role, TextureCache, TextureFactory, VolumeTexture};
pub use volume::{IntensityVolume, NormalMap, Voxel};

// Re-export glam types for convenience
pub use glam::{Mat4, UVec3, Vec2, Vec3, Vec4};

//! Error types for medvol-rs.

use thiserror::Error;

/// The main error type for medvol-core operations.
#[derive(Error, Debug)]
pub enum MedvolError {
    /// A resolution, segment size or segment count has a zero component.
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// A segment or voxel index lies outside the grid.
    #[error("index {index:?} out of range for {bounds:?}")]
    IndexOutOfRange { index: [u32; 3], bounds: [u32; 3] },

    /// The byte budget cannot hold even a two-voxel segment.
    #[error("segment budget of {budget} bytes is too small for {voxel_bytes}-byte voxels")]
    SegmentBudgetTooSmall { budget: usize, voxel_bytes: usize },

    /// `create_node` was called before any intensities were loaded.
    #[error("no intensity data loaded - call load_intensities() first")]
    NoDataLoaded,

    /// A texture could not be created for a segment.
    #[error("texture creation failed: {0}")]
    TextureCreation(String),

    /// The ray-marching sample rate must be at least two slices.
    #[error("invalid sample rate {0}, at least 2 slices are required")]
    InvalidSampleRate(u32),

    /// Data size mismatch.
    #[error("data size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// The worker pool could not be created.
    #[error("worker pool error: {0}")]
    WorkerPool(String),

    /// A parallel job was cancelled before completion.
    #[error("operation cancelled")]
    Cancelled,

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A specialized Result type for medvol-core operations.
pub type Result<T> = std::result::Result<T, MedvolError>;

//! Rendering error types.

use medvol_core::MedvolError;
use thiserror::Error;

/// Errors that can occur during rendering operations.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Failed to create wgpu adapter.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// Failed to create wgpu device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// Shader source could not be assembled.
    #[error("shader compilation failed: {0}")]
    ShaderCompilationFailed(String),

    /// A texture exceeds the device limits.
    #[error("texture of {requested} texels exceeds the device limit of {limit}")]
    TextureTooLarge { requested: u32, limit: u32 },

    /// The adapter cannot use a render target format the way the engine needs.
    #[error("texture format {format:?} is not supported as a {requirement} on this adapter")]
    UnsupportedTargetFormat {
        format: wgpu::TextureFormat,
        requirement: &'static str,
    },

    /// Mapping a readback buffer failed.
    #[error("failed to map readback buffer")]
    BufferMapFailed,

    /// The device reported a validation or out-of-memory error.
    #[error("GPU error: {0}")]
    Device(String),

    /// Encoding or writing an image failed.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Rendering is suspended after a failed frame.
    #[error("rendering is locked after {0} failed frame(s)")]
    RenderLocked(u32),

    /// Data model error.
    #[error(transparent)]
    Core(#[from] MedvolError),
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;

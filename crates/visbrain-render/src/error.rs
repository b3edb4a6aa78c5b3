//! Rendering error types.

use thiserror::Error;

use crate::screenshot::ScreenshotError;

/// Errors that can occur during rendering operations.
#[derive(Error, Debug)]
pub enum RenderError {
    /// No graphics adapter is available.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// The adapter refused to create a device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// Reading the frame back from the GPU failed.
    #[error("failed to map the read back buffer")]
    BufferMapFailed,

    /// The backend cannot allocate a canvas of the requested size.
    #[error("canvas cannot be resized to {width}x{height} (maximum side {max})")]
    ResizeRefused { width: u32, height: u32, max: u32 },

    /// A viewport does not fit inside the canvas.
    #[error("viewport {0:?} is outside of the canvas")]
    InvalidViewport((u32, u32, u32, u32)),

    /// Writing or encoding the frame failed.
    #[error(transparent)]
    Screenshot(#[from] ScreenshotError),
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;

impl From<RenderError> for visbrain_core::VisbrainError {
    fn from(err: RenderError) -> Self {
        Self::RenderError(err.to_string())
    }
}

//! Rendering backend for visbrain-rs.
//!
//! This crate provides:
//! - The turntable [`Camera`] every subplot looks through
//! - An offscreen wgpu [`GpuCanvas`] and a CPU [`SoftwareCanvas`], both
//!   implementing the core `RenderContext`
//! - Screenshot sizing, cropping and encoding

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod camera;
pub mod canvas;
pub mod error;
pub mod font;
pub mod gpu;
pub mod screenshot;

pub use camera::{Camera, CameraState};
pub use canvas::{CanvasBackend, CanvasPass, SoftwareCanvas, Viewport};
pub use error::{RenderError, RenderResult};
pub use gpu::{default_backend, GpuCanvas};
pub use screenshot::{autocrop, crop_region, save_image, save_to_buffer, target_size, ScreenshotError, SizeRequest, Unit};

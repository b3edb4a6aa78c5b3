//! visbrain-rs: a Rust-native visualization core for brain data.
//!
//! Brain surfaces, sources, connectivity, regions of interest, volumes and
//! their colorbars are composed into a grid of subplots and rendered to
//! images without a display.
//!
//! # Quick Start
//!
//! ```no_run
//! use visbrain::*;
//!
//! fn main() -> Result<()> {
//!     init_logging();
//!
//!     let brain = BrainObj::new("brain", "sphere")?;
//!     let sources = SourceObj::new("s", vec![Vec3::new(-30.0, 0.0, 20.0)])?;
//!     let cbar = ColorbarObj::from_object("cbar", &brain)?;
//!
//!     let mut scene = SceneObj::new(SceneOptions::default());
//!     scene.add_to_subplot(brain, 0, 0, &SubplotOptions::default().with_title("Brain"))?;
//!     scene.add_to_subplot(sources, 0, 0, &SubplotOptions::default())?;
//!     scene.add_to_subplot(cbar, 0, 1, &SubplotOptions::default())?;
//!     scene.screenshot(std::path::Path::new("brain.png"), &ScreenshotOptions::default())?;
//!     Ok(())
//! }
//! ```
//!
//! # Objects
//!
//! - [`BrainObj`] - A triangulated cortical surface with activations
//! - [`SourceObj`] - Point sources, projected onto surfaces or looked up in atlases
//! - [`ConnectObj`] - Weighted connectivity between nodes
//! - [`RoiObj`], [`VolumeObj`], [`CrossSecObj`] - Labeled and scalar volumes
//! - [`VectorObj`], [`PictureObj`], [`TimeSeriesObj`] - Per-source glyphs
//! - [`ColorbarObj`] - A colorbar mirroring any object's color state

pub mod scene;

// Re-export core types
pub use visbrain_core::{
    array_to_colormap, colormap_to_glsl, parse_color, Axis, Cmap, ColorMap, ColorMapRegistry, ColorState,
    ColorbarConfig, Combiner, CoordinateSystem, Lut, Monitor, NodeId, Projection, Result, Rotation, SceneOptions,
    SharedColorState, TriMesh, ViewPreset, VisbrainError, VisbrainObject, Volume, DEFAULT_LUT_LEN,
};
pub use visbrain_core::{Mat4, Vec2, Vec3, Vec4};

// Re-export render types
pub use visbrain_render::{Camera, CameraState, CanvasBackend, GpuCanvas, SizeRequest, SoftwareCanvas, Unit, Viewport};

// Re-export objects
pub use visbrain_objects::{
    project_sources, BrainObj, ColorbarObj, ConnectObj, CrossSecObj, Hemisphere, PictureObj, ProjectOptions,
    ProjectionKind, RoiObj, SourceObj, TimeSeriesObj, VectorObj, VolumeObj,
};

pub use scene::{HeadlessHost, Link, PreviewHost, SceneObj, ScreenshotOptions, SubScene, SubplotOptions};

/// Installs the `env_logger` backend. `RUST_LOG` sets the verbosity.
/// Calling it more than once is harmless.
pub fn init_logging() {
    let _ = env_logger::try_init();
}

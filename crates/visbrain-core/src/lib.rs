//! Core abstractions for visbrain-rs.
//!
//! This crate provides the pieces every visualization object is built from:
//! - The color engine ([`array_to_colormap`], [`colormap_to_glsl`]) and the
//!   shared [`ColorState`] colorbars mirror
//! - The [`VisbrainObject`] trait, the [`Primitive`]s objects emit and the
//!   [`Combiner`] collection
//! - Mesh, volume and spatial-index utilities, affine and Talairach
//!   transforms, marching-cubes isosurfaces
//! - Progress/cancellation monitors and configuration

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Colorbar option names are fixed by the configuration format
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::module_name_repetitions)]

pub mod color;
pub mod color_engine;
pub mod color_state;
pub mod colormap;
pub mod combiner;
pub mod error;
pub mod isosurface;
pub mod mesh;
pub mod object;
pub mod options;
pub mod primitive;
pub mod progress;
pub mod spatial;
pub mod transform;
pub mod view;
pub mod volume;

pub use color::parse_color;
pub use color_engine::{
    array_to_colormap, colormap_to_glsl, dynamic_color, vector_to_opacity, Lut, Orientation, DEFAULT_LUT_LEN,
};
pub use color_state::{Cmap, ColorState, SharedColorState, Translucent};
pub use colormap::{ColorMap, ColorMapRegistry};
pub use combiner::{Combiner, ObjectKey};
pub use error::{Result, VisbrainError};
pub use isosurface::marching_cubes;
pub use mesh::TriMesh;
pub use object::{downcast_mut, downcast_ref, NodeId, ObjectNode, VisbrainObject};
pub use options::{data_dir, ColorbarConfig, SceneOptions};
pub use primitive::{Primitive, RecordingContext, RenderContext};
pub use progress::{Monitor, ProgressSink};
pub use spatial::PointIndex;
pub use transform::CoordinateSystem;
pub use view::{Projection, Rotation, ViewPreset};
pub use volume::{Axis, LabelTable, Volume};

// Re-export glam types for convenience
pub use glam::{Mat4, Vec2, Vec3, Vec4};

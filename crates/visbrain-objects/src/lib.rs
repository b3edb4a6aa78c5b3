//! Visualization objects for visbrain-rs.
//!
//! This crate provides the concrete objects a scene is composed of:
//! - Brain surfaces with activations and projection overlays
//! - Sources with visibility selection, projection and ROI analysis
//! - Connectivity networks, vectors, pictures and time-series
//! - ROIs, volumes and cross-sections from labeled atlases
//! - Colorbars mirroring any object's color state

// Graphics code intentionally uses casts for indices, colors, and coordinates
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod analysis;
pub mod brain;
pub mod colorbar;
pub mod connect;
pub mod cross_sec;
pub mod picture;
pub mod roi;
pub mod source;
pub mod templates;
pub mod time_series;
pub mod vector;
pub mod volume;

pub use analysis::{AnalysisTable, NOT_FOUND, NO_LABEL};
pub use brain::{Activation, BrainObj, Hemisphere};
pub use colorbar::{ColorbarObj, ColorbarState};
pub use connect::{ConnectColorBy, ConnectObj, CustomEdgeColors, DynamicAlpha, Edge};
pub use cross_sec::{CrossSecObj, Plane};
pub use picture::{Picture, PictureObj};
pub use roi::{LocalizeOptions, RoiColor, RoiObj, SelectOptions};
pub use source::{
    project_sources, AnalysisOptions, ColorBy, KeepOnly, ProjectOptions, ProjectionKind, ProjectionResult,
    ProjectionStatus, SourceObj, SourceSelect, VisibleOptions,
};
pub use templates::{available_atlases, available_surfaces, RoiTemplate, SurfaceTemplate, DEMO_ATLAS, SPHERE_TEMPLATE};
pub use time_series::TimeSeriesObj;
pub use vector::{ArrowHead, VectorObj};
pub use volume::VolumeObj;

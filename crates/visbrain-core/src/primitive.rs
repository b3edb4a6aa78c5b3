//! Drawable primitives emitted by objects.
//!
//! Objects do not talk to a graphics API. They describe themselves as a
//! list of [`Primitive`]s submitted to a [`RenderContext`]; the render crate
//! implements the context on top of its canvas.

use std::borrow::Cow;

use glam::{Mat4, Vec3, Vec4};

/// Something a canvas knows how to draw.
#[derive(Debug, Clone)]
pub enum Primitive<'a> {
    /// An indexed triangle mesh with per-vertex colors.
    Mesh {
        vertices: Cow<'a, [Vec3]>,
        normals: Cow<'a, [Vec3]>,
        faces: Cow<'a, [[u32; 3]]>,
        colors: Cow<'a, [Vec4]>,
    },
    /// Disk markers with a world-space radius.
    Markers {
        positions: Cow<'a, [Vec3]>,
        colors: Cow<'a, [Vec4]>,
        radii: Cow<'a, [f32]>,
        edge_color: Option<Vec4>,
    },
    /// Line segments between positions, with per-position colors.
    Lines {
        positions: Cow<'a, [Vec3]>,
        colors: Cow<'a, [Vec4]>,
        segments: Cow<'a, [[u32; 2]]>,
        width: f32,
    },
    /// A textured quad: `origin + u * i / width + v * j / height`.
    Image {
        origin: Vec3,
        u_axis: Vec3,
        v_axis: Vec3,
        width: u32,
        height: u32,
        pixels: Cow<'a, [Vec4]>,
    },
    /// A text label anchored at a 3-D position.
    Text {
        position: Vec3,
        text: Cow<'a, str>,
        color: Vec4,
        size: f32,
        bold: bool,
    },
}

impl Primitive<'_> {
    /// Short tag used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Mesh { .. } => "mesh",
            Self::Markers { .. } => "markers",
            Self::Lines { .. } => "lines",
            Self::Image { .. } => "image",
            Self::Text { .. } => "text",
        }
    }
}

/// Sink for primitives. Implemented by the render crate.
pub trait RenderContext {
    /// Draws `primitive` after applying the object transform `model`.
    fn submit(&mut self, primitive: Primitive<'_>, model: Mat4);
}

/// A context that records the primitive kinds it receives. Useful for tests
/// and for counting what an object would draw.
#[derive(Debug, Default)]
pub struct RecordingContext {
    pub submitted: Vec<(&'static str, Mat4)>,
}

impl RenderContext for RecordingContext {
    fn submit(&mut self, primitive: Primitive<'_>, model: Mat4) {
        self.submitted.push((primitive.kind(), model));
    }
}

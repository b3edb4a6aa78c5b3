//! Brain surface object.
//!
//! A [`BrainObj`] owns a triangulated surface with optional hemisphere
//! labels. Scalar activations are painted on top of a grey base color, and
//! a source projection can be displayed as a separate overlay colored with
//! the sources' own color state.

use std::borrow::Cow;
use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use glam::{Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};
use visbrain_core::mesh::neighborhood;
use visbrain_core::{
    array_to_colormap, ColorState, ObjectNode, Primitive, RenderContext, Result, Rotation, SharedColorState, TriMesh,
    ViewPreset, VisbrainError, VisbrainObject,
};

use crate::templates::SurfaceTemplate;

/// Default surface color.
pub const BRAIN_COLOR: Vec4 = Vec4::new(0.8, 0.8, 0.8, 1.0);
/// Base alpha of a translucent brain.
pub const TRANSLUCENT_ALPHA: f32 = 0.1;

/// Which hemispheres are displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hemisphere {
    #[default]
    Both,
    Left,
    Right,
}

impl Hemisphere {
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "both" => Ok(Self::Both),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(VisbrainError::invalid(format!(
                "unknown hemisphere '{other}', use both, left or right"
            ))),
        }
    }

    /// Whether a vertex on the given side is shown.
    pub fn shows(self, is_left: bool) -> bool {
        match self {
            Self::Both => true,
            Self::Left => is_left,
            Self::Right => !is_left,
        }
    }
}

/// Data for [`BrainObj::add_activation`].
#[derive(Debug, Clone, Copy)]
pub enum Activation<'a> {
    /// `data[i]` is painted on every vertex within `smoothing_steps` edges
    /// of `vertices[i]`. When two seeds reach the same vertex the later one
    /// wins.
    Seeds {
        data: &'a [f32],
        vertices: &'a [u32],
        smoothing_steps: usize,
    },
    /// One value per vertex, NaN for unpainted vertices.
    PerVertex(&'a [f32]),
}

/// A projection overlay: one value per vertex (NaN when unpainted) colored
/// through a borrowed color state.
#[derive(Debug, Clone)]
struct Overlay {
    values: Vec<f32>,
    color: SharedColorState,
}

/// A brain surface.
pub struct BrainObj {
    node: ObjectNode,
    template: String,
    mesh: TriMesh,
    lr_index: Option<Vec<bool>>,
    hemisphere: Hemisphere,
    base_color: Vec4,
    translucent: bool,
    activation: Option<Vec<f32>>,
    projection: Option<Overlay>,
    color: SharedColorState,
    rotation: Rotation,
    scale: f32,
    adjacency: OnceCell<Vec<Vec<u32>>>,
}

impl BrainObj {
    /// Creates a brain from a named template. Unreadable templates fall back
    /// to the built-in sphere with a warning.
    pub fn new(name: impl Into<String>, template: &str) -> Result<Self> {
        let mut brain = Self::from_template(name, &SurfaceTemplate::load_or_sphere(template))?;
        brain.template = template.to_string();
        Ok(brain)
    }

    /// Creates a brain from caller-supplied arrays.
    pub fn from_template(name: impl Into<String>, template: &SurfaceTemplate) -> Result<Self> {
        let mut brain = Self {
            node: ObjectNode::new(name)?,
            template: String::from("custom"),
            mesh: TriMesh::default(),
            lr_index: None,
            hemisphere: Hemisphere::Both,
            base_color: BRAIN_COLOR,
            translucent: false,
            activation: None,
            projection: None,
            color: ColorState::named("viridis").into_shared(),
            rotation: Rotation::Top,
            scale: 1.0,
            adjacency: OnceCell::new(),
        };
        brain.set_data(template, false)?;
        Ok(brain)
    }

    /// Replaces the surface. Faces are rebased to 0, missing normals are
    /// computed and optionally inverted. Activations and overlays are dropped.
    pub fn set_data(&mut self, template: &SurfaceTemplate, invert_normals: bool) -> Result<()> {
        let mut mesh = template.to_mesh()?;
        if let Some(lr) = &template.lr_index {
            if lr.len() != mesh.n_vertices() {
                return Err(VisbrainError::SizeMismatch {
                    expected: mesh.n_vertices(),
                    actual: lr.len(),
                });
            }
        }
        if invert_normals {
            mesh.invert_normals();
        }
        log::debug!(
            "brain '{}' set to {} vertices / {} faces",
            self.node.name(),
            mesh.n_vertices(),
            mesh.n_faces()
        );
        self.mesh = mesh;
        self.lr_index.clone_from(&template.lr_index);
        self.activation = None;
        self.projection = None;
        self.adjacency = OnceCell::new();
        Ok(())
    }

    /// Loads another template by name, falling back to the sphere.
    pub fn set_template(&mut self, template: &str) -> Result<()> {
        self.set_data(&SurfaceTemplate::load_or_sphere(template), false)?;
        self.template = template.to_string();
        Ok(())
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn mesh(&self) -> &TriMesh {
        &self.mesh
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.mesh.vertices
    }

    pub fn faces(&self) -> &[[u32; 3]] {
        &self.mesh.faces
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.mesh.normals
    }

    pub fn n_vertices(&self) -> usize {
        self.mesh.n_vertices()
    }

    /// Per-vertex hemisphere labels, `true` on the left.
    pub fn lr_index(&self) -> Option<&[bool]> {
        self.lr_index.as_deref()
    }

    /// Sets the hemisphere labels.
    pub fn set_lr_index(&mut self, lr_index: Option<Vec<bool>>) -> Result<()> {
        if let Some(lr) = &lr_index {
            visbrain_core::error::check_len(self.mesh.n_vertices(), lr.len())?;
        }
        self.lr_index = lr_index;
        Ok(())
    }

    /// Hemisphere labels, or a split at the center of the bounding box
    /// when none were given.
    pub fn effective_lr_index(&self) -> Vec<bool> {
        if let Some(lr) = &self.lr_index {
            return lr.clone();
        }
        let center = self.mesh.bounding_box().map_or(0.0, |(min, max)| (min.x + max.x) * 0.5);
        self.mesh.vertices.iter().map(|v| v.x <= center).collect()
    }

    pub fn hemisphere(&self) -> Hemisphere {
        self.hemisphere
    }

    /// Shows one hemisphere. Vertices of the other side become fully
    /// transparent but stay in the mesh.
    pub fn set_hemisphere(&mut self, hemisphere: Hemisphere) {
        if hemisphere != Hemisphere::Both && self.lr_index.is_none() {
            log::debug!("brain '{}' has no lr_index, splitting at the bounding box center", self.node.name());
        }
        self.hemisphere = hemisphere;
    }

    /// Per-vertex visibility under the current hemisphere.
    pub fn visible_vertices(&self) -> Vec<bool> {
        if self.hemisphere == Hemisphere::Both {
            return vec![true; self.mesh.n_vertices()];
        }
        self.effective_lr_index()
            .into_iter()
            .map(|left| self.hemisphere.shows(left))
            .collect()
    }

    pub fn translucent(&self) -> bool {
        self.translucent
    }

    pub fn set_translucent(&mut self, translucent: bool) {
        self.translucent = translucent;
    }

    pub fn base_color(&self) -> Vec4 {
        self.base_color
    }

    pub fn set_base_color(&mut self, color: Vec4) {
        self.base_color = color;
    }

    /// The color state used for activations.
    pub fn activation_color(&self) -> &SharedColorState {
        &self.color
    }

    /// Paints scalar data on the surface with the brain's color state.
    /// `hemisphere` restricts painting to one side.
    pub fn add_activation(&mut self, activation: Activation<'_>, hemisphere: Option<Hemisphere>) -> Result<()> {
        let n = self.mesh.n_vertices();
        let mut values = vec![f32::NAN; n];
        match activation {
            Activation::Seeds {
                data,
                vertices,
                smoothing_steps,
            } => {
                visbrain_core::error::check_len(vertices.len(), data.len())?;
                if let Some(&bad) = vertices.iter().find(|&&v| v as usize >= n) {
                    return Err(VisbrainError::IndexOutOfRange {
                        index: bad as usize,
                        len: n,
                    });
                }
                let adjacency = self.adjacency.get_or_init(|| self.mesh.adjacency());
                for (&seed, &value) in vertices.iter().zip(data) {
                    for v in neighborhood(adjacency, seed, smoothing_steps) {
                        values[v as usize] = value;
                    }
                }
            }
            Activation::PerVertex(data) => {
                visbrain_core::error::check_len(n, data.len())?;
                values.copy_from_slice(data);
            }
        }
        if let Some(side) = hemisphere.filter(|h| *h != Hemisphere::Both) {
            for (value, left) in values.iter_mut().zip(self.effective_lr_index()) {
                if !side.shows(left) {
                    *value = f32::NAN;
                }
            }
        }
        let painted = values.iter().filter(|v| !v.is_nan()).count();
        log::debug!("brain '{}': activation painted on {painted} vertices", self.node.name());
        self.color.borrow_mut().set_data_range(&values);
        self.activation = Some(values);
        Ok(())
    }

    /// Per-vertex activation values (NaN where unpainted).
    pub fn activation(&self) -> Option<&[f32]> {
        self.activation.as_deref()
    }

    /// Displays projected source values colored with `color`.
    pub fn set_projection_overlay(&mut self, values: Vec<f32>, color: SharedColorState) -> Result<()> {
        visbrain_core::error::check_len(self.mesh.n_vertices(), values.len())?;
        self.projection = Some(Overlay { values, color });
        Ok(())
    }

    /// Projected values currently displayed.
    pub fn projection_overlay(&self) -> Option<&[f32]> {
        self.projection.as_ref().map(|o| o.values.as_slice())
    }

    /// Restores the plain grey surface: drops activations and overlays.
    pub fn clean(&mut self) {
        self.activation = None;
        self.color.borrow_mut().set_data_range(&[]);
        self.projection = None;
        self.base_color = BRAIN_COLOR;
        self.translucent = false;
    }

    /// Final RGBA of every vertex: base color, then the projection overlay,
    /// then activations, then the hemisphere mask.
    pub fn vertex_colors(&self) -> Vec<Vec4> {
        let mut base = self.base_color;
        if self.translucent {
            base.w = base.w.min(TRANSLUCENT_ALPHA);
        }
        let mut colors = vec![base; self.mesh.n_vertices()];
        if let Some(overlay) = &self.projection {
            paint(&mut colors, &overlay.values, &overlay.color.borrow());
        }
        if let Some(values) = &self.activation {
            paint(&mut colors, values, &self.color.borrow());
        }
        if self.hemisphere != Hemisphere::Both {
            for (color, shown) in colors.iter_mut().zip(self.visible_vertices()) {
                if !shown {
                    color.w = 0.0;
                }
            }
        }
        colors
    }

    /// Turns the preferred camera.
    pub fn rotate(&mut self, rotation: Rotation) {
        self.rotation = rotation;
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Scale compensating for tiny meshes, used by the scene.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: f32) -> Result<()> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(VisbrainError::invalid(format!("scale must be > 0, got {scale}")));
        }
        self.scale = scale;
        Ok(())
    }

    /// Saves the surface as a template under `name`.
    pub fn save_template(&self, name: &str) -> Result<PathBuf> {
        SurfaceTemplate::from_mesh(&self.mesh, self.lr_index.clone()).save(name)
    }

    /// Saves the surface as a template file.
    pub fn save_template_to(&self, path: &Path) -> Result<()> {
        SurfaceTemplate::from_mesh(&self.mesh, self.lr_index.clone()).save_to(path)
    }
}

fn paint(colors: &mut [Vec4], values: &[f32], state: &ColorState) {
    for ((color, value), mapped) in colors.iter_mut().zip(values).zip(array_to_colormap(values, state)) {
        if !value.is_nan() {
            *color = mapped;
        }
    }
}

impl VisbrainObject for BrainObj {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn node(&self) -> &ObjectNode {
        &self.node
    }

    fn node_mut(&mut self) -> &mut ObjectNode {
        &mut self.node
    }

    fn type_name(&self) -> &'static str {
        "BrainObj"
    }

    fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        self.mesh.bounding_box()
    }

    fn render(&self, ctx: &mut dyn RenderContext) {
        if !self.visible_obj() || self.mesh.is_empty() {
            return;
        }
        let model = self.transform() * Mat4::from_scale(Vec3::splat(self.scale));
        ctx.submit(
            Primitive::Mesh {
                vertices: Cow::Borrowed(&self.mesh.vertices),
                normals: Cow::Borrowed(&self.mesh.normals),
                faces: Cow::Borrowed(&self.mesh.faces),
                colors: Cow::Owned(self.vertex_colors()),
            },
            model,
        );
    }

    fn preferred_view(&self) -> ViewPreset {
        ViewPreset::default().rotated(self.rotation)
    }

    fn color_state(&self) -> Option<SharedColorState> {
        Some(self.color.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use visbrain_core::RecordingContext;

    fn strip() -> SurfaceTemplate {
        // A row of 4 vertices along x: two on the left, two on the right.
        SurfaceTemplate {
            vertices: vec![
                Vec3::new(-2.0, 0.0, 0.0),
                Vec3::new(-1.0, 1.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(2.0, 1.0, 0.0),
            ],
            faces: vec![[0, 1, 2], [1, 3, 2]],
            normals: None,
            lr_index: Some(vec![true, true, false, false]),
        }
    }

    #[test]
    fn test_hemisphere_mask() {
        let mut brain = BrainObj::from_template("b", &strip()).unwrap();
        let before = brain.vertex_colors();
        brain.set_hemisphere(Hemisphere::Left);
        let after = brain.vertex_colors();
        for (i, left) in [true, true, false, false].into_iter().enumerate() {
            if left {
                assert_eq!(after[i].w, before[i].w);
            } else {
                assert_eq!(after[i].w, 0.0);
            }
        }
        // Vertices are hidden, never deleted.
        assert_eq!(brain.n_vertices(), 4);
    }

    #[test]
    fn test_lr_index_length_checked() {
        let mut template = strip();
        template.lr_index = Some(vec![true]);
        assert!(matches!(
            BrainObj::from_template("b", &template),
            Err(VisbrainError::SizeMismatch { expected: 4, actual: 1 })
        ));
    }

    #[test]
    fn test_faces_rebased() {
        let mut template = strip();
        template.faces = vec![[1, 2, 3], [2, 4, 3]];
        let brain = BrainObj::from_template("b", &template).unwrap();
        assert_eq!(brain.faces()[0], [0, 1, 2]);
    }

    #[test]
    fn test_activation_last_seed_wins() {
        let mut brain = BrainObj::from_template("b", &strip()).unwrap();
        brain
            .add_activation(
                Activation::Seeds {
                    data: &[1.0, 5.0],
                    vertices: &[0, 3],
                    smoothing_steps: 1,
                },
                None,
            )
            .unwrap();
        let values = brain.activation().unwrap();
        assert_eq!(values[0], 1.0);
        // Vertices 1 and 2 are neighbors of both seeds.
        assert_eq!(values[1], 5.0);
        assert_eq!(values[2], 5.0);
        assert_eq!(values[3], 5.0);
    }

    #[test]
    fn test_activation_hemisphere_and_errors() {
        let mut brain = BrainObj::from_template("b", &strip()).unwrap();
        brain
            .add_activation(Activation::PerVertex(&[1.0, 2.0, 3.0, 4.0]), Some(Hemisphere::Right))
            .unwrap();
        let values = brain.activation().unwrap();
        assert!(values[0].is_nan() && values[1].is_nan());
        assert_eq!(values[3], 4.0);

        let seeds = Activation::Seeds {
            data: &[1.0],
            vertices: &[9],
            smoothing_steps: 0,
        };
        assert!(matches!(
            brain.add_activation(seeds, None),
            Err(VisbrainError::IndexOutOfRange { index: 9, len: 4 })
        ));
        assert!(brain.add_activation(Activation::PerVertex(&[1.0]), None).is_err());
    }

    #[test]
    fn test_clean_restores_grey() {
        let mut brain = BrainObj::from_template("b", &strip()).unwrap();
        brain.add_activation(Activation::PerVertex(&[0.0, 1.0, 2.0, 3.0]), None).unwrap();
        assert_ne!(brain.vertex_colors()[3], BRAIN_COLOR);
        brain.clean();
        assert!(brain.vertex_colors().iter().all(|c| *c == BRAIN_COLOR));
    }

    #[test]
    fn test_translucent_and_render() {
        let mut brain = BrainObj::new("b", "sphere").unwrap();
        brain.set_translucent(true);
        assert!(brain.vertex_colors().iter().all(|c| c.w <= TRANSLUCENT_ALPHA));
        brain.set_scale(2.0).unwrap();
        let mut ctx = RecordingContext::default();
        brain.render(&mut ctx);
        assert_eq!(ctx.submitted.len(), 1);
        assert_eq!(ctx.submitted[0].1, Mat4::from_scale(Vec3::splat(2.0)));
        assert!(brain.set_scale(0.0).is_err());
    }

    #[test]
    fn test_missing_template_falls_back() {
        let brain = BrainObj::new("b", "definitely-not-a-template").unwrap();
        assert_eq!(brain.n_vertices(), SurfaceTemplate::sphere().vertices.len());
    }

    #[test]
    fn test_rotate_changes_preferred_view() {
        let mut brain = BrainObj::new("b", "sphere").unwrap();
        brain.rotate(Rotation::Left);
        let view = brain.preferred_view();
        assert_eq!((view.azimuth, view.elevation), Rotation::Left.angles());
    }
}

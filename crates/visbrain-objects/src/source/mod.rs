//! Source object: a cloud of point sources.
//!
//! Each source has a position, an optional scalar, independent `visible`
//! and `mask` flags and an optional text label. Displayed sources are drawn
//! as markers whose radius follows the data; masked ones take the mask
//! color.

mod analysis;
mod projection;

use std::borrow::Cow;

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};
use visbrain_core::error::check_len;
use visbrain_core::mesh::bounding_box;
use visbrain_core::{
    ColorState, CoordinateSystem, ObjectNode, PointIndex, Primitive, RenderContext, Result, SharedColorState, TriMesh,
    VisbrainError, VisbrainObject,
};

pub use analysis::{AnalysisOptions, ColorBy, KeepOnly};
pub use projection::{project_sources, ProjectOptions, ProjectionKind, ProjectionResult, ProjectionStatus};

/// Default source color.
pub const SOURCE_COLOR: Vec4 = Vec4::new(0.67, 0.27, 0.32, 1.0);
/// Default color of masked sources.
pub const MASK_COLOR: Vec4 = Vec4::new(0.5, 0.5, 0.5, 1.0);

/// Hemisphere test shared by selection and projection: the midline
/// `x == 0` belongs to the left.
pub(crate) fn is_left(x: f32) -> bool {
    x <= 0.0
}

/// Which sources [`SourceObj::set_visible_sources`] keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceSelect {
    All,
    None,
    /// `x <= 0`.
    Left,
    /// `x > 0`.
    Right,
    /// On the interior side of a surface.
    Inside,
    /// On the exterior side of a surface.
    Outside,
    /// Within a distance of the nearest surface vertex.
    Close,
}

impl SourceSelect {
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "none" => Ok(Self::None),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "inside" => Ok(Self::Inside),
            "outside" => Ok(Self::Outside),
            "close" => Ok(Self::Close),
            other => Err(VisbrainError::invalid(format!(
                "unknown source selection '{other}', use all, none, left, right, inside, outside or close"
            ))),
        }
    }
}

/// Surface and thresholds used by the surface-relative selections.
#[derive(Debug, Clone, Copy, Default)]
pub struct VisibleOptions<'a> {
    pub surface: Option<&'a TriMesh>,
    /// A source is inside when its signed distance along the normal of the
    /// nearest vertex is below this value.
    pub tolerance: f32,
    /// Overrides `radius_max` for [`SourceSelect::Close`].
    pub distance: Option<f32>,
}

/// A set of point sources.
pub struct SourceObj {
    node: ObjectNode,
    xyz: Vec<Vec3>,
    data: Option<Vec<f32>>,
    mask: Vec<bool>,
    visible: Vec<bool>,
    text: Option<Vec<String>>,
    system: CoordinateSystem,
    radius_min: f32,
    radius_max: f32,
    color: Vec4,
    mask_color: Vec4,
    edge_color: Option<Vec4>,
    text_size: f32,
    text_color: Vec4,
    custom_colors: Option<Vec<Vec4>>,
    color_state: SharedColorState,
    analysis: Option<crate::analysis::AnalysisTable>,
}

impl SourceObj {
    /// Creates visible, unmasked sources without data.
    pub fn new(name: impl Into<String>, xyz: Vec<Vec3>) -> Result<Self> {
        if let Some(i) = xyz.iter().position(|p| !p.is_finite()) {
            return Err(VisbrainError::invalid(format!("source {i} has a non-finite position")));
        }
        let n = xyz.len();
        Ok(Self {
            node: ObjectNode::new(name)?,
            xyz,
            data: None,
            mask: vec![false; n],
            visible: vec![true; n],
            text: None,
            system: CoordinateSystem::Mni,
            radius_min: 5.0,
            radius_max: 10.0,
            color: SOURCE_COLOR,
            mask_color: MASK_COLOR,
            edge_color: Some(Vec4::new(0.0, 0.0, 0.0, 1.0)),
            text_size: 3.0,
            text_color: Vec4::ONE,
            custom_colors: None,
            color_state: ColorState::named("viridis").into_shared(),
            analysis: None,
        })
    }

    /// Attaches one scalar per source.
    pub fn with_data(mut self, data: Vec<f32>) -> Result<Self> {
        self.set_data(data)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_system(mut self, system: CoordinateSystem) -> Self {
        self.system = system;
        self
    }

    pub fn n_sources(&self) -> usize {
        self.xyz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xyz.is_empty()
    }

    pub fn xyz(&self) -> &[Vec3] {
        &self.xyz
    }

    /// Positions converted to MNI.
    pub fn mni_xyz(&self) -> Vec<Vec3> {
        self.xyz.iter().map(|p| self.system.to_mni(*p)).collect()
    }

    pub fn system(&self) -> CoordinateSystem {
        self.system
    }

    pub fn set_system(&mut self, system: CoordinateSystem) {
        self.system = system;
    }

    pub fn data(&self) -> Option<&[f32]> {
        self.data.as_deref()
    }

    /// Sets one scalar per source and publishes its range on the color
    /// state.
    pub fn set_data(&mut self, data: Vec<f32>) -> Result<()> {
        check_len(self.xyz.len(), data.len())?;
        self.color_state.borrow_mut().set_data_range(&data);
        self.data = Some(data);
        Ok(())
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    pub fn set_mask(&mut self, mask: Vec<bool>) -> Result<()> {
        check_len(self.xyz.len(), mask.len())?;
        self.mask = mask;
        Ok(())
    }

    pub fn visible(&self) -> &[bool] {
        &self.visible
    }

    pub fn set_visible(&mut self, visible: Vec<bool>) -> Result<()> {
        check_len(self.xyz.len(), visible.len())?;
        self.visible = visible;
        Ok(())
    }

    /// `visible & !mask`, the sources that take part in projections.
    pub fn visible_and_not_masked(&self) -> Vec<bool> {
        self.visible.iter().zip(&self.mask).map(|(&v, &m)| v && !m).collect()
    }

    pub fn text(&self) -> Option<&[String]> {
        self.text.as_deref()
    }

    pub fn set_text(&mut self, text: Option<Vec<String>>) -> Result<()> {
        if let Some(text) = &text {
            check_len(self.xyz.len(), text.len())?;
        }
        self.text = text;
        Ok(())
    }

    pub fn set_text_style(&mut self, size: f32, color: Vec4) {
        self.text_size = size;
        self.text_color = color;
    }

    pub fn radius(&self) -> (f32, f32) {
        (self.radius_min, self.radius_max)
    }

    pub fn set_radius(&mut self, radius_min: f32, radius_max: f32) -> Result<()> {
        if !(radius_min >= 0.0 && radius_min <= radius_max) {
            return Err(VisbrainError::invalid(format!(
                "radius range ({radius_min}, {radius_max}) must satisfy 0 <= min <= max"
            )));
        }
        self.radius_min = radius_min;
        self.radius_max = radius_max;
        Ok(())
    }

    pub fn set_color(&mut self, color: Vec4) {
        self.color = color;
        self.custom_colors = None;
    }

    pub fn set_mask_color(&mut self, color: Vec4) {
        self.mask_color = color;
    }

    pub fn set_edge_color(&mut self, color: Option<Vec4>) {
        self.edge_color = color;
    }

    /// Color state used to color by data and for projections.
    pub fn source_color_state(&self) -> &SharedColorState {
        &self.color_state
    }

    /// Marker radius of every source: the data linearly rescaled into
    /// `[radius_min, radius_max]` over the displayed sources. Without data,
    /// or with constant data, every source gets `radius_min`.
    pub fn radii(&self) -> Vec<f32> {
        let Some(data) = &self.data else {
            return vec![self.radius_min; self.xyz.len()];
        };
        let shown: Vec<f32> = data
            .iter()
            .zip(self.visible_and_not_masked())
            .filter(|(v, keep)| *keep && v.is_finite())
            .map(|(v, _)| *v)
            .collect();
        let range = visbrain_core::color_state::finite_range(&shown);
        data.iter()
            .map(|&v| match range {
                Some((lo, hi)) if hi > lo && v.is_finite() => {
                    self.radius_min + (v - lo) / (hi - lo) * (self.radius_max - self.radius_min)
                }
                _ => self.radius_min,
            })
            .map(|r| r.clamp(self.radius_min, self.radius_max))
            .collect()
    }

    /// Display color of every source. Hidden sources are fully transparent.
    pub fn colors(&self) -> Vec<Vec4> {
        (0..self.xyz.len())
            .map(|i| {
                if !self.visible[i] {
                    Vec4::ZERO
                } else if self.mask[i] {
                    self.mask_color
                } else {
                    self.custom_colors.as_ref().map_or(self.color, |c| c[i])
                }
            })
            .collect()
    }

    /// Changes which sources are displayed.
    pub fn set_visible_sources(&mut self, select: SourceSelect, options: &VisibleOptions<'_>) -> Result<()> {
        let surface = || {
            options
                .surface
                .filter(|s| !s.vertices.is_empty())
                .ok_or_else(|| VisbrainError::invalid(format!("{select:?} selection needs a non-empty surface")))
        };
        self.visible = match select {
            SourceSelect::All => vec![true; self.xyz.len()],
            SourceSelect::None => vec![false; self.xyz.len()],
            SourceSelect::Left => self.xyz.iter().map(|p| is_left(p.x)).collect(),
            SourceSelect::Right => self.xyz.iter().map(|p| !is_left(p.x)).collect(),
            SourceSelect::Inside | SourceSelect::Outside => {
                let surface = surface()?;
                let index = PointIndex::with_auto_cell(&surface.vertices);
                let inside = select == SourceSelect::Inside;
                self.xyz
                    .iter()
                    .map(|p| {
                        index.nearest(*p).is_some_and(|(v, _)| {
                            let signed = (*p - surface.vertices[v as usize]).dot(surface.normals[v as usize]);
                            (signed < options.tolerance) == inside
                        })
                    })
                    .collect()
            }
            SourceSelect::Close => {
                let surface = surface()?;
                let index = PointIndex::with_auto_cell(&surface.vertices);
                let distance = options.distance.unwrap_or(self.radius_max);
                self.xyz
                    .iter()
                    .map(|p| index.nearest(*p).is_some_and(|(_, d)| d <= distance))
                    .collect()
            }
        };
        log::debug!(
            "sources '{}': {:?} keeps {}/{}",
            self.node.name(),
            select,
            self.visible.iter().filter(|&&v| v).count(),
            self.xyz.len()
        );
        Ok(())
    }

    /// Moves and uniformly scales the sources so that their bounding box
    /// matches the one of `vertices`: the scale is the ratio of the largest
    /// extents, then the box centers are aligned.
    pub fn fit_to_vertices(&mut self, vertices: &[Vec3]) -> Result<()> {
        let (Some((smin, smax)), Some((vmin, vmax))) = (bounding_box(&self.xyz), bounding_box(vertices)) else {
            return Err(VisbrainError::EmptySelection(
                "fit_to_vertices needs sources and vertices".to_string(),
            ));
        };
        let source_extent = (smax - smin).max_element();
        let scale = if source_extent > 0.0 {
            (vmax - vmin).max_element() / source_extent
        } else {
            1.0
        };
        let (scenter, vcenter) = ((smin + smax) * 0.5, (vmin + vmax) * 0.5);
        for p in &mut self.xyz {
            *p = (*p - scenter) * scale + vcenter;
        }
        Ok(())
    }

    /// The last table computed by [`SourceObj::analyse_sources`].
    pub fn analysis(&self) -> Option<&crate::analysis::AnalysisTable> {
        self.analysis.as_ref()
    }
}

impl VisbrainObject for SourceObj {
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
        "SourceObj"
    }

    fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        let (min, max) = bounding_box(&self.xyz)?;
        Some((min - Vec3::splat(self.radius_max), max + Vec3::splat(self.radius_max)))
    }

    fn render(&self, ctx: &mut dyn RenderContext) {
        if !self.visible_obj() || self.xyz.is_empty() {
            return;
        }
        let model = self.transform();
        ctx.submit(
            Primitive::Markers {
                positions: Cow::Borrowed(&self.xyz),
                colors: Cow::Owned(self.colors()),
                radii: Cow::Owned(self.radii()),
                edge_color: self.edge_color,
            },
            model,
        );
        if let Some(text) = &self.text {
            for ((p, label), shown) in self.xyz.iter().zip(text).zip(&self.visible) {
                if *shown && !label.is_empty() {
                    ctx.submit(
                        Primitive::Text {
                            position: *p + Vec3::new(0.0, 0.0, self.radius_max),
                            text: Cow::Borrowed(label),
                            color: self.text_color,
                            size: self.text_size,
                            bold: false,
                        },
                        model,
                    );
                }
            }
        }
    }

    fn color_state(&self) -> Option<SharedColorState> {
        Some(self.color_state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use visbrain_core::RecordingContext;

    fn line() -> SourceObj {
        SourceObj::new("s", vec![Vec3::new(-10.0, 0.0, 0.0), Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0)]).unwrap()
    }

    #[test]
    fn test_lengths_checked() {
        let mut s = line();
        assert!(s.set_data(vec![1.0]).is_err());
        assert!(s.set_mask(vec![true; 2]).is_err());
        assert!(s.set_text(Some(vec!["a".into()])).is_err());
        assert!(s.set_radius(10.0, 5.0).is_err());
        assert!(SourceObj::new("s", vec![Vec3::NAN]).is_err());
    }

    #[test]
    fn test_radii_follow_data() {
        let mut s = line().with_data(vec![0.0, 1.0, 2.0]).unwrap();
        assert_eq!(s.radii(), vec![5.0, 7.5, 10.0]);
        s.set_data(vec![3.0; 3]).unwrap();
        assert_eq!(s.radii(), vec![5.0; 3]);
    }

    #[test]
    fn test_masked_and_hidden_colors() {
        let mut s = line();
        s.set_mask(vec![false, true, false]).unwrap();
        s.set_visible(vec![true, true, false]).unwrap();
        let colors = s.colors();
        assert_eq!(colors[0], SOURCE_COLOR);
        assert_eq!(colors[1], MASK_COLOR);
        assert_eq!(colors[2].w, 0.0);
        assert_eq!(s.visible_and_not_masked(), vec![true, false, false]);
    }

    #[test]
    fn test_left_right() {
        let mut s = line();
        s.set_visible_sources(SourceSelect::Left, &VisibleOptions::default()).unwrap();
        assert_eq!(s.visible(), &[true, true, false]);
        s.set_visible_sources(SourceSelect::Right, &VisibleOptions::default()).unwrap();
        assert_eq!(s.visible(), &[false, false, true]);
        assert!(s.set_visible_sources(SourceSelect::Inside, &VisibleOptions::default()).is_err());
    }

    #[test]
    fn test_inside_outside_close() {
        let sphere = crate::templates::SurfaceTemplate::sphere().to_mesh().unwrap();
        let mut s = SourceObj::new("s", vec![Vec3::new(0.0, -18.0, 12.0), Vec3::new(0.0, -18.0, 100.0)]).unwrap();
        let options = VisibleOptions {
            surface: Some(&sphere),
            ..VisibleOptions::default()
        };
        s.set_visible_sources(SourceSelect::Inside, &options).unwrap();
        assert_eq!(s.visible(), &[true, false]);
        s.set_visible_sources(SourceSelect::Outside, &options).unwrap();
        assert_eq!(s.visible(), &[false, true]);
        let close = VisibleOptions {
            distance: Some(50.0),
            ..options
        };
        s.set_visible_sources(SourceSelect::Close, &close).unwrap();
        assert_eq!(s.visible(), &[false, true]);
    }

    #[test]
    fn test_fit_to_vertices() {
        let mut s = SourceObj::new("s", vec![Vec3::ZERO, Vec3::ONE]).unwrap();
        s.fit_to_vertices(&[Vec3::splat(-10.0), Vec3::splat(10.0)]).unwrap();
        assert_eq!(s.xyz(), &[Vec3::splat(-10.0), Vec3::splat(10.0)]);
        assert!(s.fit_to_vertices(&[]).is_err());
    }

    #[test]
    fn test_render_text() {
        let mut s = line();
        s.set_text(Some(vec!["a".into(), String::new(), "c".into()])).unwrap();
        let mut ctx = RecordingContext::default();
        s.render(&mut ctx);
        let kinds: Vec<_> = ctx.submitted.iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, vec!["markers", "text", "text"]);
    }
}

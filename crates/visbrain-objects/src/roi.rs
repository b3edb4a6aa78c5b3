//! Regions of interest from a parcellated volume.
//!
//! A [`RoiObj`] holds a labeled volume, its label table and the affine that
//! maps voxel indices to world coordinates. Selected labels are turned into
//! one mesh with a face-to-label map, and source positions can be looked up
//! in the volume to recover their labels.

use std::borrow::Cow;
use std::collections::BTreeMap;

use glam::{Mat4, Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use visbrain_core::colormap::ColorMapRegistry;
use visbrain_core::transform::{invert_affine, voxel_to_world, world_to_voxel};
use visbrain_core::volume::box_smooth;
use visbrain_core::{
    marching_cubes, CoordinateSystem, LabelTable, Monitor, ObjectNode, PointIndex, Primitive, RenderContext, Result,
    TriMesh, ViewPreset, VisbrainError, VisbrainObject, Volume,
};

use crate::analysis::{AnalysisTable, NOT_FOUND, NO_LABEL};
use crate::templates::RoiTemplate;

/// Default color of selected regions.
pub const ROI_COLOR: Vec4 = Vec4::new(0.95, 0.95, 0.95, 1.0);

/// How selected regions are colored.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RoiColor {
    /// Every region gets the same color.
    #[default]
    Uniform,
    /// One explicit color for all regions.
    Unique(Vec4),
    /// Regions sample a named colormap evenly, in selection order.
    Colormap(String),
    /// Seeded random color per region.
    Random(u64),
    /// Explicit colors per label; other labels use [`ROI_COLOR`].
    Custom(BTreeMap<i32, Vec4>),
}

/// Options of [`RoiObj::select_roi`].
#[derive(Debug, Clone, PartialEq)]
pub struct SelectOptions {
    /// Box-smoothing size, applied when `>= 3`.
    pub smooth: usize,
    pub color: RoiColor,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self {
            smooth: 3,
            color: RoiColor::Uniform,
        }
    }
}

/// Options of [`RoiObj::localize_sources`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocalizeOptions {
    /// Coordinate system of the queried positions.
    pub system: CoordinateSystem,
    /// When set, positions outside any labeled voxel take the label of the
    /// closest labeled voxel within this distance.
    pub distance: Option<f32>,
    /// Labels containing any of these substrings are rewritten.
    pub bad_patterns: Vec<String>,
    /// Replacement for bad labels, [`NO_LABEL`] when `None`.
    pub replace_with: Option<String>,
}

/// A parcellated volume with an optional extracted surface.
pub struct RoiObj {
    node: ObjectNode,
    atlas: String,
    vol: Volume<i32>,
    labels: LabelTable,
    hdr: Mat4,
    hdr_inv: Option<Mat4>,
    mesh: TriMesh,
    face_labels: Vec<i32>,
    vertex_labels: Vec<i32>,
    selected: Vec<i32>,
    colors: BTreeMap<i32, Vec4>,
}

impl RoiObj {
    /// Loads a named atlas, falling back to the built-in demo atlas.
    pub fn new(name: impl Into<String>, atlas: &str) -> Result<Self> {
        let mut roi = Self::from_template(name, RoiTemplate::load_or_demo(atlas))?;
        roi.atlas = atlas.to_string();
        Ok(roi)
    }

    pub fn from_template(name: impl Into<String>, template: RoiTemplate) -> Result<Self> {
        let hdr = template.hdr();
        let mut roi = Self {
            node: ObjectNode::new(name)?,
            atlas: String::from("custom"),
            vol: Volume::filled([1, 1, 1], 0),
            labels: template.labels.clone(),
            hdr: Mat4::IDENTITY,
            hdr_inv: Some(Mat4::IDENTITY),
            mesh: TriMesh::default(),
            face_labels: Vec::new(),
            vertex_labels: Vec::new(),
            selected: Vec::new(),
            colors: BTreeMap::new(),
        };
        roi.set_data(template.vol, template.labels, hdr)?;
        Ok(roi)
    }

    /// Replaces the volume, its label table and affine. Any extracted
    /// surface is dropped.
    pub fn set_data(&mut self, vol: Volume<i32>, labels: LabelTable, hdr: Mat4) -> Result<()> {
        let hdr_inv = invert_affine(hdr);
        if hdr_inv.is_none() {
            log::warn!("ROI '{}' has a singular affine, lookups will report '{NOT_FOUND}'", self.node.name());
        }
        let unknown = vol
            .data()
            .iter()
            .filter(|&&v| v != 0 && !labels.contains(v))
            .count();
        if unknown > 0 {
            log::debug!("ROI '{}': {unknown} voxels carry labels missing from the table", self.node.name());
        }
        self.vol = vol;
        self.labels = labels;
        self.hdr = hdr;
        self.hdr_inv = hdr_inv;
        self.clear_selection();
        Ok(())
    }

    pub fn atlas(&self) -> &str {
        &self.atlas
    }

    pub fn volume(&self) -> &Volume<i32> {
        &self.vol
    }

    pub fn hdr(&self) -> Mat4 {
        self.hdr
    }

    /// The label table.
    pub fn get_labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Labels whose `column` (the first column by default) matches any of
    /// `patterns`: equal when `exact`, else a case-insensitive substring.
    pub fn where_is(&self, patterns: &[&str], column: Option<&str>, exact: bool) -> Result<Vec<i32>> {
        let col = match column {
            Some(name) => self
                .labels
                .column(name)
                .ok_or_else(|| VisbrainError::invalid(format!("no column '{name}' in the label table")))?,
            None => 0,
        };
        let lowered: Vec<String> = patterns.iter().map(|p| p.to_lowercase()).collect();
        Ok(self
            .labels
            .iter()
            .filter(|(_, row)| {
                let value = &row[col];
                if exact {
                    patterns.iter().any(|p| value.as_str() == *p)
                } else {
                    let value = value.to_lowercase();
                    lowered.iter().any(|p| value.contains(p.as_str()))
                }
            })
            .map(|(label, _)| label)
            .collect())
    }

    fn clear_selection(&mut self) {
        self.mesh = TriMesh::default();
        self.face_labels.clear();
        self.vertex_labels.clear();
        self.selected.clear();
        self.colors.clear();
    }

    /// Extracts the surface of the given labels.
    ///
    /// Each label becomes a binary mask padded by empty voxels (half the
    /// smoothing window, at least one), optionally box-smoothed, and is
    /// meshed at level 0.5. The per-label meshes are concatenated; the
    /// monitor receives one milestone per label.
    #[allow(clippy::cast_precision_loss)]
    pub fn select_roi(&mut self, index: &[i32], options: &SelectOptions, monitor: &mut Monitor<'_>) -> Result<()> {
        if index.is_empty() {
            return Err(VisbrainError::EmptySelection("select_roi needs at least one label".to_string()));
        }
        if let Some(&unknown) = index.iter().find(|&&l| !self.labels.contains(l)) {
            return Err(VisbrainError::UnknownLabel(unknown));
        }

        // Room for the smoothing window so surfaces close inside the grid.
        let pad = (options.smooth / 2).max(1);
        let to_world = self.hdr * Mat4::from_translation(Vec3::splat(-(pad as f32)));
        let mut mesh = TriMesh::default();
        let mut face_labels = Vec::new();
        let mut vertex_labels = Vec::new();
        for (i, &label) in index.iter().enumerate() {
            monitor.check()?;
            let mask = self
                .vol
                .map(|v| if v == label { 1.0_f32 } else { 0.0 })
                .padded(pad, 0.0);
            let field = if options.smooth >= 3 {
                box_smooth(&mask, options.smooth)
            } else {
                mask
            };
            let mut part = marching_cubes(&field, 0.5, monitor)?;
            if part.is_empty() {
                log::warn!("ROI label {label} produced an empty surface");
            }
            part.transform(to_world);
            let faces = mesh.append(&part);
            face_labels.extend(std::iter::repeat(label).take(faces.len()));
            vertex_labels.extend(std::iter::repeat(label).take(part.n_vertices()));
            monitor.report(i + 1, index.len(), "roi");
        }
        log::debug!(
            "ROI '{}': {} labels -> {} faces",
            self.node.name(),
            index.len(),
            mesh.n_faces()
        );
        self.mesh = mesh;
        self.face_labels = face_labels;
        self.vertex_labels = vertex_labels;
        self.selected = index.to_vec();
        self.colors = roi_colors(index, &options.color);
        Ok(())
    }

    /// Labels of the last selection.
    pub fn selected_rois(&self) -> &[i32] {
        &self.selected
    }

    pub fn mesh(&self) -> &TriMesh {
        &self.mesh
    }

    /// Label of every face of [`RoiObj::mesh`].
    pub fn face_labels(&self) -> &[i32] {
        &self.face_labels
    }

    /// Color of a selected label.
    pub fn roi_color(&self, label: i32) -> Option<Vec4> {
        self.colors.get(&label).copied()
    }

    fn selected_color_mut(&mut self, label: i32) -> Result<&mut Vec4> {
        self.colors.get_mut(&label).ok_or(VisbrainError::UnknownLabel(label))
    }

    /// Sets the opacity of one selected region.
    pub fn set_roi_alpha(&mut self, label: i32, alpha: f32) -> Result<()> {
        self.selected_color_mut(label)?.w = alpha.clamp(0.0, 1.0);
        Ok(())
    }

    /// Sets the color of one selected region, keeping its opacity.
    pub fn set_roi_color(&mut self, label: i32, color: Vec4) -> Result<()> {
        let slot = self.selected_color_mut(label)?;
        *slot = color.truncate().extend(slot.w);
        Ok(())
    }

    /// World-space centroid of every label present in the volume, in table
    /// order.
    #[allow(clippy::cast_precision_loss)]
    pub fn centroids(&self) -> Vec<(i32, Vec3)> {
        let mut sums: BTreeMap<i32, (Vec3, usize)> = BTreeMap::new();
        let [nx, ny, nz] = self.vol.shape();
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    let label = self.vol.data()[self.vol.offset(i, j, k)];
                    if label != 0 {
                        let entry = sums.entry(label).or_insert((Vec3::ZERO, 0));
                        entry.0 += Vec3::new(i as f32, j as f32, k as f32);
                        entry.1 += 1;
                    }
                }
            }
        }
        self.labels
            .index()
            .iter()
            .filter_map(|label| {
                let (sum, n) = sums.get(label)?;
                Some((*label, self.hdr.transform_point3(*sum / *n as f32)))
            })
            .collect()
    }

    /// Looks up the label row of every position.
    ///
    /// Positions are converted to MNI, then to voxel indices with the
    /// inverse affine. Positions outside the volume, on background voxels or
    /// on labels missing from the table read [`NOT_FOUND`] in every column.
    pub fn localize_sources(&self, xyz: &[Vec3], options: &LocalizeOptions) -> Result<AnalysisTable> {
        let columns = self.labels.columns().to_vec();
        let not_found = vec![NOT_FOUND.to_string(); columns.len()];
        let Some(hdr_inv) = self.hdr_inv else {
            log::warn!("ROI '{}': singular affine, every source is '{NOT_FOUND}'", self.node.name());
            return AnalysisTable::new(columns, vec![not_found; xyz.len()]);
        };

        let fallback = options.distance.map(|d| (d, self.labeled_voxels()));
        let shape = self.vol.shape();
        let rows = xyz
            .iter()
            .map(|p| {
                let p = options.system.to_mni(*p);
                let direct = world_to_voxel(hdr_inv, p, shape)
                    .and_then(|[i, j, k]| self.vol.get(i, j, k))
                    .filter(|&label| label != 0)
                    .and_then(|label| self.labels.row(label));
                let row = direct.or_else(|| {
                    let (distance, (index, labels)) = fallback.as_ref()?;
                    let (nearest, d) = index.nearest(p)?;
                    if d > *distance {
                        return None;
                    }
                    self.labels.row(labels[nearest as usize])
                });
                row.map_or_else(|| not_found.clone(), <[String]>::to_vec)
            })
            .collect();

        let mut table = AnalysisTable::new(columns, rows)?;
        if !options.bad_patterns.is_empty() {
            let replace_with = options.replace_with.as_deref().unwrap_or(NO_LABEL);
            if let Some(first) = table.columns().first().cloned() {
                table.replace_matching(&first, &options.bad_patterns, replace_with)?;
            }
        }
        Ok(table)
    }

    /// World positions and labels of every voxel whose label is in the table.
    fn labeled_voxels(&self) -> (PointIndex, Vec<i32>) {
        let [nx, ny, nz] = self.vol.shape();
        let mut points = Vec::new();
        let mut labels = Vec::new();
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    let label = self.vol.data()[self.vol.offset(i, j, k)];
                    if label != 0 && self.labels.contains(label) {
                        points.push(voxel_to_world(self.hdr, [i, j, k]));
                        labels.push(label);
                    }
                }
            }
        }
        (PointIndex::with_auto_cell(&points), labels)
    }

    fn vertex_colors(&self) -> Vec<Vec4> {
        self.vertex_labels
            .iter()
            .map(|label| self.colors.get(label).copied().unwrap_or(ROI_COLOR))
            .collect()
    }
}

#[allow(clippy::cast_precision_loss)]
fn roi_colors(index: &[i32], color: &RoiColor) -> BTreeMap<i32, Vec4> {
    let n = index.len();
    match color {
        RoiColor::Uniform => index.iter().map(|&l| (l, ROI_COLOR)).collect(),
        RoiColor::Unique(c) => index.iter().map(|&l| (l, *c)).collect(),
        RoiColor::Colormap(name) => {
            let map = ColorMapRegistry::builtin().resolve(name);
            index
                .iter()
                .enumerate()
                .map(|(i, &l)| {
                    let t = if n > 1 { i as f32 / (n - 1) as f32 } else { 0.5 };
                    (l, map.sample(t).extend(1.0))
                })
                .collect()
        }
        RoiColor::Random(seed) => {
            let mut rng = StdRng::seed_from_u64(*seed);
            index
                .iter()
                .map(|&l| (l, Vec4::new(rng.gen(), rng.gen(), rng.gen(), 1.0)))
                .collect()
        }
        RoiColor::Custom(map) => index
            .iter()
            .map(|l| (*l, map.get(l).copied().unwrap_or(ROI_COLOR)))
            .collect(),
    }
}

impl VisbrainObject for RoiObj {
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
        "RoiObj"
    }

    fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        self.mesh.bounding_box().or_else(|| {
            let [nx, ny, nz] = self.vol.shape();
            let corner = voxel_to_world(self.hdr, [nx.saturating_sub(1), ny.saturating_sub(1), nz.saturating_sub(1)]);
            let origin = voxel_to_world(self.hdr, [0, 0, 0]);
            Some((origin.min(corner), origin.max(corner)))
        })
    }

    fn render(&self, ctx: &mut dyn RenderContext) {
        if !self.visible_obj() || self.mesh.is_empty() {
            return;
        }
        ctx.submit(
            Primitive::Mesh {
                vertices: Cow::Borrowed(&self.mesh.vertices),
                normals: Cow::Borrowed(&self.mesh.normals),
                faces: Cow::Borrowed(&self.mesh.faces),
                colors: Cow::Owned(self.vertex_colors()),
            },
            self.transform(),
        );
    }

    fn preferred_view(&self) -> ViewPreset {
        ViewPreset::default()
    }
}

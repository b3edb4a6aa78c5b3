//! Orthogonal cross-sections of a volume.
//!
//! Three planes (sagittal, coronal and axial) pass through a voxel cursor.
//! Moving the cursor only recomputes the planes whose index changed.

#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]

use std::borrow::Cow;

use glam::{Mat4, Vec3, Vec4};
use visbrain_core::transform::invert_affine;
use visbrain_core::{
    array_to_colormap, Axis, ColorState, ObjectNode, Primitive, RenderContext, Result, Rotation, SharedColorState,
    ViewPreset, VisbrainError, VisbrainObject, Volume,
};

use crate::templates::RoiTemplate;

/// A colored slice, `pixels[row * width + col]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<Vec4>,
}

/// Three orthogonal slices through a cursor.
pub struct CrossSecObj {
    node: ObjectNode,
    vol: Volume<f32>,
    hdr: Mat4,
    hdr_inv: Mat4,
    cursor: [usize; 3],
    planes: [Plane; 3],
    updated: Vec<Axis>,
    bgcolor: Vec4,
    highlight: Option<Vec4>,
    color: SharedColorState,
}

impl CrossSecObj {
    /// Creates the planes with the cursor at the volume center.
    pub fn new(name: impl Into<String>, vol: Volume<f32>, hdr: Mat4) -> Result<Self> {
        let hdr_inv = invert_affine(hdr).ok_or_else(|| VisbrainError::invalid("volume affine must be invertible"))?;
        if vol.is_empty() {
            return Err(VisbrainError::EmptySelection("cross-section of an empty volume".to_string()));
        }
        let [nx, ny, nz] = vol.shape();
        let empty = Plane {
            width: 0,
            height: 0,
            pixels: Vec::new(),
        };
        let mut obj = Self {
            node: ObjectNode::new(name)?,
            vol,
            hdr,
            hdr_inv,
            cursor: [nx / 2, ny / 2, nz / 2],
            planes: [empty.clone(), empty.clone(), empty],
            updated: Vec::new(),
            bgcolor: Vec4::new(0.0, 0.0, 0.0, 1.0),
            highlight: None,
            color: ColorState::named("gray").into_shared(),
        };
        // One color scale for the whole volume, so that planes agree.
        obj.color.borrow_mut().set_data_range(obj.vol.data());
        obj.refresh();
        Ok(obj)
    }

    /// Cross-sections of an atlas, labels read as floats.
    pub fn from_atlas(name: impl Into<String>, atlas: &RoiTemplate) -> Result<Self> {
        Self::new(name, atlas.vol.map(|label| label as f32), atlas.hdr())
    }

    pub fn volume(&self) -> &Volume<f32> {
        &self.vol
    }

    pub fn cursor(&self) -> [usize; 3] {
        self.cursor
    }

    /// Moves the cursor, clamped into the volume, and recomputes the planes
    /// whose index changed.
    pub fn set_cursor(&mut self, ix: usize, iy: usize, iz: usize) {
        let shape = self.vol.shape();
        let next = [ix, iy, iz];
        let mut clamped = [0; 3];
        for axis in 0..3 {
            clamped[axis] = next[axis].min(shape[axis] - 1);
        }
        self.updated = Axis::ALL
            .into_iter()
            .filter(|a| clamped[a.index()] != self.cursor[a.index()])
            .collect();
        self.cursor = clamped;
        if self.highlight.is_some() {
            // Highlight lines follow the other two axes.
            self.updated = Axis::ALL.to_vec();
        }
        for axis in self.updated.clone() {
            self.planes[axis.index()] = self.compute_plane(axis);
        }
        log::debug!("cross-section '{}' cursor {:?}, updated {:?}", self.node.name(), self.cursor, self.updated);
    }

    /// Planes recomputed by the last cursor move.
    pub fn updated_planes(&self) -> &[Axis] {
        &self.updated
    }

    /// Moves the cursor to the voxel closest to a world position.
    pub fn localize(&mut self, xyz: Vec3) -> Result<[usize; 3]> {
        let v = self.hdr_inv.transform_point3(xyz).round();
        if !v.is_finite() {
            return Err(VisbrainError::invalid(format!("cannot localize {xyz}")));
        }
        let v = v.max(Vec3::ZERO);
        self.set_cursor(v.x as usize, v.y as usize, v.z as usize);
        Ok(self.cursor)
    }

    pub fn plane(&self, axis: Axis) -> &Plane {
        &self.planes[axis.index()]
    }

    pub fn set_bgcolor(&mut self, bgcolor: Vec4) {
        self.bgcolor = bgcolor;
        self.refresh();
    }

    /// Lines at the cursor position drawn on every plane, `None` to disable.
    pub fn set_highlight(&mut self, color: Option<Vec4>) {
        self.highlight = color;
        self.refresh();
    }

    /// Recomputes all three planes, after a color change for instance.
    pub fn refresh(&mut self) {
        for axis in Axis::ALL {
            self.planes[axis.index()] = self.compute_plane(axis);
        }
        self.updated = Axis::ALL.to_vec();
    }

    fn compute_plane(&self, axis: Axis) -> Plane {
        let Some((width, height, values)) = self.vol.slice(axis, self.cursor[axis.index()]) else {
            return Plane {
                width: 0,
                height: 0,
                pixels: Vec::new(),
            };
        };
        let mut pixels = array_to_colormap(&values, &self.color.borrow());
        for (pixel, v) in pixels.iter_mut().zip(&values) {
            if *v == 0.0 || !v.is_finite() {
                *pixel = self.bgcolor;
            }
        }
        if let Some(color) = self.highlight {
            let (row_axis, col_axis) = Self::plane_axes(axis);
            let (row, col) = (self.cursor[row_axis], self.cursor[col_axis]);
            for c in 0..width {
                pixels[row * width + c] = color;
            }
            for r in 0..height {
                pixels[r * width + col] = color;
            }
        }
        Plane { width, height, pixels }
    }

    /// Voxel axes along the plane rows and columns.
    fn plane_axes(axis: Axis) -> (usize, usize) {
        match axis {
            Axis::Sagittal => (1, 2),
            Axis::Coronal => (0, 2),
            Axis::Axial => (0, 1),
        }
    }
}

impl VisbrainObject for CrossSecObj {
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
        "CrossSecObj"
    }

    fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        let [nx, ny, nz] = self.vol.shape();
        let a = self.hdr.transform_point3(Vec3::splat(-0.5));
        let b = self
            .hdr
            .transform_point3(Vec3::new(nx as f32 - 0.5, ny as f32 - 0.5, nz as f32 - 0.5));
        Some((a.min(b), a.max(b)))
    }

    fn render(&self, ctx: &mut dyn RenderContext) {
        if !self.visible_obj() {
            return;
        }
        let shape = self.vol.shape();
        for axis in Axis::ALL {
            let plane = &self.planes[axis.index()];
            if plane.pixels.is_empty() {
                continue;
            }
            let (row_axis, col_axis) = Self::plane_axes(axis);
            let mut corner = Vec3::splat(-0.5);
            corner[axis.index()] = self.cursor[axis.index()] as f32;
            let mut u = Vec3::ZERO;
            u[col_axis] = shape[col_axis] as f32;
            let mut v = Vec3::ZERO;
            v[row_axis] = shape[row_axis] as f32;
            ctx.submit(
                Primitive::Image {
                    origin: self.hdr.transform_point3(corner),
                    u_axis: self.hdr.transform_vector3(u),
                    v_axis: self.hdr.transform_vector3(v),
                    width: plane.width as u32,
                    height: plane.height as u32,
                    pixels: Cow::Borrowed(&plane.pixels),
                },
                self.transform(),
            );
        }
    }

    fn preferred_view(&self) -> ViewPreset {
        ViewPreset::default().rotated(Rotation::Left)
    }

    fn color_state(&self) -> Option<SharedColorState> {
        Some(self.color.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use visbrain_core::RecordingContext;

    fn ramp() -> CrossSecObj {
        let data = (0..4 * 5 * 6).map(|i| i as f32 + 1.0).collect();
        let vol = Volume::new([4, 5, 6], data).unwrap();
        CrossSecObj::new("cs", vol, Mat4::IDENTITY).unwrap()
    }

    #[test]
    fn test_initial_cursor_and_planes() {
        let cs = ramp();
        assert_eq!(cs.cursor(), [2, 2, 3]);
        assert_eq!((cs.plane(Axis::Sagittal).width, cs.plane(Axis::Sagittal).height), (6, 5));
        assert_eq!((cs.plane(Axis::Coronal).width, cs.plane(Axis::Coronal).height), (6, 4));
        assert_eq!((cs.plane(Axis::Axial).width, cs.plane(Axis::Axial).height), (5, 4));
    }

    #[test]
    fn test_only_changed_planes_update() {
        let mut cs = ramp();
        cs.set_cursor(2, 4, 3);
        assert_eq!(cs.updated_planes(), &[Axis::Coronal]);
        cs.set_cursor(0, 4, 0);
        assert_eq!(cs.updated_planes(), &[Axis::Sagittal, Axis::Axial]);
        cs.set_cursor(0, 4, 0);
        assert!(cs.updated_planes().is_empty());
    }

    #[test]
    fn test_cursor_is_clamped() {
        let mut cs = ramp();
        cs.set_cursor(100, 100, 100);
        assert_eq!(cs.cursor(), [3, 4, 5]);
        assert_eq!(cs.localize(Vec3::new(-10.0, 1.2, 2.6)).unwrap(), [0, 1, 3]);
    }

    #[test]
    fn test_background_and_highlight() {
        let mut vol = Volume::filled([3, 3, 3], 0.0_f32);
        vol.set(1, 1, 1, 5.0).unwrap();
        let mut cs = CrossSecObj::new("cs", vol, Mat4::IDENTITY).unwrap();
        let bg = Vec4::new(0.0, 0.0, 1.0, 1.0);
        cs.set_bgcolor(bg);
        let axial = cs.plane(Axis::Axial);
        assert_eq!(axial.pixels[0], bg);
        assert_ne!(axial.pixels[4], bg);

        let red = Vec4::new(1.0, 0.0, 0.0, 1.0);
        cs.set_highlight(Some(red));
        let axial = cs.plane(Axis::Axial);
        // Row 1 and column 1 go through the cursor.
        assert_eq!(axial.pixels[3], red);
        assert_eq!(axial.pixels[1], red);
        assert_eq!(axial.pixels[0], bg);
    }

    #[test]
    fn test_render_three_images() {
        let cs = ramp();
        let mut ctx = RecordingContext::default();
        cs.render(&mut ctx);
        let kinds: Vec<_> = ctx.submitted.iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, vec!["image"; 3]);
        assert!(CrossSecObj::new("cs", Volume::filled([2, 2, 2], 1.0), Mat4::ZERO).is_err());
    }
}

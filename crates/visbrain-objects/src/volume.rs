//! Scalar volume object.
//!
//! Voxels inside the threshold window are drawn as markers at their world
//! centers. [`VolumeObj::mip`] gives a colored maximum intensity projection
//! for 2-D display.

#![allow(clippy::cast_precision_loss)]

use std::borrow::Cow;

use glam::{Mat4, Vec3, Vec4};
use visbrain_core::transform::{invert_affine, voxel_to_world};
use visbrain_core::{
    array_to_colormap, Axis, ColorState, ObjectNode, Primitive, RenderContext, Result, SharedColorState,
    VisbrainError, VisbrainObject, Volume,
};

use crate::templates::RoiTemplate;

/// A 3-D scalar field with its voxel to world affine.
pub struct VolumeObj {
    node: ObjectNode,
    vol: Volume<f32>,
    hdr: Mat4,
    /// `None` draws every finite, non-zero voxel.
    threshold: Option<(f32, f32)>,
    color: SharedColorState,
}

impl VolumeObj {
    pub fn new(name: impl Into<String>, vol: Volume<f32>, hdr: Mat4) -> Result<Self> {
        if invert_affine(hdr).is_none() {
            return Err(VisbrainError::invalid("volume affine must be invertible"));
        }
        let obj = Self {
            node: ObjectNode::new(name)?,
            vol,
            hdr,
            threshold: None,
            color: ColorState::named("gray").into_shared(),
        };
        obj.publish_range();
        Ok(obj)
    }

    /// A volume of labels from an atlas, read as floats.
    pub fn from_atlas(name: impl Into<String>, atlas: &RoiTemplate) -> Result<Self> {
        let vol = atlas.vol.map(|label| label as f32);
        Self::new(name, vol, atlas.hdr())
    }

    pub fn volume(&self) -> &Volume<f32> {
        &self.vol
    }

    pub fn hdr(&self) -> Mat4 {
        self.hdr
    }

    pub fn threshold(&self) -> Option<(f32, f32)> {
        self.threshold
    }

    /// Only voxels with `lo <= value <= hi` are drawn.
    pub fn set_threshold(&mut self, lo: f32, hi: f32) -> Result<()> {
        if lo.is_nan() || hi.is_nan() || lo > hi {
            return Err(VisbrainError::invalid(format!("threshold ({lo}, {hi}) must satisfy lo <= hi")));
        }
        self.threshold = Some((lo, hi));
        self.publish_range();
        Ok(())
    }

    /// The colorbar range is the range of the drawn voxels.
    fn publish_range(&self) {
        let (_, values) = self.visible_voxels();
        self.color.borrow_mut().set_data_range(&values);
    }

    /// World centers and values of the voxels inside the threshold window.
    pub fn visible_voxels(&self) -> (Vec<Vec3>, Vec<f32>) {
        let [nx, ny, nz] = self.vol.shape();
        let shown = |v: f32| match self.threshold {
            Some((lo, hi)) => (lo..=hi).contains(&v),
            None => v.is_finite() && v != 0.0,
        };
        let mut positions = Vec::new();
        let mut values = Vec::new();
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    let v = self.vol.data()[self.vol.offset(i, j, k)];
                    if shown(v) {
                        positions.push(voxel_to_world(self.hdr, [i, j, k]));
                        values.push(v);
                    }
                }
            }
        }
        (positions, values)
    }

    /// Maximum intensity projection along `axis`, colored with the volume
    /// color state, as `(width, height, pixels)`.
    pub fn mip(&self, axis: Axis) -> (usize, usize, Vec<Vec4>) {
        let (width, height, values) = self.vol.max_projection(axis);
        let colors = array_to_colormap(&values, &self.color.borrow());
        (width, height, colors)
    }

    fn voxel_radius(&self) -> f32 {
        self.hdr.transform_vector3(Vec3::ONE).abs().min_element() * 0.5
    }
}

impl VisbrainObject for VolumeObj {
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
        "VolumeObj"
    }

    fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        let [nx, ny, nz] = self.vol.shape();
        if nx * ny * nz == 0 {
            return None;
        }
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
        let (positions, values) = self.visible_voxels();
        if positions.is_empty() {
            return;
        }
        let colors = array_to_colormap(&values, &self.color.borrow());
        let radii = vec![self.voxel_radius(); positions.len()];
        ctx.submit(
            Primitive::Markers {
                positions: Cow::Owned(positions),
                colors: Cow::Owned(colors),
                radii: Cow::Owned(radii),
                edge_color: None,
            },
            self.transform(),
        );
    }

    fn color_state(&self) -> Option<SharedColorState> {
        Some(self.color.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob() -> VolumeObj {
        let mut vol = Volume::filled([3, 3, 3], 0.0_f32);
        vol.set(1, 1, 1, 2.0).unwrap();
        vol.set(0, 0, 0, 1.0).unwrap();
        VolumeObj::new("v", vol, Mat4::from_scale(Vec3::splat(2.0))).unwrap()
    }

    #[test]
    fn test_threshold_hides_background() {
        let mut v = blob();
        let (positions, values) = v.visible_voxels();
        assert_eq!(values, vec![1.0, 2.0]);
        assert_eq!(positions[1], Vec3::splat(2.0));
        v.set_threshold(1.5, 10.0).unwrap();
        assert_eq!(v.visible_voxels().1, vec![2.0]);
        assert!(v.set_threshold(2.0, 1.0).is_err());
    }

    #[test]
    fn test_singular_affine_rejected() {
        let vol = Volume::filled([2, 2, 2], 0.0_f32);
        assert!(VolumeObj::new("v", vol, Mat4::ZERO).is_err());
    }

    #[test]
    fn test_mip_and_bounds() {
        let v = blob();
        let (w, h, pixels) = v.mip(Axis::Axial);
        assert_eq!((w, h, pixels.len()), (3, 3, 9));
        let (min, max) = v.bounding_box().unwrap();
        assert_eq!(min, Vec3::splat(-1.0));
        assert_eq!(max, Vec3::splat(5.0));
        assert_eq!(v.voxel_radius(), 1.0);
    }

    #[test]
    fn test_from_atlas() {
        let v = VolumeObj::from_atlas("atlas", &RoiTemplate::demo()).unwrap();
        assert_eq!(v.volume().shape(), [21, 21, 21]);
        assert!(!v.visible_voxels().0.is_empty());
    }
}

//! Small 2-D pictures anchored at 3-D positions.
//!
//! Each picture is a scalar image colored through the object color state,
//! so that all pictures share one scale and one colorbar.

#![allow(clippy::cast_possible_truncation)]

use std::borrow::Cow;

use glam::{Vec3, Vec4};
use visbrain_core::error::check_len;
use visbrain_core::mesh::bounding_box;
use visbrain_core::{
    array_to_colormap, ColorState, ObjectNode, Primitive, RenderContext, Result, SharedColorState, VisbrainError,
    VisbrainObject,
};

/// A scalar image, `values[row * width + col]`, row 0 at the top.
#[derive(Debug, Clone, PartialEq)]
pub struct Picture {
    pub width: usize,
    pub height: usize,
    pub values: Vec<f32>,
}

impl Picture {
    pub fn new(width: usize, height: usize, values: Vec<f32>) -> Result<Self> {
        check_len(width * height, values.len())?;
        Ok(Self { width, height, values })
    }
}

/// Pictures drawn as axis-aligned quads facing `+z`.
pub struct PictureObj {
    node: ObjectNode,
    pictures: Vec<Picture>,
    positions: Vec<Vec3>,
    size: (f32, f32),
    translate: Vec3,
    alpha: f32,
    color: SharedColorState,
}

impl PictureObj {
    pub fn new(name: impl Into<String>, pictures: Vec<Picture>, positions: Vec<Vec3>) -> Result<Self> {
        check_len(pictures.len(), positions.len())?;
        let all: Vec<f32> = pictures.iter().flat_map(|p| p.values.iter().copied()).collect();
        let mut state = ColorState::named("viridis");
        // One scale across pictures.
        state.set_data_range(&all);
        Ok(Self {
            node: ObjectNode::new(name)?,
            pictures,
            positions,
            size: (7.0, 7.0),
            translate: Vec3::ZERO,
            alpha: 1.0,
            color: state.into_shared(),
        })
    }

    pub fn len(&self) -> usize {
        self.pictures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pictures.is_empty()
    }

    /// World width and height of every quad.
    pub fn set_size(&mut self, width: f32, height: f32) -> Result<()> {
        if !(width > 0.0 && height > 0.0) {
            return Err(VisbrainError::invalid(format!("picture size ({width}, {height}) must be positive")));
        }
        self.size = (width, height);
        Ok(())
    }

    /// Offset added to every position.
    pub fn set_translate(&mut self, translate: Vec3) {
        self.translate = translate;
    }

    pub fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha.clamp(0.0, 1.0);
    }

    /// Colored pixels of every picture, using one scale across pictures.
    pub fn colored(&self) -> Vec<Vec<Vec4>> {
        let state = self.color.borrow();
        self.pictures
            .iter()
            .map(|p| {
                let mut pixels = array_to_colormap(&p.values, &state);
                for px in &mut pixels {
                    px.w *= self.alpha;
                }
                pixels
            })
            .collect()
    }

    /// Top-left corner of picture `i`.
    fn corner(&self, i: usize) -> Vec3 {
        let (w, h) = self.size;
        self.positions[i] + self.translate + Vec3::new(-w / 2.0, h / 2.0, 0.0)
    }
}

impl VisbrainObject for PictureObj {
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
        "PictureObj"
    }

    fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        let (w, h) = self.size;
        let corners: Vec<Vec3> = (0..self.len())
            .flat_map(|i| {
                let c = self.corner(i);
                [c, c + Vec3::new(w, -h, 0.0)]
            })
            .collect();
        bounding_box(&corners)
    }

    fn render(&self, ctx: &mut dyn RenderContext) {
        if !self.visible_obj() {
            return;
        }
        let (w, h) = self.size;
        for (i, (picture, pixels)) in self.pictures.iter().zip(self.colored()).enumerate() {
            ctx.submit(
                Primitive::Image {
                    origin: self.corner(i),
                    u_axis: Vec3::new(w, 0.0, 0.0),
                    v_axis: Vec3::new(0.0, -h, 0.0),
                    width: picture.width as u32,
                    height: picture.height as u32,
                    pixels: Cow::Owned(pixels),
                },
                self.transform(),
            );
        }
    }

    fn color_state(&self) -> Option<SharedColorState> {
        Some(self.color.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use visbrain_core::RecordingContext;

    fn two() -> PictureObj {
        let a = Picture::new(2, 1, vec![0.0, 1.0]).unwrap();
        let b = Picture::new(2, 1, vec![2.0, 3.0]).unwrap();
        PictureObj::new("p", vec![a, b], vec![Vec3::ZERO, Vec3::X * 10.0]).unwrap()
    }

    #[test]
    fn test_shared_scale_and_alpha() {
        let mut p = two();
        p.set_alpha(0.5);
        let colored = p.colored();
        // Same value range split across pictures: no two ends coincide.
        assert_ne!(colored[0][1], colored[1][0]);
        assert!(colored.iter().flatten().all(|c| (c.w - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_bounds_and_translate() {
        let mut p = two();
        p.set_size(2.0, 4.0).unwrap();
        p.set_translate(Vec3::Z);
        let (min, max) = p.bounding_box().unwrap();
        assert_eq!(min, Vec3::new(-1.0, -2.0, 1.0));
        assert_eq!(max, Vec3::new(11.0, 2.0, 1.0));
        assert!(p.set_size(0.0, 1.0).is_err());
    }

    #[test]
    fn test_render_one_image_per_picture() {
        let p = two();
        let mut ctx = RecordingContext::default();
        p.render(&mut ctx);
        assert_eq!(ctx.submitted.len(), 2);
        assert!(Picture::new(2, 2, vec![0.0]).is_err());
    }
}

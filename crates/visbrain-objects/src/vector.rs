//! Arrows, from explicit start/end pairs or from vertices and normals.

#![allow(clippy::cast_possible_truncation)]

use std::borrow::Cow;

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};
use visbrain_core::error::check_len;
use visbrain_core::mesh::bounding_box;
use visbrain_core::{
    array_to_colormap, ColorState, ObjectNode, Primitive, RenderContext, Result, SharedColorState, VisbrainError,
    VisbrainObject,
};

/// Shape drawn at the tip of each arrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrowHead {
    None,
    #[default]
    Stealth,
    Curved,
    Angle30,
    Angle60,
    Angle90,
    Triangle30,
    Triangle60,
    Triangle90,
    InhibitorRound,
}

impl ArrowHead {
    pub fn from_name(name: &str) -> Result<Self> {
        Ok(match name.to_ascii_lowercase().as_str() {
            "none" => Self::None,
            "stealth" => Self::Stealth,
            "curved" => Self::Curved,
            "angle_30" => Self::Angle30,
            "angle_60" => Self::Angle60,
            "angle_90" => Self::Angle90,
            "triangle_30" => Self::Triangle30,
            "triangle_60" => Self::Triangle60,
            "triangle_90" => Self::Triangle90,
            "inhibitor_round" => Self::InhibitorRound,
            other => return Err(VisbrainError::invalid(format!("unknown arrow head '{other}'"))),
        })
    }

    /// Segments of the head of an arrow ending at `tip` along unit `dir`.
    fn segments(self, tip: Vec3, dir: Vec3, size: f32) -> Vec<[Vec3; 2]> {
        let side = dir.any_orthonormal_vector();
        let back = tip - dir * size;
        let barbs = |half_angle_deg: f32| {
            let spread = size * half_angle_deg.to_radians().tan();
            (back + side * spread, back - side * spread)
        };
        match self {
            Self::None => Vec::new(),
            Self::Angle30 | Self::Angle60 | Self::Angle90 => {
                let deg = match self {
                    Self::Angle30 => 15.0,
                    Self::Angle60 => 30.0,
                    _ => 45.0,
                };
                let (a, b) = barbs(deg);
                vec![[a, tip], [b, tip]]
            }
            Self::Triangle30 | Self::Triangle60 | Self::Triangle90 => {
                let deg = match self {
                    Self::Triangle30 => 15.0,
                    Self::Triangle60 => 30.0,
                    _ => 45.0,
                };
                let (a, b) = barbs(deg);
                vec![[a, tip], [b, tip], [a, b]]
            }
            Self::Stealth => {
                let (a, b) = barbs(25.0);
                let notch = tip - dir * size * 0.6;
                vec![[a, tip], [b, tip], [a, notch], [b, notch]]
            }
            Self::Curved => {
                let (a, b) = barbs(30.0);
                let bend = |p: Vec3| (p + tip) * 0.5 - dir * size * 0.15;
                vec![[a, bend(a)], [bend(a), tip], [b, bend(b)], [bend(b), tip]]
            }
            Self::InhibitorRound => {
                let half = side * size * 0.5;
                vec![[tip - half, tip + half]]
            }
        }
    }
}

/// A set of arrows.
pub struct VectorObj {
    node: ObjectNode,
    starts: Vec<Vec3>,
    ends: Vec<Vec3>,
    data: Option<Vec<f32>>,
    uniform: Option<Vec4>,
    head: ArrowHead,
    head_size: f32,
    line_width: f32,
    color: SharedColorState,
}

impl VectorObj {
    /// Arrows from `starts[i]` to `ends[i]`.
    pub fn from_pairs(name: impl Into<String>, starts: Vec<Vec3>, ends: Vec<Vec3>) -> Result<Self> {
        check_len(starts.len(), ends.len())?;
        let obj = Self {
            node: ObjectNode::new(name)?,
            starts,
            ends,
            data: None,
            uniform: None,
            head: ArrowHead::default(),
            head_size: 2.0,
            line_width: 1.0,
            color: ColorState::named("viridis").into_shared(),
        };
        obj.publish_range();
        Ok(obj)
    }

    /// Arrows along `normals` from `vertices`, `length[i]` long (or
    /// `base_length` when no length vector is given).
    pub fn from_normals(
        name: impl Into<String>,
        vertices: Vec<Vec3>,
        normals: &[Vec3],
        length: Option<&[f32]>,
        base_length: f32,
    ) -> Result<Self> {
        check_len(vertices.len(), normals.len())?;
        if let Some(length) = length {
            check_len(vertices.len(), length.len())?;
        }
        let ends = vertices
            .iter()
            .zip(normals)
            .enumerate()
            .map(|(i, (v, n))| *v + n.normalize_or_zero() * length.map_or(base_length, |l| l[i]))
            .collect();
        Self::from_pairs(name, vertices, ends)
    }

    pub fn n_arrows(&self) -> usize {
        self.starts.len()
    }

    pub fn starts(&self) -> &[Vec3] {
        &self.starts
    }

    pub fn ends(&self) -> &[Vec3] {
        &self.ends
    }

    /// Arrow norms, the default coloring data.
    pub fn lengths(&self) -> Vec<f32> {
        self.starts.iter().zip(&self.ends).map(|(a, b)| a.distance(*b)).collect()
    }

    /// Scalar driving the colors, one per arrow.
    pub fn set_data(&mut self, data: Option<Vec<f32>>) -> Result<()> {
        if let Some(data) = &data {
            check_len(self.n_arrows(), data.len())?;
        }
        self.data = data;
        self.publish_range();
        Ok(())
    }

    fn publish_range(&self) {
        let data = self.data.clone().unwrap_or_else(|| self.lengths());
        self.color.borrow_mut().set_data_range(&data);
    }

    /// One color for every arrow, bypassing the colormap.
    pub fn set_uniform_color(&mut self, color: Option<Vec4>) {
        self.uniform = color;
    }

    pub fn set_head(&mut self, head: ArrowHead, size: f32) -> Result<()> {
        if !(size >= 0.0) {
            return Err(VisbrainError::invalid(format!("arrow head size must be >= 0, got {size}")));
        }
        self.head = head;
        self.head_size = size;
        Ok(())
    }

    pub fn head(&self) -> ArrowHead {
        self.head
    }

    pub fn set_line_width(&mut self, width: f32) {
        self.line_width = width.max(0.0);
    }

    pub fn colors(&self) -> Vec<Vec4> {
        if let Some(color) = self.uniform {
            return vec![color; self.n_arrows()];
        }
        let data = self.data.clone().unwrap_or_else(|| self.lengths());
        array_to_colormap(&data, &self.color.borrow())
    }

    /// Line geometry: positions, per-position colors and segments.
    pub fn geometry(&self) -> (Vec<Vec3>, Vec<Vec4>, Vec<[u32; 2]>) {
        let colors = self.colors();
        let mut positions = Vec::new();
        let mut out_colors = Vec::new();
        let mut segments = Vec::new();
        let mut push = |a: Vec3, b: Vec3, color: Vec4| {
            let i = positions.len() as u32;
            positions.extend([a, b]);
            out_colors.extend([color, color]);
            segments.push([i, i + 1]);
        };
        for ((start, end), color) in self.starts.iter().zip(&self.ends).zip(colors) {
            let dir = (*end - *start).normalize_or_zero();
            push(*start, *end, color);
            if dir != Vec3::ZERO {
                for [a, b] in self.head.segments(*end, dir, self.head_size) {
                    push(a, b, color);
                }
            }
        }
        (positions, out_colors, segments)
    }
}

impl VisbrainObject for VectorObj {
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
        "VectorObj"
    }

    fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        let all: Vec<Vec3> = self.starts.iter().chain(&self.ends).copied().collect();
        bounding_box(&all)
    }

    fn render(&self, ctx: &mut dyn RenderContext) {
        if !self.visible_obj() || self.starts.is_empty() {
            return;
        }
        let (positions, colors, segments) = self.geometry();
        ctx.submit(
            Primitive::Lines {
                positions: Cow::Owned(positions),
                colors: Cow::Owned(colors),
                segments: Cow::Owned(segments),
                width: self.line_width,
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

    #[test]
    fn test_from_normals_scales_by_length() {
        let v = VectorObj::from_normals(
            "v",
            vec![Vec3::ZERO, Vec3::X],
            &[Vec3::Z * 3.0, Vec3::Y],
            Some(&[2.0, 5.0]),
            1.0,
        )
        .unwrap();
        assert_eq!(v.ends(), &[Vec3::new(0.0, 0.0, 2.0), Vec3::new(1.0, 5.0, 0.0)]);
        assert_eq!(v.lengths(), vec![2.0, 5.0]);
        assert!(VectorObj::from_normals("v", vec![Vec3::ZERO], &[], None, 1.0).is_err());
    }

    #[test]
    fn test_head_segments() {
        let mut v = VectorObj::from_pairs("v", vec![Vec3::ZERO], vec![Vec3::X * 10.0]).unwrap();
        let count = |v: &VectorObj| v.geometry().2.len();
        v.set_head(ArrowHead::None, 1.0).unwrap();
        assert_eq!(count(&v), 1);
        v.set_head(ArrowHead::Angle60, 1.0).unwrap();
        assert_eq!(count(&v), 3);
        v.set_head(ArrowHead::Triangle30, 1.0).unwrap();
        assert_eq!(count(&v), 4);
        v.set_head(ArrowHead::Stealth, 1.0).unwrap();
        assert_eq!(count(&v), 5);
        assert!(v.set_head(ArrowHead::Curved, -1.0).is_err());
    }

    #[test]
    fn test_head_names() {
        assert_eq!(ArrowHead::from_name("triangle_60").unwrap(), ArrowHead::Triangle60);
        assert!(ArrowHead::from_name("star").is_err());
    }

    #[test]
    fn test_colors_follow_lengths() {
        let mut v = VectorObj::from_pairs("v", vec![Vec3::ZERO; 2], vec![Vec3::X, Vec3::X * 2.0]).unwrap();
        let colors = v.colors();
        assert_ne!(colors[0], colors[1]);
        let red = Vec4::new(1.0, 0.0, 0.0, 1.0);
        v.set_uniform_color(Some(red));
        assert_eq!(v.colors(), vec![red; 2]);
        assert!(v.set_data(Some(vec![1.0])).is_err());
    }
}

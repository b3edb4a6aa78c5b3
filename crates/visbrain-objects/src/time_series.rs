//! Time-series drawn as small polylines next to their sources.

#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]

use std::borrow::Cow;

use glam::{Vec3, Vec4};
use visbrain_core::error::check_len;
use visbrain_core::mesh::bounding_box;
use visbrain_core::{ObjectNode, Primitive, RenderContext, Result, VisbrainError, VisbrainObject};

/// Default line color.
pub const TS_COLOR: Vec4 = Vec4::new(1.0, 1.0, 1.0, 1.0);

/// One time-series per source position.
pub struct TimeSeriesObj {
    node: ObjectNode,
    positions: Vec<Vec3>,
    /// Row-major `n_sources x n_times`.
    data: Vec<f32>,
    n_times: usize,
    select: Vec<bool>,
    width: f32,
    amplitude: f32,
    translate: Vec3,
    line_width: f32,
    color: Vec4,
}

impl TimeSeriesObj {
    pub fn new(name: impl Into<String>, positions: Vec<Vec3>, data: Vec<f32>, n_times: usize) -> Result<Self> {
        if n_times < 2 {
            return Err(VisbrainError::invalid(format!("a time-series needs at least 2 samples, got {n_times}")));
        }
        check_len(positions.len() * n_times, data.len())?;
        let n = positions.len();
        Ok(Self {
            node: ObjectNode::new(name)?,
            positions,
            data,
            n_times,
            select: vec![true; n],
            width: 20.0,
            amplitude: 6.0,
            translate: Vec3::ZERO,
            line_width: 1.5,
            color: TS_COLOR,
        })
    }

    pub fn n_series(&self) -> usize {
        self.positions.len()
    }

    pub fn n_times(&self) -> usize {
        self.n_times
    }

    pub fn series(&self, i: usize) -> Option<&[f32]> {
        (i < self.n_series()).then(|| &self.data[i * self.n_times..(i + 1) * self.n_times])
    }

    /// Which series are drawn.
    pub fn set_select(&mut self, select: Vec<bool>) -> Result<()> {
        check_len(self.n_series(), select.len())?;
        self.select = select;
        Ok(())
    }

    /// World width of a series and peak-to-peak height.
    pub fn set_shape(&mut self, width: f32, amplitude: f32) -> Result<()> {
        if !(width > 0.0 && amplitude >= 0.0) {
            return Err(VisbrainError::invalid(format!(
                "time-series width {width} must be > 0 and amplitude {amplitude} >= 0"
            )));
        }
        self.width = width;
        self.amplitude = amplitude;
        Ok(())
    }

    pub fn set_translate(&mut self, translate: Vec3) {
        self.translate = translate;
    }

    pub fn set_line_width(&mut self, line_width: f32) {
        self.line_width = line_width.max(0.0);
    }

    /// Line color; the alpha channel sets the transparency.
    pub fn set_color(&mut self, color: Vec4) {
        self.color = color;
    }

    /// Polyline of series `i`: centered on its source, each series scaled
    /// into `[-amplitude / 2, amplitude / 2]` on its own range.
    pub fn polyline(&self, i: usize) -> Option<Vec<Vec3>> {
        let series = self.series(i)?;
        let origin = self.positions[i] + self.translate;
        let range = visbrain_core::color_state::finite_range(series);
        let step = self.width / (self.n_times - 1) as f32;
        Some(
            series
                .iter()
                .enumerate()
                .map(|(t, &v)| {
                    let y = match range {
                        Some((lo, hi)) if hi > lo && v.is_finite() => ((v - lo) / (hi - lo) - 0.5) * self.amplitude,
                        _ => 0.0,
                    };
                    origin + Vec3::new(t as f32 * step - self.width / 2.0, y, 0.0)
                })
                .collect(),
        )
    }
}

impl VisbrainObject for TimeSeriesObj {
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
        "TimeSeriesObj"
    }

    fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        let (min, max) = bounding_box(&self.positions)?;
        let half = Vec3::new(self.width, self.amplitude, 0.0) / 2.0;
        Some((min + self.translate - half, max + self.translate + half))
    }

    fn render(&self, ctx: &mut dyn RenderContext) {
        if !self.visible_obj() {
            return;
        }
        let mut positions = Vec::new();
        let mut segments = Vec::new();
        for i in (0..self.n_series()).filter(|&i| self.select[i]) {
            let Some(line) = self.polyline(i) else {
                continue;
            };
            let first = positions.len() as u32;
            segments.extend((0..line.len() as u32 - 1).map(|t| [first + t, first + t + 1]));
            positions.extend(line);
        }
        if positions.is_empty() {
            return;
        }
        let colors = vec![self.color; positions.len()];
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use visbrain_core::RecordingContext;

    fn ts() -> TimeSeriesObj {
        TimeSeriesObj::new("ts", vec![Vec3::ZERO, Vec3::X * 50.0], vec![0.0, 1.0, 2.0, 5.0, 5.0, 5.0], 3).unwrap()
    }

    #[test]
    fn test_polyline_shape() {
        let t = ts();
        let line = t.polyline(0).unwrap();
        assert_eq!(line[0], Vec3::new(-10.0, -3.0, 0.0));
        assert_eq!(line[1], Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(line[2], Vec3::new(10.0, 3.0, 0.0));
        // Constant series stay flat.
        assert!(t.polyline(1).unwrap().iter().all(|p| p.y == 0.0));
        assert!(t.polyline(2).is_none());
    }

    #[test]
    fn test_validation() {
        assert!(TimeSeriesObj::new("ts", vec![Vec3::ZERO], vec![0.0, 1.0, 2.0], 2).is_err());
        assert!(TimeSeriesObj::new("ts", vec![Vec3::ZERO], vec![0.0], 1).is_err());
        let mut t = ts();
        assert!(t.set_shape(0.0, 1.0).is_err());
        assert!(t.set_select(vec![true]).is_err());
    }

    #[test]
    fn test_render_selected() {
        let mut t = ts();
        t.set_select(vec![false, true]).unwrap();
        let mut ctx = RecordingContext::default();
        t.render(&mut ctx);
        assert_eq!(ctx.submitted.len(), 1);
        t.set_select(vec![false, false]).unwrap();
        let mut ctx = RecordingContext::default();
        t.render(&mut ctx);
        assert!(ctx.submitted.is_empty());
    }
}

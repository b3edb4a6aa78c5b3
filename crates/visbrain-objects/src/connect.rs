//! Connectivity object: weighted edges between nodes.
//!
//! The weights form a dense `k x k` matrix stored row-major. Only the upper
//! triangle (`i < j`) of finite, unmasked entries is drawn.

#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]

use std::borrow::Cow;

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};
use visbrain_core::color_engine::Orientation;
use visbrain_core::mesh::bounding_box;
use visbrain_core::{
    array_to_colormap, vector_to_opacity, ColorState, ObjectNode, Primitive, RenderContext, Result,
    SharedColorState, VisbrainError, VisbrainObject,
};

/// What drives the edge colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectColorBy {
    /// Edge weight.
    #[default]
    Strength,
    /// Number of drawn edges at each node.
    Count,
}

/// Explicit colors for given edge weights.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CustomEdgeColors {
    pub colors: Vec<(f32, Vec4)>,
    /// Color of edges whose weight is not listed; `None` hides them.
    pub default: Option<Vec4>,
}

impl CustomEdgeColors {
    fn lookup(&self, weight: f32) -> Option<Vec4> {
        let tol = f32::EPSILON * weight.abs().max(1.0) * 4.0;
        self.colors
            .iter()
            .find(|(w, _)| (w - weight).abs() <= tol)
            .map(|(_, c)| *c)
            .or(self.default)
    }
}

/// Edge alpha as a function of the weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicAlpha {
    pub range: (f32, f32),
    pub orientation: Orientation,
    pub order: f32,
}

impl Default for DynamicAlpha {
    fn default() -> Self {
        Self {
            range: (0.1, 1.0),
            orientation: Orientation::Ascending,
            order: 1.0,
        }
    }
}

/// One drawn edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub from: usize,
    pub to: usize,
    pub weight: f32,
}

/// A set of weighted links between nodes.
pub struct ConnectObj {
    node: ObjectNode,
    nodes: Vec<Vec3>,
    weights: Vec<f32>,
    /// `true` hides the entry.
    mask: Vec<bool>,
    color_by: ConnectColorBy,
    custom: Option<CustomEdgeColors>,
    dynamic: Option<DynamicAlpha>,
    line_width: f32,
    color: SharedColorState,
}

impl ConnectObj {
    /// `weights` is the row-major `k x k` matrix for the `k` nodes.
    pub fn new(name: impl Into<String>, nodes: Vec<Vec3>, weights: Vec<f32>) -> Result<Self> {
        let mut obj = Self {
            node: ObjectNode::new(name)?,
            nodes: Vec::new(),
            weights: Vec::new(),
            mask: Vec::new(),
            color_by: ConnectColorBy::Strength,
            custom: None,
            dynamic: None,
            line_width: 1.0,
            color: ColorState::named("viridis").into_shared(),
        };
        obj.set_data(nodes, weights, None)?;
        Ok(obj)
    }

    /// Replaces nodes, weights and mask (`None` shows every entry).
    pub fn set_data(&mut self, nodes: Vec<Vec3>, weights: Vec<f32>, mask: Option<Vec<bool>>) -> Result<()> {
        let k = nodes.len();
        if weights.len() != k * k {
            return Err(VisbrainError::SizeMismatch {
                expected: k * k,
                actual: weights.len(),
            });
        }
        let mask = mask.unwrap_or_else(|| vec![false; k * k]);
        visbrain_core::error::check_len(k * k, mask.len())?;
        self.nodes = nodes;
        self.weights = weights;
        self.mask = mask;
        self.publish_range();
        Ok(())
    }

    pub fn nodes(&self) -> &[Vec3] {
        &self.nodes
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn weight(&self, i: usize, j: usize) -> Option<f32> {
        (i < self.n_nodes() && j < self.n_nodes()).then(|| self.weights[i * self.n_nodes() + j])
    }

    pub fn set_mask(&mut self, mask: Vec<bool>) -> Result<()> {
        visbrain_core::error::check_len(self.weights.len(), mask.len())?;
        self.mask = mask;
        self.publish_range();
        Ok(())
    }

    /// Upper-triangular, unmasked, finite edges in row order.
    pub fn edges(&self) -> Vec<Edge> {
        let k = self.n_nodes();
        let mut edges = Vec::new();
        for i in 0..k {
            for j in i + 1..k {
                let at = i * k + j;
                if !self.mask[at] && self.weights[at].is_finite() {
                    edges.push(Edge {
                        from: i,
                        to: j,
                        weight: self.weights[at],
                    });
                }
            }
        }
        edges
    }

    /// Number of drawn edges touching each node.
    pub fn node_degrees(&self) -> Vec<usize> {
        let mut degrees = vec![0; self.n_nodes()];
        for edge in self.edges() {
            degrees[edge.from] += 1;
            degrees[edge.to] += 1;
        }
        degrees
    }

    pub fn set_color_by(&mut self, color_by: ConnectColorBy) {
        self.color_by = color_by;
        self.publish_range();
    }

    /// Values mapped through the colormap: edge weights or node degrees.
    fn colored_values(&self) -> Vec<f32> {
        match self.color_by {
            ConnectColorBy::Strength => self.edges().iter().map(|e| e.weight).collect(),
            ConnectColorBy::Count => self.node_degrees().into_iter().map(|d| d as f32).collect(),
        }
    }

    fn publish_range(&self) {
        self.color.borrow_mut().set_data_range(&self.colored_values());
    }

    pub fn set_custom_colors(&mut self, custom: Option<CustomEdgeColors>) {
        self.custom = custom;
    }

    pub fn set_dynamic(&mut self, dynamic: Option<DynamicAlpha>) {
        self.dynamic = dynamic;
    }

    pub fn set_line_width(&mut self, width: f32) -> Result<()> {
        if !(width > 0.0) {
            return Err(VisbrainError::invalid(format!("line width must be > 0, got {width}")));
        }
        self.line_width = width;
        Ok(())
    }

    pub fn line_width(&self) -> f32 {
        self.line_width
    }

    /// Colors of both ends of every edge, in [`ConnectObj::edges`] order.
    pub fn edge_colors(&self) -> Result<Vec<[Vec4; 2]>> {
        let edges = self.edges();
        let weights: Vec<f32> = edges.iter().map(|e| e.weight).collect();
        let mut colors: Vec<[Vec4; 2]> = if let Some(custom) = &self.custom {
            weights
                .iter()
                .map(|&w| {
                    let c = custom.lookup(w).unwrap_or(Vec4::ZERO);
                    [c, c]
                })
                .collect()
        } else {
            let state = self.color.borrow();
            match self.color_by {
                ConnectColorBy::Strength => array_to_colormap(&weights, &state).into_iter().map(|c| [c, c]).collect(),
                ConnectColorBy::Count => {
                    let degrees: Vec<f32> = self.node_degrees().into_iter().map(|d| d as f32).collect();
                    let node_colors = array_to_colormap(&degrees, &state);
                    edges.iter().map(|e| [node_colors[e.from], node_colors[e.to]]).collect()
                }
            }
        };
        if let Some(dynamic) = &self.dynamic {
            let clim = self.color.borrow().clim();
            let alpha = vector_to_opacity(&weights, clim, dynamic.range, dynamic.orientation, dynamic.order)?;
            for (pair, a) in colors.iter_mut().zip(alpha) {
                for c in pair.iter_mut().filter(|c| c.w > 0.0) {
                    c.w = a;
                }
            }
        }
        Ok(colors)
    }
}

impl VisbrainObject for ConnectObj {
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
        "ConnectObj"
    }

    fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        bounding_box(&self.nodes)
    }

    fn render(&self, ctx: &mut dyn RenderContext) {
        if !self.visible_obj() {
            return;
        }
        let colors = match self.edge_colors() {
            Ok(colors) => colors,
            Err(err) => {
                log::warn!("connectivity '{}' not drawn: {err}", self.name());
                return;
            }
        };
        let edges = self.edges();
        if edges.is_empty() {
            return;
        }
        let positions: Vec<Vec3> = edges.iter().flat_map(|e| [self.nodes[e.from], self.nodes[e.to]]).collect();
        let segments: Vec<[u32; 2]> = (0..edges.len() as u32).map(|e| [2 * e, 2 * e + 1]).collect();
        ctx.submit(
            Primitive::Lines {
                positions: Cow::Owned(positions),
                colors: Cow::Owned(colors.into_iter().flatten().collect()),
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
    use visbrain_core::RecordingContext;

    fn triangle() -> ConnectObj {
        #[rustfmt::skip]
        let weights = vec![
            0.0, 1.0, 2.0,
            1.0, 0.0, f32::NAN,
            2.0, 3.0, 0.0,
        ];
        ConnectObj::new("c", vec![Vec3::ZERO, Vec3::X, Vec3::Y], weights).unwrap()
    }

    #[test]
    fn test_upper_triangle_only() {
        let c = triangle();
        let edges = c.edges();
        assert_eq!(edges.len(), 2);
        assert_eq!((edges[0].from, edges[0].to, edges[0].weight), (0, 1, 1.0));
        assert_eq!((edges[1].from, edges[1].to, edges[1].weight), (0, 2, 2.0));
        assert_eq!(c.node_degrees(), vec![2, 1, 1]);
        assert!(ConnectObj::new("c", vec![Vec3::ZERO], vec![0.0, 1.0]).is_err());
    }

    #[test]
    fn test_mask_hides_edges() {
        let mut c = triangle();
        let mut mask = vec![false; 9];
        mask[1] = true;
        c.set_mask(mask).unwrap();
        assert_eq!(c.edges().len(), 1);
        assert_eq!(c.node_degrees(), vec![1, 0, 1]);
    }

    #[test]
    fn test_custom_colors_with_default() {
        let mut c = triangle();
        let red = Vec4::new(1.0, 0.0, 0.0, 1.0);
        c.set_custom_colors(Some(CustomEdgeColors {
            colors: vec![(2.0, red)],
            default: None,
        }));
        let colors = c.edge_colors().unwrap();
        assert_eq!(colors[0][0].w, 0.0);
        assert_eq!(colors[1], [red, red]);
    }

    #[test]
    fn test_count_mode_colors_by_degree() {
        let mut c = triangle();
        c.set_color_by(ConnectColorBy::Count);
        let colors = c.edge_colors().unwrap();
        // Nodes 1 and 2 have the same degree.
        assert_eq!(colors[0][1], colors[1][1]);
        assert_ne!(colors[0][0], colors[0][1]);
    }

    #[test]
    fn test_dynamic_alpha() {
        let mut c = triangle();
        c.set_dynamic(Some(DynamicAlpha::default()));
        let colors = c.edge_colors().unwrap();
        assert!((colors[0][0].w - 0.1).abs() < 1e-6);
        assert!((colors[1][0].w - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_render_lines() {
        let c = triangle();
        let mut ctx = RecordingContext::default();
        c.render(&mut ctx);
        assert_eq!(ctx.submitted.len(), 1);
        assert_eq!(ctx.submitted[0].0, "lines");
    }

    #[test]
    fn test_line_width_must_be_positive() {
        let mut c = triangle();
        assert!(c.set_line_width(0.0).is_err());
        c.set_line_width(2.5).unwrap();
        assert_eq!(c.line_width(), 2.5);
    }
}

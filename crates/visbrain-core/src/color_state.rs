//! Color state shared by every visualization object.
//!
//! A [`ColorState`] bundles the colormap, its limits, the soft thresholds with
//! their override colors and the translucent window. Objects hand out a
//! [`SharedColorState`] so that a colorbar can mirror them by reference.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec4;
use serde::{Deserialize, Serialize};

use crate::colormap::{ColorMap, ColorMapRegistry};
use crate::error::{Result, VisbrainError};

/// What a scalar is mapped through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cmap {
    /// A named colormap (`"viridis"`, `"Reds_r"`, ...).
    Named(String),
    /// A single color repeated for every value.
    Uniform(Vec4),
    /// An explicit RGBA table, sampled evenly between its rows.
    RgbaTable(Vec<Vec4>),
}

impl Cmap {
    /// A named colormap.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Builds an RGBA table from rows of 3 (RGB) or 4 (RGBA) floats.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        if rows.is_empty() {
            return Err(VisbrainError::invalid("colormap table must have at least one row"));
        }
        let table = rows
            .iter()
            .map(|row| match row.as_slice() {
                [r, g, b] => Ok(Vec4::new(*r, *g, *b, 1.0)),
                [r, g, b, a] => Ok(Vec4::new(*r, *g, *b, *a)),
                other => Err(VisbrainError::invalid(format!(
                    "colormap table rows must have 3 or 4 columns, got {}",
                    other.len()
                ))),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::RgbaTable(table))
    }

    /// Name used when exporting the state to a configuration.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            _ => None,
        }
    }

    pub(crate) fn resolve(&self, alpha: f32, interpolate: bool) -> ResolvedCmap {
        match self {
            Self::Named(name) => ResolvedCmap::Map(ColorMapRegistry::builtin().resolve(name), alpha),
            Self::Uniform(color) => ResolvedCmap::Uniform(Vec4::new(color.x, color.y, color.z, color.w * alpha)),
            Self::RgbaTable(rows) => ResolvedCmap::Table(
                rows.iter().map(|c| Vec4::new(c.x, c.y, c.z, c.w * alpha)).collect(),
                interpolate,
            ),
        }
    }
}

impl Default for Cmap {
    fn default() -> Self {
        Self::Named("viridis".to_string())
    }
}

/// A colormap with its name already looked up.
pub(crate) enum ResolvedCmap {
    Map(ColorMap, f32),
    Uniform(Vec4),
    Table(Vec<Vec4>, bool),
}

impl ResolvedCmap {
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub(crate) fn sample(&self, t: f32) -> Vec4 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Map(map, alpha) => map.sample(t).extend(*alpha),
            Self::Uniform(color) => *color,
            Self::Table(rows, interpolate) => {
                let n = rows.len();
                if n == 1 {
                    return rows[0];
                }
                if *interpolate {
                    let pos = t * (n - 1) as f32;
                    let idx = (pos.floor() as usize).min(n - 2);
                    rows[idx].lerp(rows[idx + 1], pos - idx as f32)
                } else {
                    rows[((t * n as f32) as usize).min(n - 1)]
                }
            }
        }
    }
}

/// A value range inside which colors become fully transparent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Translucent {
    /// Lower bound (inclusive). `None` means unbounded.
    pub low: Option<f32>,
    /// Upper bound (inclusive). `None` means unbounded.
    pub high: Option<f32>,
    /// Width of the Hann window that fades the window edges, in entries of
    /// a 1024-entry table spanning the clim. `0` or `1` gives hard edges.
    #[serde(default)]
    pub fade: usize,
}

impl Translucent {
    /// A hard-edged window.
    pub fn new(low: Option<f32>, high: Option<f32>) -> Result<Self> {
        match (low, high) {
            (None, None) => Err(VisbrainError::invalid("translucent window needs at least one bound")),
            (Some(l), Some(h)) if l > h => Err(VisbrainError::invalid(format!(
                "translucent window ({l}, {h}) is reversed"
            ))),
            _ => Ok(Self { low, high, fade: 0 }),
        }
    }

    /// Sets the Hann fade width.
    #[must_use]
    pub fn with_fade(mut self, fade: usize) -> Self {
        self.fade = fade;
        self
    }

    /// Whether `x` lies inside the window.
    pub fn contains(&self, x: f32) -> bool {
        self.low.map_or(true, |l| x >= l) && self.high.map_or(true, |h| x <= h)
    }
}

/// The colormap attributes of an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorState {
    cmap: Cmap,
    clim: Option<(f32, f32)>,
    vmin: Option<f32>,
    vmax: Option<f32>,
    under: Option<Vec4>,
    over: Option<Vec4>,
    translucent: Option<Translucent>,
    alpha: f32,
    interpolation: bool,
    label: String,
    #[serde(skip)]
    data_range: Option<(f32, f32)>,
    #[serde(skip)]
    revision: u64,
}

/// A color state shared by reference between an object and its colorbar.
pub type SharedColorState = Rc<RefCell<ColorState>>;

impl Default for ColorState {
    fn default() -> Self {
        Self::new(Cmap::default())
    }
}

impl ColorState {
    /// Creates a color state with no limits or thresholds.
    pub fn new(cmap: Cmap) -> Self {
        Self {
            cmap,
            clim: None,
            vmin: None,
            vmax: None,
            under: None,
            over: None,
            translucent: None,
            alpha: 1.0,
            interpolation: true,
            label: String::new(),
            data_range: None,
            revision: 0,
        }
    }

    /// Shorthand for a named colormap.
    pub fn named(name: &str) -> Self {
        Self::new(Cmap::named(name))
    }

    /// Wraps the state for sharing with a colorbar.
    pub fn into_shared(self) -> SharedColorState {
        Rc::new(RefCell::new(self))
    }

    /// Monotonic counter bumped by every setter.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) -> &mut Self {
        self.revision += 1;
        self
    }

    pub fn cmap(&self) -> &Cmap {
        &self.cmap
    }

    pub fn set_cmap(&mut self, cmap: Cmap) -> &mut Self {
        self.cmap = cmap;
        self.touch()
    }

    pub fn clim(&self) -> Option<(f32, f32)> {
        self.clim
    }

    /// Sets the colormap limits. `None` means "use the data range".
    pub fn set_clim(&mut self, clim: Option<(f32, f32)>) -> Result<&mut Self> {
        if let Some((lo, hi)) = clim {
            if lo.is_nan() || hi.is_nan() || lo > hi {
                return Err(VisbrainError::invalid(format!("clim ({lo}, {hi}) must satisfy lo <= hi")));
            }
            for (what, v) in [("vmin", self.vmin), ("vmax", self.vmax)] {
                if let Some(v) = v {
                    if v < lo || v > hi {
                        return Err(VisbrainError::invalid(format!(
                            "{what}={v} falls outside clim ({lo}, {hi})"
                        )));
                    }
                }
            }
        }
        self.clim = clim;
        Ok(self.touch())
    }

    pub fn vmin(&self) -> Option<f32> {
        self.vmin
    }

    /// Sets the lower soft threshold; values below it take the `under` color.
    pub fn set_vmin(&mut self, vmin: Option<f32>) -> Result<&mut Self> {
        self.check_threshold("vmin", vmin)?;
        if let (Some(lo), Some(hi)) = (vmin, self.vmax) {
            if lo > hi {
                return Err(VisbrainError::invalid(format!("vmin={lo} is greater than vmax={hi}")));
            }
        }
        self.vmin = vmin;
        Ok(self.touch())
    }

    pub fn vmax(&self) -> Option<f32> {
        self.vmax
    }

    /// Sets the upper soft threshold; values above it take the `over` color.
    pub fn set_vmax(&mut self, vmax: Option<f32>) -> Result<&mut Self> {
        self.check_threshold("vmax", vmax)?;
        if let (Some(lo), Some(hi)) = (self.vmin, vmax) {
            if lo > hi {
                return Err(VisbrainError::invalid(format!("vmin={lo} is greater than vmax={hi}")));
            }
        }
        self.vmax = vmax;
        Ok(self.touch())
    }

    fn check_threshold(&self, what: &str, value: Option<f32>) -> Result<()> {
        let Some(v) = value else {
            return Ok(());
        };
        if v.is_nan() {
            return Err(VisbrainError::invalid(format!("{what} is NaN")));
        }
        if let Some((lo, hi)) = self.clim {
            if v < lo || v > hi {
                return Err(VisbrainError::invalid(format!(
                    "{what}={v} falls outside clim ({lo}, {hi})"
                )));
            }
        }
        Ok(())
    }

    pub fn under(&self) -> Option<Vec4> {
        self.under
    }

    pub fn set_under(&mut self, under: Option<Vec4>) -> &mut Self {
        self.under = under;
        self.touch()
    }

    pub fn over(&self) -> Option<Vec4> {
        self.over
    }

    pub fn set_over(&mut self, over: Option<Vec4>) -> &mut Self {
        self.over = over;
        self.touch()
    }

    pub fn translucent(&self) -> Option<Translucent> {
        self.translucent
    }

    pub fn set_translucent(&mut self, translucent: Option<Translucent>) -> &mut Self {
        self.translucent = translucent;
        self.touch()
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Global opacity multiplied into every mapped color.
    pub fn set_alpha(&mut self, alpha: f32) -> &mut Self {
        self.alpha = alpha.clamp(0.0, 1.0);
        self.touch()
    }

    /// Whether RGBA tables are linearly interpolated between rows.
    pub fn interpolation(&self) -> bool {
        self.interpolation
    }

    pub fn set_interpolation(&mut self, interpolation: bool) -> &mut Self {
        self.interpolation = interpolation;
        self.touch()
    }

    /// Colorbar label.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) -> &mut Self {
        self.label = label.into();
        self.touch()
    }

    /// Copies the colormap attributes of `other` (cmap, clim, thresholds,
    /// override colors, translucency, label) into `self`.
    pub fn copy_from(&mut self, other: &ColorState) -> &mut Self {
        let (revision, data_range) = (self.revision, self.data_range);
        *self = other.clone();
        self.revision = revision;
        self.data_range = data_range;
        self.touch()
    }

    /// Finite range of the data the owning object maps through this state.
    pub fn data_range(&self) -> Option<(f32, f32)> {
        self.data_range
    }

    /// Records the finite range of the data the owner colors with this
    /// state. Without an explicit clim, that range is what both the owner
    /// and its colorbars use. The revision only moves when the range does.
    pub fn set_data_range(&mut self, data: &[f32]) -> &mut Self {
        let range = finite_range(data);
        if range == self.data_range {
            return self;
        }
        self.data_range = range;
        self.touch()
    }

    /// Limits a colorbar shows: the clim, else the published data range,
    /// else `(0, 1)`.
    pub fn display_clim(&self) -> (f32, f32) {
        self.clim.or(self.data_range).unwrap_or((0.0, 1.0))
    }

    /// Limits effectively used for `data`: the explicit clim, the published
    /// data range, or the finite range of `data` itself (`(0, 1)` when no
    /// finite value exists).
    pub fn effective_clim(&self, data: &[f32]) -> (f32, f32) {
        self.clim
            .or(self.data_range)
            .or_else(|| finite_range(data))
            .unwrap_or((0.0, 1.0))
    }
}

/// Minimum and maximum over the finite values of `data`.
pub fn finite_range(data: &[f32]) -> Option<(f32, f32)> {
    data.iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clim_validation() {
        let mut state = ColorState::default();
        assert!(state.set_clim(Some((1.0, 0.0))).is_err());
        state.set_clim(Some((0.0, 1.0))).unwrap();
        assert!(state.set_vmin(Some(2.0)).is_err());
        state.set_vmin(Some(0.2)).unwrap();
        state.set_vmax(Some(0.8)).unwrap();
        // clim that would exclude an existing threshold is rejected
        assert!(state.set_clim(Some((0.5, 1.0))).is_err());
    }

    #[test]
    fn test_vmin_not_above_vmax() {
        let mut state = ColorState::default();
        state.set_vmax(Some(0.3)).unwrap();
        assert!(state.set_vmin(Some(0.5)).is_err());
    }

    #[test]
    fn test_revision_bumps() {
        let mut state = ColorState::default();
        let r0 = state.revision();
        state.set_cmap(Cmap::named("hot"));
        state.set_alpha(0.5);
        assert_eq!(state.revision(), r0 + 2);
    }

    #[test]
    fn test_from_rows() {
        let cmap = Cmap::from_rows(&[vec![1.0, 0.0, 0.0], vec![0.0, 0.0, 1.0, 0.5]]).unwrap();
        assert_eq!(
            cmap,
            Cmap::RgbaTable(vec![Vec4::new(1.0, 0.0, 0.0, 1.0), Vec4::new(0.0, 0.0, 1.0, 0.5)])
        );
        assert!(Cmap::from_rows(&[vec![1.0, 0.0]]).is_err());
        assert!(Cmap::from_rows(&[]).is_err());
    }

    #[test]
    fn test_cmap_serde_untagged() {
        let named: Cmap = serde_json::from_str("\"hot\"").unwrap();
        assert_eq!(named, Cmap::named("hot"));
        let uniform: Cmap = serde_json::from_str("[1.0, 0.0, 0.0, 1.0]").unwrap();
        assert_eq!(uniform, Cmap::Uniform(Vec4::new(1.0, 0.0, 0.0, 1.0)));
        let table: Cmap = serde_json::from_str("[[1.0, 0.0, 0.0, 1.0], [0.0, 1.0, 0.0, 1.0]]").unwrap();
        assert!(matches!(table, Cmap::RgbaTable(rows) if rows.len() == 2));
    }

    #[test]
    fn test_translucent_window() {
        let tr = Translucent::new(None, Some(0.5)).unwrap();
        assert!(tr.contains(-10.0));
        assert!(tr.contains(0.5));
        assert!(!tr.contains(0.6));
        assert!(Translucent::new(None, None).is_err());
        assert!(Translucent::new(Some(1.0), Some(0.0)).is_err());
    }

    #[test]
    fn test_data_range_feeds_limits() {
        let mut state = ColorState::default();
        assert_eq!(state.display_clim(), (0.0, 1.0));
        let r0 = state.revision();
        state.set_data_range(&[3.0, f32::NAN, -2.0]);
        assert_eq!(state.display_clim(), (-2.0, 3.0));
        assert_eq!(state.effective_clim(&[100.0]), (-2.0, 3.0));
        assert_eq!(state.revision(), r0 + 1);
        // same range, no new revision
        state.set_data_range(&[-2.0, 3.0]);
        assert_eq!(state.revision(), r0 + 1);
        state.set_clim(Some((0.0, 10.0))).unwrap();
        assert_eq!(state.display_clim(), (0.0, 10.0));
    }

    #[test]
    fn test_finite_range() {
        assert_eq!(finite_range(&[f32::NAN, 2.0, -1.0]), Some((-1.0, 2.0)));
        assert_eq!(finite_range(&[f32::NAN]), None);
    }
}

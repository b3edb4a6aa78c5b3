//! Colorbar object.
//!
//! A colorbar mirrors the color state of another object by reference: it
//! holds the same [`SharedColorState`], so any write on the source shows up
//! on the next repaint. Writes are coalesced through the state revision
//! counter, so several assignments between two frames cost one repaint.

#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::Path;

use glam::{Vec3, Vec4};
use visbrain_core::options::{load_config_file, save_config_file};
use visbrain_core::{
    colormap_to_glsl, ColorState, ColorbarConfig, Lut, ObjectNode, Primitive, RenderContext, Result,
    SharedColorState, ViewPreset, VisbrainError, VisbrainObject, DEFAULT_LUT_LEN,
};

/// Rows of the gradient image.
const GRADIENT_ROWS: usize = 256;
/// Half height of the bar in colorbar coordinates.
const HALF_HEIGHT: f32 = 1.0;

/// Lifecycle of a colorbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorbarState {
    /// Owns its color state.
    Detached,
    /// Mirrors another object's color state.
    Bound,
    /// Inside a repaint.
    Rendering,
}

/// A vertical gradient with limits, ticks and a title.
pub struct ColorbarObj {
    node: ObjectNode,
    config: ColorbarConfig,
    color: SharedColorState,
    state: Cell<ColorbarState>,
    bound: bool,
    seen_revision: Cell<Option<u64>>,
    repaints: Cell<usize>,
    lut: RefCell<Option<Lut>>,
    lut_len: usize,
}

impl ColorbarObj {
    /// A detached colorbar with its own default color state.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        Self::from_config(name, ColorbarConfig::default())
    }

    /// A detached colorbar built from a configuration.
    pub fn from_config(name: impl Into<String>, config: ColorbarConfig) -> Result<Self> {
        let mut state = ColorState::default();
        config.apply_to(&mut state)?;
        Ok(Self {
            node: ObjectNode::new(name)?,
            config,
            color: state.into_shared(),
            state: Cell::new(ColorbarState::Detached),
            bound: false,
            seen_revision: Cell::new(None),
            repaints: Cell::new(0),
            lut: RefCell::new(None),
            lut_len: DEFAULT_LUT_LEN,
        })
    }

    /// Loads the entry `name` of a `{object_name: config}` file.
    pub fn from_config_file(path: &Path, name: &str) -> Result<Self> {
        let mut configs = load_config_file(path)?;
        let config = configs
            .remove(name)
            .ok_or_else(|| VisbrainError::ObjectNotFound(name.to_string()))?;
        Self::from_config(name, config)
    }

    /// A colorbar bound to the color state of `obj`.
    pub fn from_object(name: impl Into<String>, obj: &dyn VisbrainObject) -> Result<Self> {
        let mut cbar = Self::new(name)?;
        cbar.update_from(obj)?;
        Ok(cbar)
    }

    /// A colorbar bound to an existing shared state.
    pub fn from_state(name: impl Into<String>, state: SharedColorState) -> Result<Self> {
        let mut cbar = Self::new(name)?;
        cbar.bind(state);
        Ok(cbar)
    }

    /// Mirrors `obj`: its color attributes (cmap, clim, thresholds and
    /// label) are followed from now on.
    pub fn update_from(&mut self, obj: &dyn VisbrainObject) -> Result<()> {
        let state = obj.color_state().ok_or_else(|| {
            VisbrainError::invalid(format!("{} '{}' has no color state", obj.type_name(), obj.name()))
        })?;
        self.bind(state);
        Ok(())
    }

    /// Binds to `state` and repaints once.
    pub fn bind(&mut self, state: SharedColorState) {
        self.color = state;
        self.bound = true;
        self.state.set(ColorbarState::Bound);
        self.repaint();
        log::debug!("colorbar '{}' bound", self.node.name());
    }

    /// Stops mirroring; keeps a private copy of the current attributes.
    pub fn detach(&mut self) {
        let copy = self.color.borrow().clone();
        self.color = copy.into_shared();
        self.bound = false;
        self.state.set(ColorbarState::Detached);
    }

    pub fn state(&self) -> ColorbarState {
        self.state.get()
    }

    /// The mirrored color state.
    pub fn color(&self) -> &SharedColorState {
        &self.color
    }

    /// Number of repaints so far.
    pub fn repaint_count(&self) -> usize {
        self.repaints.get()
    }

    /// Repaints when the mirrored state changed since the last repaint.
    /// Returns whether a repaint happened.
    pub fn sync(&self) -> bool {
        let revision = self.color.borrow().revision();
        if self.seen_revision.get() == Some(revision) {
            return false;
        }
        self.repaint();
        true
    }

    fn repaint(&self) {
        self.state.set(ColorbarState::Rendering);
        let state = self.color.borrow();
        match colormap_to_glsl(&state, self.lut_len) {
            Ok(lut) => *self.lut.borrow_mut() = Some(lut),
            Err(err) => log::warn!("colorbar '{}' not repainted: {err}", self.node.name()),
        }
        self.seen_revision.set(Some(state.revision()));
        self.repaints.set(self.repaints.get() + 1);
        self.state.set(if self.bound {
            ColorbarState::Bound
        } else {
            ColorbarState::Detached
        });
    }

    /// Lookup table of the mirrored state, repainting first if needed.
    pub fn lut(&self) -> Result<Lut> {
        self.sync();
        self.lut
            .borrow()
            .clone()
            .ok_or_else(|| VisbrainError::RenderError("colorbar has no lookup table".to_string()))
    }

    /// Current configuration: mirrored color attributes plus presentation.
    pub fn config(&self) -> ColorbarConfig {
        let mirrored = ColorbarConfig::from_state(&self.color.borrow());
        ColorbarConfig {
            cmap: mirrored.cmap,
            clim: mirrored.clim,
            vmin: mirrored.vmin,
            vmax: mirrored.vmax,
            under: mirrored.under,
            over: mirrored.over,
            cblabel: mirrored.cblabel,
            ..self.config.clone()
        }
    }

    /// Applies a configuration to the mirrored state and presentation.
    pub fn set_config(&mut self, config: ColorbarConfig) -> Result<()> {
        config.apply_to(&mut self.color.borrow_mut())?;
        self.config = config;
        Ok(())
    }

    /// Adds or replaces this colorbar's entry in a config file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut configs = if path.exists() {
            load_config_file(path)?
        } else {
            BTreeMap::new()
        };
        configs.insert(self.node.name().to_string(), self.config());
        save_config_file(path, &configs)
    }

    pub fn set_ndigits(&mut self, ndigits: usize) {
        self.config.ndigits = ndigits;
    }

    pub fn set_txtcolor(&mut self, color: Vec4) {
        self.config.txtcolor = color;
    }

    pub fn set_bgcolor(&mut self, color: Vec4) {
        self.config.bgcolor = color;
    }

    pub fn set_border(&mut self, border: bool, width: f32) {
        self.config.border = border;
        self.config.bw = width.max(0.0);
    }

    pub fn set_limtxt(&mut self, limtxt: bool) {
        self.config.limtxt = limtxt;
    }

    /// Bar width relative to its height.
    pub fn set_width(&mut self, width: f32) -> Result<()> {
        if !(width > 0.0) {
            return Err(VisbrainError::invalid(format!("colorbar width must be > 0, got {width}")));
        }
        self.config.width = width;
        Ok(())
    }

    /// `n` evenly spaced tick values over the limits, formatted with
    /// `ndigits` decimals.
    pub fn tick_labels(&self, n: usize) -> Result<Vec<String>> {
        let (lo, hi) = self.lut()?.clim;
        let digits = self.config.ndigits;
        Ok(match n {
            0 => Vec::new(),
            1 => vec![format!("{:.digits$}", (lo + hi) / 2.0)],
            _ => (0..n)
                .map(|i| format!("{:.digits$}", lo + (hi - lo) * i as f32 / (n - 1) as f32))
                .collect(),
        })
    }

    fn bar_width(&self) -> f32 {
        2.0 * HALF_HEIGHT * self.config.width
    }
}

impl VisbrainObject for ColorbarObj {
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
        "ColorbarObj"
    }

    fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        let w = self.bar_width();
        let margin = self.config.txtsh.max(self.config.cbtxtsh) * 0.2;
        Some((
            Vec3::new(-margin, -HALF_HEIGHT - margin, 0.0),
            Vec3::new(w + 2.0 * margin, HALF_HEIGHT + margin, 0.0),
        ))
    }

    fn render(&self, ctx: &mut dyn RenderContext) {
        if !self.visible_obj() {
            return;
        }
        let lut = match self.lut() {
            Ok(lut) => lut,
            Err(err) => {
                log::warn!("colorbar '{}' not drawn: {err}", self.node.name());
                return;
            }
        };
        let model = self.transform();
        let w = self.bar_width();
        let (min, max) = self.bounding_box().unwrap_or((Vec3::ZERO, Vec3::ZERO));

        ctx.submit(
            Primitive::Image {
                origin: Vec3::new(min.x, max.y, -0.01),
                u_axis: Vec3::new(max.x - min.x, 0.0, 0.0),
                v_axis: Vec3::new(0.0, min.y - max.y, 0.0),
                width: 1,
                height: 1,
                pixels: Cow::Owned(vec![self.config.bgcolor]),
            },
            model,
        );

        // Row 0 is the top of the bar, the high end of the limits.
        let n = lut.len();
        let gradient: Vec<Vec4> = (0..GRADIENT_ROWS)
            .map(|r| {
                let t = 1.0 - r as f32 / (GRADIENT_ROWS - 1) as f32;
                Vec4::from_array(lut.colors[((t * (n - 1) as f32).round() as usize).min(n - 1)])
            })
            .collect();
        ctx.submit(
            Primitive::Image {
                origin: Vec3::new(0.0, HALF_HEIGHT, 0.0),
                u_axis: Vec3::new(w, 0.0, 0.0),
                v_axis: Vec3::new(0.0, -2.0 * HALF_HEIGHT, 0.0),
                width: 1,
                height: GRADIENT_ROWS as u32,
                pixels: Cow::Owned(gradient),
            },
            model,
        );

        if self.config.border && self.config.bw > 0.0 {
            let corners = vec![
                Vec3::new(0.0, -HALF_HEIGHT, 0.001),
                Vec3::new(w, -HALF_HEIGHT, 0.001),
                Vec3::new(w, HALF_HEIGHT, 0.001),
                Vec3::new(0.0, HALF_HEIGHT, 0.001),
            ];
            ctx.submit(
                Primitive::Lines {
                    colors: Cow::Owned(vec![self.config.txtcolor; corners.len()]),
                    positions: Cow::Owned(corners),
                    segments: Cow::Borrowed(&[[0, 1], [1, 2], [2, 3], [3, 0]]),
                    width: self.config.bw,
                },
                model,
            );
        }

        let text_x = w + self.config.txtsh * 0.1;
        if self.config.limtxt {
            let digits = self.config.ndigits;
            for (value, y) in [(lut.clim.1, HALF_HEIGHT), (lut.clim.0, -HALF_HEIGHT)] {
                ctx.submit(
                    Primitive::Text {
                        position: Vec3::new(text_x, y, 0.0),
                        text: Cow::Owned(format!("{value:.digits$}")),
                        color: self.config.txtcolor,
                        size: self.config.txtsz,
                        bold: false,
                    },
                    model,
                );
            }
        }
        if !self.config.cblabel.is_empty() {
            ctx.submit(
                Primitive::Text {
                    position: Vec3::new(w + self.config.cbtxtsh * 0.1, 0.0, 0.0),
                    text: Cow::Borrowed(self.config.cblabel.as_str()),
                    color: self.config.txtcolor,
                    size: self.config.cbtxtsz,
                    bold: true,
                },
                model,
            );
        }
    }

    fn preferred_view(&self) -> ViewPreset {
        ViewPreset::flat()
    }

    fn color_state(&self) -> Option<SharedColorState> {
        Some(self.color.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::BrainObj;
    use visbrain_core::{Cmap, RecordingContext};

    #[test]
    fn test_binding_repaints_once() {
        let brain = BrainObj::new("brain", "sphere").unwrap();
        let cbar = ColorbarObj::from_object("cbar", &brain).unwrap();
        assert_eq!(cbar.state(), ColorbarState::Bound);
        assert_eq!(cbar.repaint_count(), 1);
        assert!(!cbar.sync());
        assert_eq!(cbar.repaint_count(), 1);
    }

    #[test]
    fn test_writes_coalesce_into_one_repaint() {
        let state = ColorState::named("viridis").into_shared();
        let cbar = ColorbarObj::from_state("cbar", state.clone()).unwrap();
        {
            let mut s = state.borrow_mut();
            s.set_clim(Some((0.0, 10.0))).unwrap();
            s.set_cmap(Cmap::named("hot"));
            s.set_label("power");
        }
        assert!(cbar.sync());
        assert!(!cbar.sync());
        assert_eq!(cbar.repaint_count(), 2);
        assert_eq!(cbar.config().cblabel, "power");
    }

    #[test]
    fn test_lut_mirrors_source() {
        let state = ColorState::named("viridis").into_shared();
        let cbar = ColorbarObj::from_state("cbar", state.clone()).unwrap();
        state.borrow_mut().set_clim(Some((-1.0, 1.0))).unwrap();
        let expected = colormap_to_glsl(&state.borrow(), DEFAULT_LUT_LEN).unwrap();
        assert_eq!(cbar.lut().unwrap(), expected);
    }

    #[test]
    fn test_limits_follow_data_range_without_clim() {
        let mut sources = crate::SourceObj::new("s", vec![Vec3::ZERO; 4])
            .unwrap()
            .with_data(vec![0.0, 10.0, 20.0, 30.0])
            .unwrap();
        let mut cbar = ColorbarObj::from_object("cbar", &sources).unwrap();
        cbar.set_ndigits(1);
        assert_eq!(cbar.tick_labels(2).unwrap(), vec!["0.0", "30.0"]);

        let lut = cbar.lut().unwrap();
        let ends = visbrain_core::array_to_colormap(&[0.0, 30.0], &sources.source_color_state().borrow());
        assert_eq!(lut.colors[0], ends[0].to_array());
        assert_eq!(lut.colors[lut.len() - 1], ends[1].to_array());

        sources.set_data(vec![-5.0, 5.0, 0.0, 1.0]).unwrap();
        assert_eq!(cbar.tick_labels(2).unwrap(), vec!["-5.0", "5.0"]);

        sources.source_color_state().borrow_mut().set_clim(Some((1.0, 2.0))).unwrap();
        assert_eq!(cbar.tick_labels(2).unwrap(), vec!["1.0", "2.0"]);
    }

    #[test]
    fn test_detach_keeps_a_copy() {
        let state = ColorState::named("viridis").into_shared();
        let mut cbar = ColorbarObj::from_state("cbar", state.clone()).unwrap();
        cbar.detach();
        state.borrow_mut().set_cmap(Cmap::named("hot"));
        assert_eq!(cbar.state(), ColorbarState::Detached);
        assert_eq!(cbar.color().borrow().cmap(), &Cmap::named("viridis"));
    }

    #[test]
    fn test_object_without_color_state() {
        let ts = crate::time_series::TimeSeriesObj::new("ts", vec![Vec3::ZERO], vec![0.0, 1.0], 2).unwrap();
        assert!(ColorbarObj::from_object("cbar", &ts).is_err());
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cbar.json");
        let mut cbar = ColorbarObj::new("brain").unwrap();
        let mut config = cbar.config();
        config.clim = Some((2.0, 4.0));
        config.ndigits = 1;
        config.cblabel = "t-values".into();
        cbar.set_config(config.clone()).unwrap();
        cbar.save(&path).unwrap();

        let loaded = ColorbarObj::from_config_file(&path, "brain").unwrap();
        assert_eq!(loaded.config(), config);
        assert_eq!(loaded.tick_labels(3).unwrap(), vec!["2.0", "3.0", "4.0"]);
        assert!(matches!(
            ColorbarObj::from_config_file(&path, "other"),
            Err(VisbrainError::ObjectNotFound(_))
        ));
    }

    #[test]
    fn test_render_primitives() {
        let mut cbar = ColorbarObj::new("cbar").unwrap();
        let mut config = cbar.config();
        config.cblabel = "label".into();
        cbar.set_config(config).unwrap();
        let mut ctx = RecordingContext::default();
        cbar.render(&mut ctx);
        let kinds: Vec<_> = ctx.submitted.iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, vec!["image", "image", "lines", "text", "text", "text"]);
    }
}

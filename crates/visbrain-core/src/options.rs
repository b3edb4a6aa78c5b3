//! Configuration: colorbar configs, scene options and the data directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use glam::Vec4;
use serde::{Deserialize, Serialize};

use crate::color::{serde_color, serde_color_opt};
use crate::color_state::{Cmap, ColorState};
use crate::error::Result;

/// Environment variable overriding [`data_dir`].
pub const DATA_DIR_ENV: &str = "VISBRAIN_DATA";

/// Per-object colorbar configuration, stored as a JSON object.
///
/// Field names are part of the file format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorbarConfig {
    pub cmap: Cmap,
    pub clim: Option<(f32, f32)>,
    pub vmin: Option<f32>,
    pub vmax: Option<f32>,
    #[serde(with = "serde_color_opt")]
    pub under: Option<Vec4>,
    #[serde(with = "serde_color_opt")]
    pub over: Option<Vec4>,
    /// Colorbar title.
    pub cblabel: String,
    /// Title text size.
    pub cbtxtsz: f32,
    /// Title offset from the bar.
    pub cbtxtsh: f32,
    #[serde(with = "serde_color")]
    pub txtcolor: Vec4,
    /// Tick text size.
    pub txtsz: f32,
    /// Tick text offset from the bar.
    pub txtsh: f32,
    pub border: bool,
    /// Border width.
    pub bw: f32,
    /// Show the clim values at both ends.
    pub limtxt: bool,
    #[serde(with = "serde_color")]
    pub bgcolor: Vec4,
    /// Digits after the decimal point for tick labels.
    pub ndigits: usize,
    /// Bar width relative to the canvas.
    pub width: f32,
}

impl Default for ColorbarConfig {
    fn default() -> Self {
        Self {
            cmap: Cmap::default(),
            clim: None,
            vmin: None,
            vmax: None,
            under: None,
            over: None,
            cblabel: String::new(),
            cbtxtsz: 5.0,
            cbtxtsh: 2.3,
            txtcolor: Vec4::ONE,
            txtsz: 3.0,
            txtsh: 1.2,
            border: true,
            bw: 2.0,
            limtxt: true,
            bgcolor: Vec4::new(0.1, 0.1, 0.1, 1.0),
            ndigits: 2,
            width: 0.17,
        }
    }
}

impl ColorbarConfig {
    /// Copies the color attributes of `state`, keeping presentation defaults.
    pub fn from_state(state: &ColorState) -> Self {
        Self {
            cmap: state.cmap().clone(),
            clim: state.clim(),
            vmin: state.vmin(),
            vmax: state.vmax(),
            under: state.under(),
            over: state.over(),
            cblabel: state.label().to_string(),
            ..Self::default()
        }
    }

    /// Writes the color attributes into `state`. Thresholds are validated
    /// against the new limits.
    pub fn apply_to(&self, state: &mut ColorState) -> Result<()> {
        state.set_vmin(None)?.set_vmax(None)?;
        state
            .set_cmap(self.cmap.clone())
            .set_under(self.under)
            .set_over(self.over)
            .set_label(self.cblabel.clone());
        state.set_clim(self.clim)?;
        state.set_vmin(self.vmin)?;
        state.set_vmax(self.vmax)?;
        Ok(())
    }
}

/// Reads a `{object_name: config}` file.
pub fn load_config_file(path: &Path) -> Result<BTreeMap<String, ColorbarConfig>> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Writes a `{object_name: config}` file.
pub fn save_config_file(path: &Path, configs: &BTreeMap<String, ColorbarConfig>) -> Result<()> {
    let text = serde_json::to_string_pretty(configs)?;
    fs::write(path, text)?;
    log::info!("colorbar configuration saved to {}", path.display());
    Ok(())
}

/// Options of an off-screen scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneOptions {
    /// Natural canvas size in pixels.
    pub size: (u32, u32),
    #[serde(with = "serde_color")]
    pub bgcolor: Vec4,
    /// Uniform scale applied to every object before it is attached.
    pub fix_gl_factor: f32,
    /// Largest canvas side the backend accepts.
    pub max_canvas_size: u32,
    pub title_size: f32,
    #[serde(with = "serde_color")]
    pub title_color: Vec4,
    pub title_bold: bool,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            size: (800, 600),
            bgcolor: Vec4::new(0.0, 0.0, 0.0, 1.0),
            fix_gl_factor: 100.0,
            max_canvas_size: 8192,
            title_size: 12.0,
            title_color: Vec4::ONE,
            title_bold: true,
        }
    }
}

/// Root of the user data directory: `$VISBRAIN_DATA`, else
/// `$HOME/visbrain_data`, else the temp directory.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .map(|home| home.join("visbrain_data"))
        .unwrap_or_else(|| std::env::temp_dir().join("visbrain_data"))
}

/// Directory holding surface templates.
pub fn templates_dir() -> PathBuf {
    data_dir().join("templates")
}

/// Directory holding ROI volumes.
pub fn roi_dir() -> PathBuf {
    data_dir().join("roi")
}

//! Data to RGBA mapping.
//!
//! All objects color their data through [`array_to_colormap`]; GPU consumers
//! get the same mapping as a fixed-size [`Lut`] from [`colormap_to_glsl`].

use glam::Vec4;
use serde::{Deserialize, Serialize};

use crate::color::clip_color;
use crate::color_state::{finite_range, ColorState, Translucent};
use crate::error::{check_len, Result, VisbrainError};

/// Default number of entries in a GPU lookup table.
pub const DEFAULT_LUT_LEN: usize = 1024;

/// Maps every value of `x` to an RGBA color using `state`.
///
/// Values are normalized by the state's clim (or the finite data range),
/// sampled from the colormap, then overridden by `under`/`over` outside of
/// `vmin..vmax`. Inside the translucent window the alpha drops to zero. NaN
/// values map to transparent black. Every channel of the result is in
/// `[0, 1]`.
pub fn array_to_colormap(x: &[f32], state: &ColorState) -> Vec<Vec4> {
    let (lo, hi) = state.effective_clim(x);
    let cmap = state.cmap().resolve(state.alpha(), state.interpolation());
    let span = hi - lo;
    let normalize = |v: f32| if span > 0.0 { (v - lo) / span } else { 0.0 };

    let under = state.vmin().map(|_| state.under().unwrap_or_else(|| cmap.sample(0.0)));
    let over = state.vmax().map(|_| state.over().unwrap_or_else(|| cmap.sample(1.0)));

    let mut colors: Vec<Vec4> = x
        .iter()
        .map(|&v| {
            if v.is_nan() {
                return Vec4::ZERO;
            }
            if let (Some(vmin), Some(under)) = (state.vmin(), under) {
                if v < vmin {
                    return under;
                }
            }
            if let (Some(vmax), Some(over)) = (state.vmax(), over) {
                if v > vmax {
                    return over;
                }
            }
            cmap.sample(normalize(v))
        })
        .map(clip_color)
        .collect();

    if let Some(translucent) = state.translucent() {
        apply_translucent(&mut colors, x, &translucent, (lo, hi));
    }
    colors
}

/// Drops alpha to zero inside the translucent window.
///
/// With `fade > 1` the window edges are faded over the value axis: the
/// window is sampled on a [`DEFAULT_LUT_LEN`]-entry table spanning `clim`,
/// smoothed by a Hann window of `fade` entries, and every value reads its
/// entry. Equal values therefore always get equal alpha. Values outside
/// `clim` use the hard-edged window.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn apply_translucent(colors: &mut [Vec4], x: &[f32], translucent: &Translucent, clim: (f32, f32)) {
    let (lo, hi) = clim;
    let span = hi - lo;
    let last = DEFAULT_LUT_LEN - 1;
    let faded = (translucent.fade > 1 && span > 0.0).then(|| {
        let table: Vec<f32> = (0..DEFAULT_LUT_LEN)
            .map(|i| {
                let value = lo + span * i as f32 / last as f32;
                if translucent.contains(value) {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        smooth_hann(&table, translucent.fade)
    });
    for (color, &v) in colors.iter_mut().zip(x) {
        if v.is_nan() {
            continue;
        }
        let inside = match &faded {
            Some(table) if (lo..=hi).contains(&v) => {
                let idx = (((v - lo) / span) * last as f32).round() as usize;
                table[idx.min(last)]
            }
            _ => {
                if translucent.contains(v) {
                    1.0
                } else {
                    0.0
                }
            }
        };
        color.w *= (1.0 - inside).clamp(0.0, 1.0);
    }
}

/// Normalized Hann window of `width` samples.
#[allow(clippy::cast_precision_loss)]
pub fn hann_window(width: usize) -> Vec<f32> {
    if width <= 1 {
        return vec![1.0];
    }
    let denom = (width - 1) as f32;
    let raw: Vec<f32> = (0..width)
        .map(|n| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * n as f32 / denom).cos())
        .collect();
    let sum: f32 = raw.iter().sum();
    if sum > 0.0 {
        raw.iter().map(|w| w / sum).collect()
    } else {
        vec![1.0 / width as f32; width]
    }
}

/// Convolves `signal` with a Hann window ("same" size, edge samples repeated).
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn smooth_hann(signal: &[f32], width: usize) -> Vec<f32> {
    let window = hann_window(width);
    let half = (window.len() / 2) as isize;
    let last = signal.len() as isize - 1;
    (0..signal.len() as isize)
        .map(|i| {
            window
                .iter()
                .enumerate()
                .map(|(k, w)| {
                    let j = (i + k as isize - half).clamp(0, last);
                    w * signal[j as usize]
                })
                .sum()
        })
        .collect()
}

/// A GPU-ready colormap lookup table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lut {
    /// RGBA entries, evenly spaced over `clim`.
    pub colors: Vec<[f32; 4]>,
    /// Data range covered by the first and last entries.
    pub clim: (f32, f32),
}

impl Lut {
    /// Number of entries.
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Raw little-endian `f32` RGBA bytes, ready for a texture upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.colors)
    }

    /// GLSL function sampling this table from a 1-row RGBA texture.
    pub fn glsl_snippet(&self, name: &str) -> String {
        let (lo, hi) = self.clim;
        format!(
            "uniform sampler2D u_{name};\n\
             vec4 {name}(float value) {{\n    \
                 float t = clamp((value - ({lo:.6})) / max(({hi:.6}) - ({lo:.6}), 1e-12), 0.0, 1.0);\n    \
                 float texel = (t * float({n} - 1) + 0.5) / float({n});\n    \
                 return texture2D(u_{name}, vec2(texel, 0.5));\n\
             }}\n",
            n = self.colors.len()
        )
    }
}

/// Samples `state` into a `lut_len`-entry lookup table.
///
/// The table spans [`ColorState::display_clim`]: the clim, else the range of
/// the data the owner published, else `(0, 1)`. Thresholds and
/// translucency apply exactly as in [`array_to_colormap`]. A uniform color
/// yields the same color repeated, with the translucent window applied.
#[allow(clippy::cast_precision_loss)]
pub fn colormap_to_glsl(state: &ColorState, lut_len: usize) -> Result<Lut> {
    if lut_len < 2 {
        return Err(VisbrainError::invalid(format!("lut_len must be >= 2, got {lut_len}")));
    }
    let (lo, hi) = state.display_clim();
    let samples: Vec<f32> = (0..lut_len)
        .map(|i| lo + (hi - lo) * i as f32 / (lut_len - 1) as f32)
        .collect();
    let colors = array_to_colormap(&samples, state)
        .into_iter()
        .map(|c| c.to_array())
        .collect();
    Ok(Lut {
        colors,
        clim: (lo, hi),
    })
}

/// Sets the alpha channel of `colors` to `x` linearly rescaled into
/// `dynamic = (lo, hi)`, clamped to `[0, 1]`. With `lo > hi` the alpha is the
/// constant `lo`.
pub fn dynamic_color(colors: &mut [Vec4], x: &[f32], dynamic: (f32, f32)) -> Result<()> {
    check_len(colors.len(), x.len())?;
    let (lo, hi) = dynamic;
    if lo > hi {
        for color in colors.iter_mut() {
            color.w = lo.clamp(0.0, 1.0);
        }
        return Ok(());
    }
    let (xmin, xmax) = finite_range(x).unwrap_or((0.0, 1.0));
    let span = xmax - xmin;
    for (color, &v) in colors.iter_mut().zip(x) {
        let t = if span > 0.0 && v.is_finite() { (v - xmin) / span } else { 0.0 };
        color.w = (lo + t * (hi - lo)).clamp(0.0, 1.0);
    }
    Ok(())
}

/// Shape of the opacity ramp produced by [`vector_to_opacity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Translucent for low values, opaque for high ones.
    #[default]
    Ascending,
    /// Opaque for low values, translucent for high ones.
    Descending,
    /// Opaque at both extremes, translucent in the middle.
    Center,
}

/// Per-element alpha: `x` is normalized by `clim` (or its range), shaped by
/// `orientation`, rescaled into `dynamic` and finally raised to `order`.
pub fn vector_to_opacity(
    x: &[f32],
    clim: Option<(f32, f32)>,
    dynamic: (f32, f32),
    orientation: Orientation,
    order: f32,
) -> Result<Vec<f32>> {
    if order <= 0.0 || order.is_nan() {
        return Err(VisbrainError::invalid(format!("opacity order must be > 0, got {order}")));
    }
    let (lo, hi) = clim.or_else(|| finite_range(x)).unwrap_or((0.0, 1.0));
    if lo > hi {
        return Err(VisbrainError::invalid(format!("clim ({lo}, {hi}) must satisfy lo <= hi")));
    }
    let span = hi - lo;
    let (dmin, dmax) = dynamic;
    Ok(x.iter()
        .map(|&v| {
            let t = if span > 0.0 && v.is_finite() {
                ((v - lo) / span).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let shaped = match orientation {
                Orientation::Ascending => t,
                Orientation::Descending => 1.0 - t,
                Orientation::Center => (2.0 * t - 1.0).abs(),
            };
            (dmin + shaped * (dmax - dmin)).clamp(0.0, 1.0).powf(order)
        })
        .collect())
}

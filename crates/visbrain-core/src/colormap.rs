//! Named colormaps.
//!
//! Every colormap is a list of evenly spaced RGB control points sampled with
//! linear interpolation. Names follow matplotlib (case-insensitive) and any
//! name can take a `_r` suffix to reverse it.

use std::collections::HashMap;
use std::sync::OnceLock;

use glam::Vec3;

/// Colormap used whenever a requested name is unknown.
pub const FALLBACK_COLORMAP: &str = "viridis";

/// A color map for mapping scalar values to colors.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorMap {
    /// Color map name.
    pub name: String,
    /// Color samples (evenly spaced from 0 to 1).
    pub colors: Vec<Vec3>,
}

impl ColorMap {
    /// Creates a new color map.
    pub fn new(name: impl Into<String>, colors: Vec<Vec3>) -> Self {
        Self {
            name: name.into(),
            colors,
        }
    }

    /// Samples the color map at a given value (0 to 1).
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn sample(&self, t: f32) -> Vec3 {
        let t = t.clamp(0.0, 1.0);

        if self.colors.is_empty() {
            return Vec3::ZERO;
        }

        if self.colors.len() == 1 {
            return self.colors[0];
        }

        let n = self.colors.len() - 1;
        let idx = (t * n as f32).floor() as usize;
        let idx = idx.min(n - 1);
        let frac = t * n as f32 - idx as f32;

        self.colors[idx].lerp(self.colors[idx + 1], frac)
    }

    /// Returns the same colormap with its control points reversed.
    #[must_use]
    pub fn reversed(&self) -> Self {
        let mut colors = self.colors.clone();
        colors.reverse();
        Self::new(format!("{}_r", self.name), colors)
    }
}

/// Registry for looking up color maps by name.
#[derive(Default)]
pub struct ColorMapRegistry {
    color_maps: HashMap<String, ColorMap>,
}

impl ColorMapRegistry {
    /// Creates a new color map registry with the built-in color maps.
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.register_defaults();
        registry
    }

    /// Shared registry holding the built-in color maps.
    pub fn builtin() -> &'static ColorMapRegistry {
        static BUILTIN: OnceLock<ColorMapRegistry> = OnceLock::new();
        BUILTIN.get_or_init(ColorMapRegistry::new)
    }

    /// Registers a color map. Names are stored lower-case.
    pub fn register(&mut self, mut color_map: ColorMap) {
        color_map.name = color_map.name.to_ascii_lowercase();
        self.color_maps.insert(color_map.name.clone(), color_map);
    }

    /// Gets a color map by name, honoring the `_r` suffix.
    pub fn get(&self, name: &str) -> Option<ColorMap> {
        let lower = name.to_ascii_lowercase();
        if let Some(cmap) = self.color_maps.get(&lower) {
            return Some(cmap.clone());
        }
        lower
            .strip_suffix("_r")
            .and_then(|base| self.color_maps.get(base))
            .map(ColorMap::reversed)
    }

    /// Whether `name` resolves to a known color map.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Resolves a name, falling back to viridis with a warning.
    pub fn resolve(&self, name: &str) -> ColorMap {
        self.get(name).unwrap_or_else(|| {
            log::warn!("unknown colormap '{name}', falling back to '{FALLBACK_COLORMAP}'");
            self.color_maps[FALLBACK_COLORMAP].clone()
        })
    }

    /// Returns all color map names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.color_maps.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn register_rgb(&mut self, name: &str, points: &[[f32; 3]]) {
        let colors = points.iter().map(|p| Vec3::from_array(*p)).collect();
        self.register(ColorMap::new(name, colors));
    }

    #[allow(clippy::too_many_lines)]
    fn register_defaults(&mut self) {
        self.register_rgb(
            "viridis",
            &[
                [0.267, 0.004, 0.329],
                [0.282, 0.140, 0.457],
                [0.253, 0.265, 0.529],
                [0.206, 0.371, 0.553],
                [0.163, 0.471, 0.558],
                [0.127, 0.566, 0.550],
                [0.134, 0.658, 0.517],
                [0.266, 0.749, 0.440],
                [0.477, 0.821, 0.318],
                [0.741, 0.873, 0.150],
                [0.993, 0.906, 0.144],
            ],
        );
        self.register_rgb(
            "plasma",
            &[
                [0.050, 0.030, 0.528],
                [0.254, 0.014, 0.615],
                [0.417, 0.001, 0.658],
                [0.562, 0.051, 0.642],
                [0.692, 0.165, 0.565],
                [0.798, 0.280, 0.470],
                [0.881, 0.392, 0.384],
                [0.949, 0.517, 0.295],
                [0.988, 0.652, 0.211],
                [0.988, 0.807, 0.145],
                [0.940, 0.975, 0.131],
            ],
        );
        self.register_rgb(
            "inferno",
            &[
                [0.001, 0.000, 0.014],
                [0.087, 0.045, 0.225],
                [0.258, 0.039, 0.406],
                [0.416, 0.090, 0.433],
                [0.578, 0.148, 0.404],
                [0.735, 0.216, 0.330],
                [0.865, 0.317, 0.226],
                [0.955, 0.468, 0.100],
                [0.988, 0.645, 0.040],
                [0.964, 0.840, 0.191],
                [0.988, 0.998, 0.645],
            ],
        );
        self.register_rgb(
            "magma",
            &[
                [0.001, 0.000, 0.014],
                [0.078, 0.054, 0.212],
                [0.232, 0.060, 0.437],
                [0.390, 0.100, 0.502],
                [0.550, 0.161, 0.506],
                [0.716, 0.215, 0.475],
                [0.868, 0.288, 0.409],
                [0.967, 0.439, 0.360],
                [0.994, 0.624, 0.427],
                [0.996, 0.812, 0.572],
                [0.987, 0.991, 0.750],
            ],
        );
        self.register_rgb(
            "cividis",
            &[
                [0.000, 0.135, 0.305],
                [0.000, 0.192, 0.420],
                [0.188, 0.255, 0.431],
                [0.310, 0.322, 0.431],
                [0.408, 0.389, 0.447],
                [0.500, 0.458, 0.467],
                [0.596, 0.529, 0.467],
                [0.698, 0.604, 0.447],
                [0.804, 0.682, 0.408],
                [0.914, 0.765, 0.345],
                [0.995, 0.909, 0.218],
            ],
        );
        self.register_rgb("gray", &[[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]]);
        self.register_rgb("grey", &[[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]]);
        self.register_rgb(
            "hot",
            &[
                [0.042, 0.0, 0.0],
                [0.380, 0.0, 0.0],
                [0.720, 0.0, 0.0],
                [1.0, 0.030, 0.0],
                [1.0, 0.350, 0.0],
                [1.0, 0.680, 0.0],
                [1.0, 1.0, 0.020],
                [1.0, 1.0, 0.510],
                [1.0, 1.0, 1.0],
            ],
        );
        self.register_rgb("cool", &[[0.0, 1.0, 1.0], [1.0, 0.0, 1.0]]);
        self.register_rgb("spring", &[[1.0, 0.0, 1.0], [1.0, 1.0, 0.0]]);
        self.register_rgb("summer", &[[0.0, 0.5, 0.4], [1.0, 1.0, 0.4]]);
        self.register_rgb("autumn", &[[1.0, 0.0, 0.0], [1.0, 1.0, 0.0]]);
        self.register_rgb("winter", &[[0.0, 0.0, 1.0], [0.0, 1.0, 0.5]]);
        self.register_rgb(
            "jet",
            &[
                [0.0, 0.0, 0.5],
                [0.0, 0.0, 1.0],
                [0.0, 0.5, 1.0],
                [0.0, 1.0, 1.0],
                [0.5, 1.0, 0.5],
                [1.0, 1.0, 0.0],
                [1.0, 0.5, 0.0],
                [1.0, 0.0, 0.0],
                [0.5, 0.0, 0.0],
            ],
        );
        self.register_rgb(
            "hsv",
            &[
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 1.0, 1.0],
                [0.0, 0.0, 1.0],
                [1.0, 0.0, 1.0],
                [1.0, 0.0, 0.0],
            ],
        );
        self.register_rgb(
            "rainbow",
            &[
                [0.5, 0.0, 1.0],
                [0.0, 0.0, 1.0],
                [0.0, 1.0, 1.0],
                [0.0, 1.0, 0.0],
                [1.0, 1.0, 0.0],
                [1.0, 0.0, 0.0],
            ],
        );
        self.register_rgb(
            "coolwarm",
            &[
                [0.230, 0.299, 0.754],
                [0.552, 0.690, 0.996],
                [0.866, 0.866, 0.866],
                [0.956, 0.604, 0.486],
                [0.706, 0.016, 0.150],
            ],
        );
        self.register_rgb("bwr", &[[0.0, 0.0, 1.0], [1.0, 1.0, 1.0], [1.0, 0.0, 0.0]]);
        self.register_rgb(
            "seismic",
            &[
                [0.0, 0.0, 0.3],
                [0.0, 0.0, 1.0],
                [1.0, 1.0, 1.0],
                [1.0, 0.0, 0.0],
                [0.5, 0.0, 0.0],
            ],
        );
        self.register_rgb(
            "rdbu",
            &[
                [0.404, 0.000, 0.122],
                [0.698, 0.094, 0.169],
                [0.839, 0.376, 0.302],
                [0.957, 0.647, 0.510],
                [0.992, 0.859, 0.780],
                [0.969, 0.969, 0.969],
                [0.820, 0.898, 0.941],
                [0.573, 0.773, 0.871],
                [0.263, 0.576, 0.765],
                [0.129, 0.400, 0.675],
                [0.020, 0.188, 0.380],
            ],
        );
        self.register_rgb(
            "spectral",
            &[
                [0.620, 0.004, 0.259],
                [0.835, 0.243, 0.310],
                [0.957, 0.427, 0.263],
                [0.992, 0.682, 0.380],
                [0.996, 0.878, 0.545],
                [1.000, 1.000, 0.749],
                [0.902, 0.961, 0.596],
                [0.671, 0.867, 0.643],
                [0.400, 0.761, 0.647],
                [0.196, 0.533, 0.741],
                [0.369, 0.310, 0.635],
            ],
        );
        self.register_rgb(
            "blues",
            &[
                [0.969, 0.984, 1.000],
                [0.871, 0.922, 0.969],
                [0.776, 0.859, 0.937],
                [0.620, 0.792, 0.882],
                [0.419, 0.682, 0.839],
                [0.259, 0.573, 0.776],
                [0.129, 0.443, 0.710],
                [0.031, 0.318, 0.612],
                [0.031, 0.188, 0.420],
            ],
        );
        self.register_rgb(
            "reds",
            &[
                [1.000, 0.961, 0.941],
                [0.996, 0.878, 0.824],
                [0.988, 0.733, 0.631],
                [0.988, 0.573, 0.447],
                [0.984, 0.416, 0.290],
                [0.937, 0.231, 0.173],
                [0.796, 0.094, 0.114],
                [0.647, 0.059, 0.082],
                [0.404, 0.000, 0.051],
            ],
        );
        self.register_rgb(
            "greens",
            &[
                [0.969, 0.988, 0.961],
                [0.898, 0.961, 0.878],
                [0.780, 0.914, 0.753],
                [0.631, 0.851, 0.608],
                [0.455, 0.769, 0.463],
                [0.255, 0.671, 0.365],
                [0.137, 0.545, 0.271],
                [0.000, 0.427, 0.173],
                [0.000, 0.267, 0.106],
            ],
        );
        self.register_rgb(
            "greys",
            &[
                [1.000, 1.000, 1.000],
                [0.941, 0.941, 0.941],
                [0.851, 0.851, 0.851],
                [0.741, 0.741, 0.741],
                [0.588, 0.588, 0.588],
                [0.451, 0.451, 0.451],
                [0.322, 0.322, 0.322],
                [0.145, 0.145, 0.145],
                [0.000, 0.000, 0.000],
            ],
        );
        self.register_rgb(
            "oranges",
            &[
                [1.000, 0.961, 0.922],
                [0.996, 0.902, 0.808],
                [0.992, 0.816, 0.635],
                [0.992, 0.682, 0.420],
                [0.992, 0.553, 0.235],
                [0.945, 0.412, 0.075],
                [0.851, 0.282, 0.004],
                [0.651, 0.212, 0.012],
                [0.498, 0.153, 0.016],
            ],
        );
        self.register_rgb(
            "purples",
            &[
                [0.988, 0.984, 0.992],
                [0.937, 0.929, 0.961],
                [0.855, 0.855, 0.922],
                [0.737, 0.741, 0.863],
                [0.620, 0.604, 0.784],
                [0.502, 0.490, 0.729],
                [0.416, 0.318, 0.639],
                [0.329, 0.153, 0.561],
                [0.247, 0.000, 0.490],
            ],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_endpoints() {
        let reg = ColorMapRegistry::new();
        let gray = reg.get("gray").unwrap();
        assert_eq!(gray.sample(0.0), Vec3::ZERO);
        assert_eq!(gray.sample(1.0), Vec3::ONE);
        assert!((gray.sample(0.25) - Vec3::splat(0.25)).length() < 1e-6);
        // out of range is clamped
        assert_eq!(gray.sample(-3.0), Vec3::ZERO);
    }

    #[test]
    fn test_case_insensitive_and_reversed() {
        let reg = ColorMapRegistry::new();
        let blues = reg.get("Blues").unwrap();
        let blues_r = reg.get("Blues_r").unwrap();
        assert_eq!(blues.sample(0.0), blues_r.sample(1.0));
        assert_eq!(blues_r.name, "blues_r");
    }

    #[test]
    fn test_resolve_fallback() {
        let reg = ColorMapRegistry::new();
        assert!(!reg.contains("does-not-exist"));
        assert_eq!(reg.resolve("does-not-exist").name, FALLBACK_COLORMAP);
    }

    #[test]
    fn test_names_sorted() {
        let names = ColorMapRegistry::builtin().names();
        assert!(names.contains(&"viridis"));
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
    }
}

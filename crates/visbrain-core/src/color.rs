//! Color parsing.
//!
//! Colors are stored as [`Vec4`] RGBA with every channel in `[0, 1]`.

use glam::Vec4;

use crate::error::{Result, VisbrainError};

/// Named colors recognized by [`parse_color`] (matplotlib/CSS names).
const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("red", [255, 0, 0]),
    ("green", [0, 128, 0]),
    ("lime", [0, 255, 0]),
    ("blue", [0, 0, 255]),
    ("yellow", [255, 255, 0]),
    ("cyan", [0, 255, 255]),
    ("magenta", [255, 0, 255]),
    ("orange", [255, 165, 0]),
    ("purple", [128, 0, 128]),
    ("pink", [255, 192, 203]),
    ("brown", [165, 42, 42]),
    ("gray", [128, 128, 128]),
    ("grey", [128, 128, 128]),
    ("lightgray", [211, 211, 211]),
    ("lightgrey", [211, 211, 211]),
    ("darkgray", [169, 169, 169]),
    ("darkgrey", [169, 169, 169]),
    ("dimgray", [105, 105, 105]),
    ("dimgrey", [105, 105, 105]),
    ("darkred", [139, 0, 0]),
    ("darkblue", [0, 0, 139]),
    ("darkgreen", [0, 100, 0]),
    ("navy", [0, 0, 128]),
    ("teal", [0, 128, 128]),
    ("olive", [128, 128, 0]),
    ("maroon", [128, 0, 0]),
    ("gold", [255, 215, 0]),
    ("silver", [192, 192, 192]),
    ("crimson", [220, 20, 60]),
    ("indigo", [75, 0, 130]),
    ("violet", [238, 130, 238]),
    ("slateblue", [106, 90, 205]),
    ("steelblue", [70, 130, 180]),
    ("orchid", [218, 112, 214]),
    ("salmon", [250, 128, 114]),
    ("turquoise", [64, 224, 208]),
    ("chartreuse", [127, 255, 0]),
    ("ivory", [255, 255, 240]),
];

/// Parses a color from a name (`"red"`), a hex string (`"#ff0000"`,
/// `"#ff000080"`) or the special value `"none"` (transparent black).
pub fn parse_color(spec: &str) -> Result<Vec4> {
    let lower = spec.trim().to_ascii_lowercase();
    if lower == "none" || lower == "transparent" {
        return Ok(Vec4::ZERO);
    }
    if let Some(hex) = lower.strip_prefix('#') {
        return parse_hex(hex).ok_or_else(|| VisbrainError::invalid(format!("bad hex color '{spec}'")));
    }
    NAMED_COLORS
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, rgb)| from_u8(*rgb, 1.0))
        .ok_or_else(|| VisbrainError::invalid(format!("unknown color '{spec}'")))
}

fn parse_hex(hex: &str) -> Option<Vec4> {
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    match hex.len() {
        6 => Some(from_u8([channel(0)?, channel(2)?, channel(4)?], 1.0)),
        8 => Some(from_u8(
            [channel(0)?, channel(2)?, channel(4)?],
            f32::from(channel(6)?) / 255.0,
        )),
        _ => None,
    }
}

fn from_u8(rgb: [u8; 3], alpha: f32) -> Vec4 {
    Vec4::new(
        f32::from(rgb[0]) / 255.0,
        f32::from(rgb[1]) / 255.0,
        f32::from(rgb[2]) / 255.0,
        alpha,
    )
}

/// Clamps every channel of a color into `[0, 1]`.
#[must_use]
pub fn clip_color(color: Vec4) -> Vec4 {
    color.clamp(Vec4::ZERO, Vec4::ONE)
}

/// Formats a color as `#rrggbbaa`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn to_hex(color: Vec4) -> String {
    let c = clip_color(color) * 255.0;
    format!(
        "#{:02x}{:02x}{:02x}{:02x}",
        c.x.round() as u8,
        c.y.round() as u8,
        c.z.round() as u8,
        c.w.round() as u8
    )
}

/// A color as written in a config file: a name, a hex string or an RGB(A)
/// float array.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum ColorInput {
    Text(String),
    Rgba([f32; 4]),
    Rgb([f32; 3]),
}

impl ColorInput {
    fn into_color(self) -> Result<Vec4> {
        match self {
            Self::Text(text) => parse_color(&text),
            Self::Rgba(c) => Ok(clip_color(Vec4::from_array(c))),
            Self::Rgb([r, g, b]) => Ok(clip_color(Vec4::new(r, g, b, 1.0))),
        }
    }
}

/// Serde helpers storing a [`Vec4`] color as an `[r, g, b, a]` float array.
/// Names and hex strings are accepted when reading.
pub mod serde_color {
    use glam::Vec4;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(color: &Vec4, s: S) -> Result<S::Ok, S::Error> {
        color.to_array().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec4, D::Error> {
        super::ColorInput::deserialize(d)?
            .into_color()
            .map_err(serde::de::Error::custom)
    }
}

/// Same as [`serde_color`] for optional colors.
pub mod serde_color_opt {
    use glam::Vec4;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(color: &Option<Vec4>, s: S) -> Result<S::Ok, S::Error> {
        color.as_ref().map(Vec4::to_array).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec4>, D::Error> {
        Option::<super::ColorInput>::deserialize(d)?
            .map(|c| c.into_color().map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_colors() {
        assert_eq!(parse_color("red").unwrap(), Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(parse_color("  Blue ").unwrap(), Vec4::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(parse_color("none").unwrap(), Vec4::ZERO);
    }

    #[test]
    fn test_hex_colors() {
        let c = parse_color("#00ff0080").unwrap();
        assert_eq!(c.y, 1.0);
        assert!((c.w - 128.0 / 255.0).abs() < 1e-6);
        assert!(parse_color("#12345").is_err());
    }

    #[test]
    fn test_unknown_color() {
        assert!(matches!(
            parse_color("not-a-color"),
            Err(VisbrainError::InvalidValue(_))
        ));
    }

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Colored {
        #[serde(with = "serde_color")]
        color: Vec4,
        #[serde(with = "serde_color_opt")]
        under: Option<Vec4>,
    }

    #[test]
    fn test_serde_color_writes_floats() {
        let value = Colored {
            color: Vec4::new(0.1, 0.2, 0.3, 1.0),
            under: None,
        };
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"color":[0.1,0.2,0.3,1.0],"under":null}"#);
        assert_eq!(serde_json::from_str::<Colored>(&json).unwrap(), value);
    }

    #[test]
    fn test_serde_color_reads_names_and_hex() {
        let read: Colored = serde_json::from_str(r##"{"color": "#ff000080", "under": "blue"}"##).unwrap();
        assert_eq!(read.color.x, 1.0);
        assert!((read.color.w - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(read.under, Some(Vec4::new(0.0, 0.0, 1.0, 1.0)));

        let rgb: Colored = serde_json::from_str(r#"{"color": [0.5, 0.5, 0.5], "under": [2.0, 0, 0, 1]}"#).unwrap();
        assert_eq!(rgb.color, Vec4::new(0.5, 0.5, 0.5, 1.0));
        assert_eq!(rgb.under, Some(Vec4::new(1.0, 0.0, 0.0, 1.0)));
        assert!(serde_json::from_str::<Colored>(r#"{"color": "nope", "under": null}"#).is_err());
    }

    #[test]
    fn test_hex_round_trip() {
        let c = Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert_eq!(to_hex(c), "#ff0000ff");
        assert_eq!(parse_color(&to_hex(c)).unwrap(), c);
    }
}

//! Preferred camera descriptions.
//!
//! Objects describe the camera they would like to be seen through with a
//! [`ViewPreset`]; the scene turns it into a real camera.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VisbrainError};

/// Camera projection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Projection {
    /// Perspective projection.
    #[default]
    Perspective,
    /// Orthographic projection, used by flat objects (pictures, slices).
    Orthographic,
}

/// A named or custom viewing direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    Top,
    Bottom,
    Left,
    Right,
    Front,
    Back,
    /// Explicit `(azimuth, elevation)` in degrees.
    Custom { azimuth: f32, elevation: f32 },
}

impl Rotation {
    /// Parses `top|bottom|left|right|front|back`.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "top" => Ok(Self::Top),
            "bottom" => Ok(Self::Bottom),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "front" => Ok(Self::Front),
            "back" => Ok(Self::Back),
            other => Err(VisbrainError::invalid(format!(
                "unknown rotation '{other}', use top, bottom, left, right, front or back"
            ))),
        }
    }

    /// `(azimuth, elevation)` in degrees. Azimuth 0 looks from the back
    /// (camera on -y), elevation 90 looks down from the top.
    pub fn angles(self) -> (f32, f32) {
        match self {
            Self::Top => (0.0, 90.0),
            Self::Bottom => (180.0, -90.0),
            Self::Left => (-90.0, 0.0),
            Self::Right => (90.0, 0.0),
            Self::Front => (180.0, 0.0),
            Self::Back => (0.0, 0.0),
            Self::Custom { azimuth, elevation } => (azimuth, elevation),
        }
    }
}

/// The camera an object would like to be seen through.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewPreset {
    pub projection: Projection,
    /// Degrees around the vertical (z) axis.
    pub azimuth: f32,
    /// Degrees above the horizontal plane.
    pub elevation: f32,
    /// Vertical field of view in degrees.
    pub fov: f32,
    /// Multiplier on the fitted camera distance.
    pub scale_factor: f32,
    /// Explicit point to look at; `None` centers on the object.
    pub center: Option<Vec3>,
}

impl Default for ViewPreset {
    fn default() -> Self {
        Self {
            projection: Projection::Perspective,
            azimuth: 0.0,
            elevation: 90.0,
            fov: 45.0,
            scale_factor: 1.0,
            center: None,
        }
    }
}

impl ViewPreset {
    /// A flat orthographic view looking down the z axis.
    pub fn flat() -> Self {
        Self {
            projection: Projection::Orthographic,
            ..Self::default()
        }
    }

    /// Returns the preset turned to `rotation`.
    #[must_use]
    pub fn rotated(mut self, rotation: Rotation) -> Self {
        (self.azimuth, self.elevation) = rotation.angles();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_names() {
        assert_eq!(Rotation::from_name("Left").unwrap(), Rotation::Left);
        assert!(Rotation::from_name("sideways").is_err());
        assert_eq!(Rotation::Top.angles(), (0.0, 90.0));
        let custom = Rotation::Custom {
            azimuth: 10.0,
            elevation: 20.0,
        };
        assert_eq!(ViewPreset::default().rotated(custom).azimuth, 10.0);
    }
}

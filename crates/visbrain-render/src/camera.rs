//! Turntable camera.
//!
//! The camera orbits a target point at a given distance. Its direction is
//! given by an azimuth around the vertical (z) axis and an elevation above
//! the horizontal plane; azimuth 0 looks from the back of the head (camera
//! on -y) and elevation 90 looks down from the top.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use visbrain_core::view::{Projection, Rotation, ViewPreset};

/// A serializable snapshot of a camera, used to restore or share views.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub azimuth: f32,
    pub elevation: f32,
    pub distance: f32,
    pub target: Vec3,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub projection: Projection,
    pub ortho_scale: f32,
}

/// A 3D camera for viewing a subplot.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Point the camera is looking at.
    pub target: Vec3,
    /// Degrees around the z axis.
    pub azimuth: f32,
    /// Degrees above the horizontal plane.
    pub elevation: f32,
    /// Distance from the target.
    pub distance: f32,
    /// Field of view in radians.
    pub fov: f32,
    /// Aspect ratio (width / height).
    pub aspect_ratio: f32,
    /// Near clipping plane.
    pub near: f32,
    /// Far clipping plane.
    pub far: f32,
    /// Projection mode.
    pub projection: Projection,
    /// Half height of the orthographic view volume.
    pub ortho_scale: f32,
}

impl Camera {
    /// Creates a new camera with default settings.
    #[must_use]
    pub fn new(aspect_ratio: f32) -> Self {
        Self {
            target: Vec3::ZERO,
            azimuth: 0.0,
            elevation: 90.0,
            distance: 3.0,
            fov: std::f32::consts::FRAC_PI_4, // 45 degrees
            aspect_ratio,
            near: 0.01,
            far: 1000.0,
            projection: Projection::Perspective,
            ortho_scale: 1.0,
        }
    }

    /// Builds the camera an object asked for, fitted to `bbox`.
    #[must_use]
    pub fn from_preset(preset: &ViewPreset, bbox: Option<(Vec3, Vec3)>, aspect_ratio: f32) -> Self {
        let mut camera = Self::new(aspect_ratio);
        camera.projection = preset.projection;
        camera.set_fov_degrees(preset.fov);
        camera.azimuth = preset.azimuth;
        camera.elevation = preset.elevation;
        if let Some((min, max)) = bbox {
            camera.look_at_box(min, max);
        }
        camera.distance *= preset.scale_factor.max(0.01);
        camera.ortho_scale *= preset.scale_factor.max(0.01);
        if let Some(center) = preset.center {
            camera.target = center;
        }
        camera
    }

    /// Sets the aspect ratio.
    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
    }

    /// Unit vector from the target towards the camera.
    #[must_use]
    pub fn direction(&self) -> Vec3 {
        let (az, el) = (self.azimuth.to_radians(), self.elevation.to_radians());
        Vec3::new(az.sin() * el.cos(), -az.cos() * el.cos(), el.sin())
    }

    /// Camera position in world space.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.target + self.direction() * self.distance
    }

    /// Returns the camera's forward direction.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        -self.direction()
    }

    /// Returns the camera's right direction. Stays defined at the poles.
    #[must_use]
    pub fn right(&self) -> Vec3 {
        let az = self.azimuth.to_radians();
        Vec3::new(az.cos(), az.sin(), 0.0)
    }

    /// Screen-up direction.
    #[must_use]
    pub fn up(&self) -> Vec3 {
        self.right().cross(self.forward()).normalize_or_zero()
    }

    /// Returns the view matrix.
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, self.up())
    }

    /// Returns the projection matrix.
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        match self.projection {
            Projection::Perspective => Mat4::perspective_rh(self.fov, self.aspect_ratio, self.near, self.far),
            Projection::Orthographic => {
                let half_height = self.ortho_scale;
                let half_width = half_height * self.aspect_ratio;
                // Symmetric depth range around the target so nothing between
                // the camera and the focus point is clipped.
                let ortho_depth = (self.distance + self.far).max(self.ortho_scale * 100.0);
                Mat4::orthographic_rh(-half_width, half_width, -half_height, half_height, -ortho_depth, ortho_depth)
            }
        }
    }

    /// Returns the combined view-projection matrix.
    #[must_use]
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Turns the camera to a preset or custom direction.
    pub fn rotate(&mut self, rotation: Rotation) {
        (self.azimuth, self.elevation) = rotation.angles();
    }

    /// Orbits the camera around the target, in degrees.
    pub fn orbit(&mut self, delta_azimuth: f32, delta_elevation: f32) {
        self.azimuth = (self.azimuth + delta_azimuth).rem_euclid(360.0);
        self.elevation = (self.elevation + delta_elevation).clamp(-90.0, 90.0);
    }

    /// Zooms the camera (moves toward/away from target for perspective,
    /// adjusts `ortho_scale` for orthographic).
    pub fn zoom(&mut self, delta: f32) {
        match self.projection {
            Projection::Perspective => {
                self.distance = (self.distance - delta).max(0.1);
            }
            Projection::Orthographic => {
                let zoom_factor = 1.0 - delta * 0.4;
                self.ortho_scale = (self.ortho_scale * zoom_factor).clamp(0.01, 1.0e6);
            }
        }
    }

    /// Centers the camera on a bounding box and backs off until the whole
    /// box fits in the field of view.
    pub fn look_at_box(&mut self, min: Vec3, max: Vec3) {
        let center = (min + max) * 0.5;
        let radius = ((max - min).length() * 0.5).max(1e-3);

        self.target = center;
        let half_fov = (self.fov * 0.5).min(self.fov * 0.5 * self.aspect_ratio.min(1.0)).max(0.05);
        self.distance = radius / half_fov.sin();
        self.near = (self.distance - radius).max(radius * 1e-3);
        self.far = self.distance + radius * 2.0;
        self.ortho_scale = radius / self.aspect_ratio.min(1.0).max(1e-3);
    }

    /// Sets the field of view in radians.
    pub fn set_fov(&mut self, fov: f32) {
        self.fov = fov.clamp(0.1, std::f32::consts::PI - 0.1);
    }

    /// Returns FOV in degrees.
    #[must_use]
    pub fn fov_degrees(&self) -> f32 {
        self.fov.to_degrees()
    }

    /// Sets FOV from degrees.
    pub fn set_fov_degrees(&mut self, degrees: f32) {
        self.set_fov(degrees.to_radians());
    }

    /// Snapshot of the view parameters.
    #[must_use]
    pub fn state(&self) -> CameraState {
        CameraState {
            azimuth: self.azimuth,
            elevation: self.elevation,
            distance: self.distance,
            target: self.target,
            fov: self.fov_degrees(),
            projection: self.projection,
            ortho_scale: self.ortho_scale,
        }
    }

    /// Restores a snapshot, keeping the aspect ratio.
    pub fn set_state(&mut self, state: &CameraState) {
        self.azimuth = state.azimuth;
        self.elevation = state.elevation.clamp(-90.0, 90.0);
        self.distance = state.distance.max(1e-3);
        self.target = state.target;
        self.set_fov_degrees(state.fov);
        self.projection = state.projection;
        self.ortho_scale = state.ortho_scale.max(1e-3);
        self.near = (self.distance * 1e-3).max(1e-4);
        self.far = self.far.max(self.distance * 4.0);
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(4.0 / 3.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn test_camera_defaults() {
        let camera = Camera::default();
        assert_eq!(camera.projection, Projection::Perspective);
        assert_eq!(camera.elevation, 90.0);
        assert!(approx(camera.direction(), Vec3::Z));
    }

    #[test]
    fn test_preset_directions() {
        let mut camera = Camera::new(1.0);
        let cases = [
            (Rotation::Top, Vec3::Z, Vec3::Y),
            (Rotation::Bottom, Vec3::NEG_Z, Vec3::Y),
            (Rotation::Left, Vec3::NEG_X, Vec3::Z),
            (Rotation::Right, Vec3::X, Vec3::Z),
            (Rotation::Front, Vec3::Y, Vec3::Z),
            (Rotation::Back, Vec3::NEG_Y, Vec3::Z),
        ];
        for (rotation, direction, up) in cases {
            camera.rotate(rotation);
            assert!(approx(camera.direction(), direction), "{rotation:?}");
            assert!(approx(camera.up(), up), "{rotation:?} up");
        }
    }

    #[test]
    fn test_projection_mode_orthographic() {
        let mut camera = Camera::new(1.0);
        camera.projection = Projection::Orthographic;
        camera.ortho_scale = 5.0;
        let proj = camera.projection_matrix();
        // Orthographic matrix has w_axis.w = 1.0
        assert!((proj.w_axis.w - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_set_fov_clamping() {
        let mut camera = Camera::new(1.0);
        camera.set_fov(0.0);
        assert!(camera.fov >= 0.1);
        camera.set_fov(std::f32::consts::PI);
        assert!(camera.fov < std::f32::consts::PI);
        camera.set_fov_degrees(90.0);
        assert!((camera.fov_degrees() - 90.0).abs() < 0.1);
    }

    #[test]
    fn test_look_at_box_fits() {
        let mut camera = Camera::new(1.0);
        camera.rotate(Rotation::Left);
        camera.look_at_box(Vec3::splat(-10.0), Vec3::splat(10.0));
        assert_eq!(camera.target, Vec3::ZERO);
        let vp = camera.view_projection_matrix();
        for corner in [Vec3::splat(-10.0), Vec3::splat(10.0), Vec3::new(10.0, -10.0, 10.0)] {
            let ndc = vp.project_point3(corner);
            assert!(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0, "{corner:?} -> {ndc:?}");
        }
    }

    #[test]
    fn test_zoom() {
        let mut camera = Camera::new(1.0);
        camera.distance = 5.0;
        camera.zoom(1.0);
        assert!(camera.distance < 5.0);

        camera.projection = Projection::Orthographic;
        camera.ortho_scale = 5.0;
        camera.zoom(1.0);
        assert!(camera.ortho_scale < 5.0);
    }

    #[test]
    fn test_state_round_trip() {
        let mut a = Camera::new(1.5);
        a.orbit(30.0, -45.0);
        a.distance = 42.0;
        let mut b = Camera::new(1.5);
        b.set_state(&a.state());
        assert!(approx(a.position(), b.position()));
    }
}

//! Software canvas backend.
//!
//! [`SoftwareCanvas`] rasterizes the primitives objects submit into an RGBA
//! float buffer with a depth buffer. Each subplot is drawn in its own
//! [`Viewport`] through a [`CanvasPass`], which implements the core
//! [`RenderContext`].

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_possible_wrap,
    clippy::many_single_char_names
)]

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4, Vec4Swizzles};
use image::RgbaImage;
use visbrain_core::primitive::{Primitive, RenderContext};

use crate::camera::Camera;
use crate::error::{RenderError, RenderResult};
use crate::font;

/// A rectangle of the canvas, in pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// The whole canvas.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

/// A drawing surface the scene renders into.
pub trait CanvasBackend {
    /// Current size in pixels.
    fn size(&self) -> (u32, u32);

    /// Largest side the backend can allocate.
    fn max_size(&self) -> u32;

    /// Resizes the surface. Content is cleared to the background color.
    fn resize(&mut self, width: u32, height: u32) -> RenderResult<()>;

    fn bgcolor(&self) -> Vec4;

    fn set_bgcolor(&mut self, color: Vec4);

    /// Multiplier applied to pixel-sized quantities (line widths, text).
    fn set_pixel_scale(&mut self, scale: f32);

    /// Fills the whole surface with the background color.
    fn clear(&mut self);

    /// Fills a viewport with a solid color.
    fn fill_viewport(&mut self, viewport: Viewport, color: Vec4) -> RenderResult<()>;

    /// Starts drawing into `viewport` through `camera`.
    fn begin_pass(&mut self, viewport: Viewport, camera: &Camera) -> RenderResult<Box<dyn RenderContext + '_>>;

    /// Reads the surface back as 8-bit RGBA.
    fn read_pixels(&self) -> RgbaImage;
}

/// CPU rasterizer with a depth buffer.
#[derive(Debug, Clone)]
pub struct SoftwareCanvas {
    width: u32,
    height: u32,
    max_size: u32,
    bgcolor: Vec4,
    pixel_scale: f32,
    color: Vec<Vec4>,
    depth: Vec<f32>,
}

impl SoftwareCanvas {
    /// Creates a canvas cleared to opaque black.
    pub fn new(width: u32, height: u32) -> Self {
        let n = (width as usize) * (height as usize);
        let bgcolor = Vec4::new(0.0, 0.0, 0.0, 1.0);
        Self {
            width,
            height,
            max_size: 8192,
            bgcolor,
            pixel_scale: 1.0,
            color: vec![bgcolor; n],
            depth: vec![f32::INFINITY; n],
        }
    }

    /// Sets the largest side [`CanvasBackend::resize`] accepts.
    #[must_use]
    pub fn with_max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size;
        self
    }

    /// The color at pixel `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Vec4> {
        (x < self.width && y < self.height).then(|| self.color[(y * self.width + x) as usize])
    }
}

/// Fails unless `viewport` is non-empty and inside a `width x height` canvas.
pub(crate) fn check_viewport(viewport: Viewport, width: u32, height: u32) -> RenderResult<()> {
    if viewport.width == 0
        || viewport.height == 0
        || viewport.x + viewport.width > width
        || viewport.y + viewport.height > height
    {
        return Err(RenderError::InvalidViewport((
            viewport.x,
            viewport.y,
            viewport.width,
            viewport.height,
        )));
    }
    Ok(())
}

impl CanvasBackend for SoftwareCanvas {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn max_size(&self) -> u32 {
        self.max_size
    }

    fn resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        if width == 0 || height == 0 || width > self.max_size || height > self.max_size {
            return Err(RenderError::ResizeRefused {
                width,
                height,
                max: self.max_size,
            });
        }
        log::debug!("canvas resized to {width}x{height}");
        self.width = width;
        self.height = height;
        let n = (width as usize) * (height as usize);
        self.color = vec![self.bgcolor; n];
        self.depth = vec![f32::INFINITY; n];
        Ok(())
    }

    fn bgcolor(&self) -> Vec4 {
        self.bgcolor
    }

    fn set_bgcolor(&mut self, color: Vec4) {
        self.bgcolor = color;
    }

    fn set_pixel_scale(&mut self, scale: f32) {
        self.pixel_scale = scale.max(0.1);
    }

    fn clear(&mut self) {
        self.color.fill(self.bgcolor);
        self.depth.fill(f32::INFINITY);
    }

    fn fill_viewport(&mut self, viewport: Viewport, color: Vec4) -> RenderResult<()> {
        check_viewport(viewport, self.width, self.height)?;
        for y in viewport.y..viewport.y + viewport.height {
            let row = (y * self.width) as usize;
            self.color[row + viewport.x as usize..row + (viewport.x + viewport.width) as usize].fill(color);
        }
        Ok(())
    }

    fn begin_pass(&mut self, viewport: Viewport, camera: &Camera) -> RenderResult<Box<dyn RenderContext + '_>> {
        check_viewport(viewport, self.width, self.height)?;
        for y in viewport.y..viewport.y + viewport.height {
            let row = (y * self.width) as usize;
            self.depth[row + viewport.x as usize..row + (viewport.x + viewport.width) as usize].fill(f32::INFINITY);
        }
        let mut camera = camera.clone();
        camera.set_aspect_ratio(viewport.aspect());
        Ok(Box::new(CanvasPass {
            view_proj: camera.view_projection_matrix(),
            forward: camera.forward(),
            right: camera.right(),
            pixel_scale: self.pixel_scale,
            viewport,
            canvas: self,
        }))
    }

    fn read_pixels(&self) -> RgbaImage {
        let bytes: Vec<[u8; 4]> = self
            .color
            .iter()
            .map(|c| {
                let c = c.clamp(Vec4::ZERO, Vec4::ONE) * 255.0;
                [c.x.round() as u8, c.y.round() as u8, c.z.round() as u8, c.w.round() as u8]
            })
            .collect();
        RgbaImage::from_raw(self.width, self.height, bytemuck::cast_slice(&bytes).to_vec())
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }
}

/// One subplot being drawn.
pub struct CanvasPass<'a> {
    canvas: &'a mut SoftwareCanvas,
    viewport: Viewport,
    view_proj: Mat4,
    forward: Vec3,
    right: Vec3,
    pixel_scale: f32,
}

impl CanvasPass<'_> {
    /// Screen position `(x, y, depth)` of a world point.
    fn to_screen(&self, p: Vec3) -> Option<Vec3> {
        let clip = self.view_proj * p.extend(1.0);
        if clip.w <= 1e-6 {
            return None;
        }
        let ndc = clip.xyz() / clip.w;
        let vp = self.viewport;
        Some(Vec3::new(
            vp.x as f32 + (ndc.x + 1.0) * 0.5 * vp.width as f32,
            vp.y as f32 + (1.0 - ndc.y) * 0.5 * vp.height as f32,
            ndc.z,
        ))
    }

    /// Writes a fragment with depth testing. Translucent fragments blend
    /// over what is there and leave the depth untouched.
    fn plot(&mut self, x: i64, y: i64, depth: f32, color: Vec4) {
        let vp = self.viewport;
        if x < i64::from(vp.x) || y < i64::from(vp.y) || x >= i64::from(vp.x + vp.width) || y >= i64::from(vp.y + vp.height) {
            return;
        }
        if color.w <= 0.0 || !(0.0..=1.0).contains(&depth) {
            return;
        }
        let idx = (y as usize) * (self.canvas.width as usize) + x as usize;
        if depth >= self.canvas.depth[idx] {
            return;
        }
        if color.w >= 0.999 {
            self.canvas.color[idx] = color;
            self.canvas.depth[idx] = depth;
        } else {
            let dst = self.canvas.color[idx];
            let a = color.w;
            let rgb = color.xyz() * a + dst.xyz() * (1.0 - a);
            self.canvas.color[idx] = rgb.extend(a + dst.w * (1.0 - a));
        }
    }

    /// Overlay fragment: no depth test.
    fn plot_overlay(&mut self, x: i64, y: i64, color: Vec4) {
        let vp = self.viewport;
        if x < i64::from(vp.x) || y < i64::from(vp.y) || x >= i64::from(vp.x + vp.width) || y >= i64::from(vp.y + vp.height) {
            return;
        }
        let idx = (y as usize) * (self.canvas.width as usize) + x as usize;
        let dst = self.canvas.color[idx];
        let a = color.w;
        self.canvas.color[idx] = (color.xyz() * a + dst.xyz() * (1.0 - a)).extend(a + dst.w * (1.0 - a));
    }

    fn fill_triangle(&mut self, s: [Vec3; 3], shade: impl Fn(Vec3) -> Vec4) {
        let edge = |a: Vec3, b: Vec3, p: Vec2| (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
        let area = edge(s[0], s[1], s[2].truncate());
        if area.abs() < 1e-9 {
            return;
        }
        let vp = self.viewport;
        let x0 = s.iter().map(|v| v.x).fold(f32::INFINITY, f32::min).floor().max(vp.x as f32) as i64;
        let x1 = s.iter().map(|v| v.x).fold(f32::NEG_INFINITY, f32::max).ceil().min((vp.x + vp.width) as f32) as i64;
        let y0 = s.iter().map(|v| v.y).fold(f32::INFINITY, f32::min).floor().max(vp.y as f32) as i64;
        let y1 = s.iter().map(|v| v.y).fold(f32::NEG_INFINITY, f32::max).ceil().min((vp.y + vp.height) as f32) as i64;
        for y in y0..y1 {
            for x in x0..x1 {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let w0 = edge(s[1], s[2], p) / area;
                let w1 = edge(s[2], s[0], p) / area;
                let w2 = 1.0 - w0 - w1;
                if w0 < -1e-5 || w1 < -1e-5 || w2 < -1e-5 {
                    continue;
                }
                let bary = Vec3::new(w0, w1, w2);
                let depth = bary.dot(Vec3::new(s[0].z, s[1].z, s[2].z));
                self.plot(x, y, depth, shade(bary));
            }
        }
    }

    fn draw_mesh(&mut self, vertices: &[Vec3], normals: &[Vec3], faces: &[[u32; 3]], colors: &[Vec4], model: Mat4) {
        let normal_matrix = Mat3::from_mat4(model).inverse().transpose();
        let light = -self.forward;
        let fallback = Vec4::new(0.7, 0.7, 0.7, 1.0);
        let shaded: Vec<Option<(Vec3, Vec4)>> = vertices
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let s = self.to_screen(model.transform_point3(*v))?;
                let n = normals.get(i).map_or(Vec3::ZERO, |n| (normal_matrix * *n).normalize_or_zero());
                let intensity = 0.3 + 0.7 * n.dot(light).abs();
                let c = colors.get(i).or_else(|| colors.first()).copied().unwrap_or(fallback);
                Some((s, (c.xyz() * intensity).extend(c.w)))
            })
            .collect();
        for f in faces {
            let (Some(a), Some(b), Some(c)) = (
                shaded.get(f[0] as usize).copied().flatten(),
                shaded.get(f[1] as usize).copied().flatten(),
                shaded.get(f[2] as usize).copied().flatten(),
            ) else {
                continue;
            };
            if a.1.w <= 0.0 && b.1.w <= 0.0 && c.1.w <= 0.0 {
                continue;
            }
            self.fill_triangle([a.0, b.0, c.0], |w| a.1 * w.x + b.1 * w.y + c.1 * w.z);
        }
    }

    fn draw_markers(&mut self, positions: &[Vec3], colors: &[Vec4], radii: &[f32], edge: Option<Vec4>, model: Mat4) {
        let scale = model.x_axis.truncate().length();
        for (i, p) in positions.iter().enumerate() {
            let color = colors.get(i).or_else(|| colors.first()).copied().unwrap_or(Vec4::ONE);
            if color.w <= 0.0 {
                continue;
            }
            let r = radii.get(i).or_else(|| radii.first()).copied().unwrap_or(1.0);
            let center = model.transform_point3(*p);
            let (Some(s), Some(e)) = (self.to_screen(center), self.to_screen(center + self.right * r * scale)) else {
                continue;
            };
            let rp = (e.truncate() - s.truncate()).length().max(1.0);
            let reach = rp.ceil() as i64;
            let (cx, cy) = (s.x.floor() as i64, s.y.floor() as i64);
            for dy in -reach..=reach {
                for dx in -reach..=reach {
                    let d = ((dx * dx + dy * dy) as f32).sqrt();
                    if d > rp {
                        continue;
                    }
                    let frag = match edge {
                        Some(edge) if d > rp - 1.0 => edge,
                        _ => {
                            let shade = 0.6 + 0.4 * (1.0 - (d / rp).powi(2)).max(0.0).sqrt();
                            (color.xyz() * shade).extend(color.w)
                        }
                    };
                    self.plot(cx + dx, cy + dy, s.z, frag);
                }
            }
        }
    }

    fn draw_lines(&mut self, positions: &[Vec3], colors: &[Vec4], segments: &[[u32; 2]], width: f32, model: Mat4) {
        let half = ((width * self.pixel_scale).round() as i64).max(1) / 2;
        let screen: Vec<Option<Vec3>> = positions.iter().map(|p| self.to_screen(model.transform_point3(*p))).collect();
        for seg in segments {
            let (Some(a), Some(b)) = (
                screen.get(seg[0] as usize).copied().flatten(),
                screen.get(seg[1] as usize).copied().flatten(),
            ) else {
                continue;
            };
            let ca = colors.get(seg[0] as usize).or_else(|| colors.first()).copied().unwrap_or(Vec4::ONE);
            let cb = colors.get(seg[1] as usize).or_else(|| colors.first()).copied().unwrap_or(Vec4::ONE);
            let steps = (b.x - a.x).abs().max((b.y - a.y).abs()).ceil().max(1.0) as usize;
            for i in 0..=steps {
                let t = i as f32 / steps as f32;
                let p = a.lerp(b, t);
                let c = ca.lerp(cb, t);
                for dy in -half..=half {
                    for dx in -half..=half {
                        self.plot(p.x.floor() as i64 + dx, p.y.floor() as i64 + dy, p.z, c);
                    }
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_image(&mut self, origin: Vec3, u: Vec3, v: Vec3, width: u32, height: u32, pixels: &[Vec4], model: Mat4) {
        if width == 0 || height == 0 || pixels.len() < (width * height) as usize {
            log::warn!("image primitive has {} pixels for {width}x{height}, skipped", pixels.len());
            return;
        }
        let corner = |a: f32, b: f32| self.to_screen(model.transform_point3(origin + u * a + v * b));
        let (Some(p00), Some(p10), Some(p01), Some(p11)) = (corner(0.0, 0.0), corner(1.0, 0.0), corner(0.0, 1.0), corner(1.0, 1.0)) else {
            return;
        };
        let sample = |uv: Vec2| {
            let i = ((uv.x * width as f32) as u32).min(width - 1);
            let j = ((uv.y * height as f32) as u32).min(height - 1);
            pixels[(j * width + i) as usize]
        };
        let uv = [Vec2::ZERO, Vec2::X, Vec2::ONE, Vec2::Y];
        self.fill_triangle([p00, p10, p11], |w| sample(uv[0] * w.x + uv[1] * w.y + uv[2] * w.z));
        self.fill_triangle([p00, p11, p01], |w| sample(uv[0] * w.x + uv[2] * w.y + uv[3] * w.z));
    }

    fn draw_text(&mut self, position: Vec3, text: &str, color: Vec4, size: f32, bold: bool, model: Mat4) {
        let Some(s) = self.to_screen(model.transform_point3(position)) else {
            return;
        };
        let cell = ((size * self.pixel_scale / font::GLYPH_HEIGHT as f32).round() as i64).max(1);
        let width = i64::from(font::text_width(text)) * cell;
        let x0 = s.x.round() as i64 - width / 2;
        let y0 = s.y.round() as i64 - i64::from(font::GLYPH_HEIGHT) * cell / 2;
        let mut lit = Vec::new();
        font::for_each_pixel(text, |x, y| lit.push((i64::from(x), i64::from(y))));
        for (fx, fy) in lit {
            for dy in 0..cell {
                for dx in 0..cell + i64::from(bold) {
                    self.plot_overlay(x0 + fx * cell + dx, y0 + fy * cell + dy, color);
                }
            }
        }
    }
}

impl RenderContext for CanvasPass<'_> {
    fn submit(&mut self, primitive: Primitive<'_>, model: Mat4) {
        match primitive {
            Primitive::Mesh {
                vertices,
                normals,
                faces,
                colors,
            } => self.draw_mesh(&vertices, &normals, &faces, &colors, model),
            Primitive::Markers {
                positions,
                colors,
                radii,
                edge_color,
            } => self.draw_markers(&positions, &colors, &radii, edge_color, model),
            Primitive::Lines {
                positions,
                colors,
                segments,
                width,
            } => self.draw_lines(&positions, &colors, &segments, width, model),
            Primitive::Image {
                origin,
                u_axis,
                v_axis,
                width,
                height,
                pixels,
            } => self.draw_image(origin, u_axis, v_axis, width, height, &pixels, model),
            Primitive::Text {
                position,
                text,
                color,
                size,
                bold,
            } => self.draw_text(position, &text, color, size, bold, model),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use visbrain_core::view::Rotation;

    fn top_camera() -> Camera {
        let mut camera = Camera::new(1.0);
        camera.rotate(Rotation::Top);
        camera.look_at_box(Vec3::splat(-1.0), Vec3::splat(1.0));
        camera
    }

    #[test]
    fn test_resize_limits() {
        let mut canvas = SoftwareCanvas::new(10, 10).with_max_size(100);
        assert!(canvas.resize(50, 20).is_ok());
        assert_eq!(canvas.size(), (50, 20));
        assert!(matches!(canvas.resize(200, 20), Err(RenderError::ResizeRefused { .. })));
        assert_eq!(canvas.size(), (50, 20));
    }

    #[test]
    fn test_viewport_checked() {
        let mut canvas = SoftwareCanvas::new(10, 10);
        assert!(canvas.fill_viewport(Viewport::full(11, 10), Vec4::ONE).is_err());
        assert!(canvas.begin_pass(Viewport::full(10, 10), &Camera::default()).is_ok());
    }

    #[test]
    fn test_triangle_covers_center() {
        let mut canvas = SoftwareCanvas::new(64, 64);
        let red = Vec4::new(1.0, 0.0, 0.0, 1.0);
        {
            let mut pass = canvas.begin_pass(Viewport::full(64, 64), &top_camera()).unwrap();
            pass.submit(
                Primitive::Mesh {
                    vertices: Cow::Owned(vec![Vec3::new(-1.0, -1.0, 0.0), Vec3::new(1.0, -1.0, 0.0), Vec3::new(0.0, 1.0, 0.0)]),
                    normals: Cow::Owned(vec![Vec3::Z; 3]),
                    faces: Cow::Owned(vec![[0, 1, 2]]),
                    colors: Cow::Owned(vec![red]),
                },
                Mat4::IDENTITY,
            );
        }
        let center = canvas.pixel(32, 32).unwrap();
        assert!(center.x > 0.9 && center.y < 0.1);
        assert_eq!(canvas.pixel(0, 0).unwrap(), Vec4::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_depth_test_keeps_nearest() {
        let mut canvas = SoftwareCanvas::new(32, 32);
        let quad = |z: f32| vec![Vec3::new(-1.0, -1.0, z), Vec3::new(1.0, -1.0, z), Vec3::new(1.0, 1.0, z), Vec3::new(-1.0, 1.0, z)];
        {
            let mut pass = canvas.begin_pass(Viewport::full(32, 32), &top_camera()).unwrap();
            for (z, color) in [(0.5, Vec4::new(0.0, 1.0, 0.0, 1.0)), (-0.5, Vec4::new(0.0, 0.0, 1.0, 1.0))] {
                pass.submit(
                    Primitive::Mesh {
                        vertices: Cow::Owned(quad(z)),
                        normals: Cow::Owned(vec![Vec3::Z; 4]),
                        faces: Cow::Owned(vec![[0, 1, 2], [0, 2, 3]]),
                        colors: Cow::Owned(vec![color]),
                    },
                    Mat4::IDENTITY,
                );
            }
        }
        // Camera looks down from +z, so the z = 0.5 quad wins.
        let p = canvas.pixel(16, 16).unwrap();
        assert!(p.y > 0.9 && p.z < 0.1);
    }

    #[test]
    fn test_read_pixels_and_text() {
        let mut canvas = SoftwareCanvas::new(40, 20);
        canvas.set_bgcolor(Vec4::ZERO);
        canvas.clear();
        {
            let mut pass = canvas.begin_pass(Viewport::full(40, 20), &top_camera()).unwrap();
            pass.submit(
                Primitive::Text {
                    position: Vec3::ZERO,
                    text: Cow::Borrowed("HI"),
                    color: Vec4::ONE,
                    size: 10.0,
                    bold: false,
                },
                Mat4::IDENTITY,
            );
        }
        let img = canvas.read_pixels();
        assert_eq!(img.dimensions(), (40, 20));
        assert!(img.pixels().any(|p| p.0 == [255, 255, 255, 255]));
        assert!(img.pixels().any(|p| p.0 == [0, 0, 0, 0]));
    }
}

//! GPU canvas backend.
//!
//! [`GpuCanvas`] draws into an offscreen wgpu texture and reads it back for
//! screenshots, without a window or a surface. Primitives are tessellated on
//! the CPU into colored triangles: meshes and images keep clip-space
//! vertices so the GPU clips them, while everything sized in pixels
//! (markers, lines, text) is built in screen space.
//!
//! Each pass is recorded into three batches drawn in order: opaque
//! triangles with depth writes, translucent triangles depth-tested without
//! writes, then text with no depth test.

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_possible_wrap
)]

use std::borrow::Cow;
use std::sync::mpsc;

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4, Vec4Swizzles};
use image::RgbaImage;
use pollster::FutureExt;
use visbrain_core::primitive::{Primitive, RenderContext};
use wgpu::util::DeviceExt;

use crate::camera::Camera;
use crate::canvas::{check_viewport, CanvasBackend, SoftwareCanvas, Viewport};
use crate::error::{RenderError, RenderResult};
use crate::font;

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Triangles per marker disc.
const DISC_SEGMENTS: usize = 16;

const SHADER: &str = r"
struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_main(@location(0) position: vec4<f32>, @location(1) color: vec4<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.position = position;
    out.color = color;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    if (in.color.a <= 0.0) {
        discard;
    }
    return in.color;
}
";

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GpuVertex {
    position: [f32; 4],
    color: [f32; 4],
}

impl GpuVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x4];

    fn new(position: Vec4, color: Vec4) -> Self {
        Self {
            position: position.to_array(),
            color: color.to_array(),
        }
    }

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

struct Pipelines {
    opaque: wgpu::RenderPipeline,
    translucent: wgpu::RenderPipeline,
    overlay: wgpu::RenderPipeline,
}

impl Pipelines {
    fn new(device: &wgpu::Device) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("canvas shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(SHADER)),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("canvas pipeline layout"),
            bind_group_layouts: &[],
            push_constant_ranges: &[],
        });
        let create = |label: &str, depth_write_enabled: bool, depth_compare: wgpu::CompareFunction| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some("vs_main"),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    buffers: &[GpuVertex::layout()],
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..wgpu::PrimitiveState::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled,
                    depth_compare,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some("fs_main"),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: COLOR_FORMAT,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
                cache: None,
            })
        };
        Self {
            // LessEqual lets a marker body cover its own edge ring.
            opaque: create("canvas opaque pipeline", true, wgpu::CompareFunction::LessEqual),
            translucent: create("canvas translucent pipeline", false, wgpu::CompareFunction::LessEqual),
            overlay: create("canvas overlay pipeline", false, wgpu::CompareFunction::Always),
        }
    }
}

/// Offscreen wgpu canvas.
pub struct GpuCanvas {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipelines: Pipelines,
    color: wgpu::Texture,
    depth: wgpu::Texture,
    width: u32,
    height: u32,
    max_size: u32,
    bgcolor: Vec4,
    pixel_scale: f32,
}

impl GpuCanvas {
    /// Creates a canvas on the first available adapter, cleared to opaque
    /// black. Blocks until the device is ready.
    pub fn new(width: u32, height: u32) -> RenderResult<Self> {
        Self::new_headless(width, height).block_on()
    }

    async fn new_headless(width: u32, height: u32) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::AdapterCreationFailed)?;
        let info = adapter.get_info();
        log::info!("GPU canvas on {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("visbrain device (headless)"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;

        let max_size = device.limits().max_texture_dimension_2d;
        let (width, height) = (width.clamp(1, max_size), height.clamp(1, max_size));
        let (color, depth) = create_targets(&device, width, height);
        let pipelines = Pipelines::new(&device);
        let mut canvas = Self {
            device,
            queue,
            pipelines,
            color,
            depth,
            width,
            height,
            max_size,
            bgcolor: Vec4::new(0.0, 0.0, 0.0, 1.0),
            pixel_scale: 1.0,
        };
        canvas.clear();
        Ok(canvas)
    }

    /// Lowers the largest side [`CanvasBackend::resize`] accepts. The device
    /// limit still applies.
    #[must_use]
    pub fn with_max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size.min(self.device.limits().max_texture_dimension_2d);
        self
    }

    /// Draws one pass: opaque, translucent then overlay triangles, clipped
    /// to `viewport`. The depth buffer starts cleared.
    fn draw(&self, viewport: Viewport, batches: [&[GpuVertex]; 3]) {
        let buffers: Vec<Option<wgpu::Buffer>> = batches
            .iter()
            .map(|&vertices| {
                (!vertices.is_empty()).then(|| {
                    self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("canvas vertices"),
                        contents: bytemuck::cast_slice(vertices),
                        usage: wgpu::BufferUsages::VERTEX,
                    })
                })
            })
            .collect();
        if buffers.iter().all(Option::is_none) {
            return;
        }

        let color_view = self.color.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = self.depth.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("canvas pass encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("canvas pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_viewport(
                viewport.x as f32,
                viewport.y as f32,
                viewport.width as f32,
                viewport.height as f32,
                0.0,
                1.0,
            );
            pass.set_scissor_rect(viewport.x, viewport.y, viewport.width, viewport.height);
            let pipelines = [&self.pipelines.opaque, &self.pipelines.translucent, &self.pipelines.overlay];
            for ((pipeline, buffer), vertices) in pipelines.into_iter().zip(&buffers).zip(batches) {
                if let Some(buffer) = buffer {
                    pass.set_pipeline(pipeline);
                    pass.set_vertex_buffer(0, buffer.slice(..));
                    pass.draw(0..vertices.len() as u32, 0..1);
                }
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Copies the color texture into a mappable buffer and strips the row
    /// padding.
    fn read_back(&self) -> RenderResult<RgbaImage> {
        let bytes_per_row = aligned_bytes_per_row(self.width);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("canvas read back"),
            size: u64::from(bytes_per_row) * u64::from(self.height),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("canvas read back encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.color,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            extent(self.width, self.height),
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| RenderError::BufferMapFailed)?
            .map_err(|_| RenderError::BufferMapFailed)?;

        let row_bytes = self.width as usize * 4;
        let mut pixels = Vec::with_capacity(row_bytes * self.height as usize);
        {
            let data = slice.get_mapped_range();
            for row in data.chunks(bytes_per_row as usize).take(self.height as usize) {
                pixels.extend_from_slice(&row[..row_bytes]);
            }
        }
        buffer.unmap();
        RgbaImage::from_raw(self.width, self.height, pixels).ok_or(RenderError::BufferMapFailed)
    }
}

impl CanvasBackend for GpuCanvas {
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
        if (width, height) != (self.width, self.height) {
            log::debug!("GPU canvas resized to {width}x{height}");
            let (color, depth) = create_targets(&self.device, width, height);
            self.color = color;
            self.depth = depth;
            self.width = width;
            self.height = height;
        }
        self.clear();
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
        let view = self.color.create_view(&wgpu::TextureViewDescriptor::default());
        let c = self.bgcolor.clamp(Vec4::ZERO, Vec4::ONE).as_dvec4();
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("canvas clear encoder"),
        });
        let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("canvas clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: c.x,
                        g: c.y,
                        b: c.z,
                        a: c.w,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        drop(pass);
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn fill_viewport(&mut self, viewport: Viewport, color: Vec4) -> RenderResult<()> {
        check_viewport(viewport, self.width, self.height)?;
        let c = color.clamp(Vec4::ZERO, Vec4::ONE) * 255.0;
        let texel = [c.x.round() as u8, c.y.round() as u8, c.z.round() as u8, c.w.round() as u8];
        let data = texel.repeat(viewport.width as usize * viewport.height as usize);
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.color,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: viewport.x,
                    y: viewport.y,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            &data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * viewport.width),
                rows_per_image: Some(viewport.height),
            },
            extent(viewport.width, viewport.height),
        );
        Ok(())
    }

    fn begin_pass(&mut self, viewport: Viewport, camera: &Camera) -> RenderResult<Box<dyn RenderContext + '_>> {
        check_viewport(viewport, self.width, self.height)?;
        let mut camera = camera.clone();
        camera.set_aspect_ratio(viewport.aspect());
        Ok(Box::new(GpuPass {
            view_proj: camera.view_projection_matrix(),
            forward: camera.forward(),
            right: camera.right(),
            pixel_scale: self.pixel_scale,
            viewport,
            opaque: Vec::new(),
            translucent: Vec::new(),
            overlay: Vec::new(),
            canvas: self,
        }))
    }

    fn read_pixels(&self) -> RgbaImage {
        self.read_back().unwrap_or_else(|err| {
            log::error!("GPU canvas read back failed: {err}");
            RgbaImage::new(self.width, self.height)
        })
    }
}

/// The GPU canvas when an adapter is available, the software canvas
/// otherwise.
pub fn default_backend(width: u32, height: u32, max_size: u32) -> Box<dyn CanvasBackend> {
    match GpuCanvas::new(width, height) {
        Ok(canvas) => Box::new(canvas.with_max_size(max_size)),
        Err(err) => {
            log::warn!("no GPU canvas ({err}), falling back to the software canvas");
            Box::new(SoftwareCanvas::new(width, height).with_max_size(max_size))
        }
    }
}

fn create_targets(device: &wgpu::Device, width: u32, height: u32) -> (wgpu::Texture, wgpu::Texture) {
    let target = |label: &str, format: wgpu::TextureFormat, usage: wgpu::TextureUsages| {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(width, height),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        })
    };
    let color = target(
        "canvas color",
        COLOR_FORMAT,
        wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::COPY_DST,
    );
    let depth = target("canvas depth", DEPTH_FORMAT, wgpu::TextureUsages::RENDER_ATTACHMENT);
    (color, depth)
}

fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

/// Row stride of a texture copy, padded to the copy alignment.
fn aligned_bytes_per_row(width: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (width * 4).div_ceil(align) * align
}

/// One subplot being recorded. The batches are drawn when the pass drops.
struct GpuPass<'a> {
    canvas: &'a GpuCanvas,
    viewport: Viewport,
    view_proj: Mat4,
    forward: Vec3,
    right: Vec3,
    pixel_scale: f32,
    opaque: Vec<GpuVertex>,
    translucent: Vec<GpuVertex>,
    overlay: Vec<GpuVertex>,
}

impl GpuPass<'_> {
    fn to_clip(&self, p: Vec3) -> Vec4 {
        self.view_proj * p.extend(1.0)
    }

    /// Screen position `(x, y, depth)` of a world point.
    fn to_screen(&self, p: Vec3) -> Option<Vec3> {
        let clip = self.to_clip(p);
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

    /// Clip position of a screen point.
    fn from_screen(&self, x: f32, y: f32, depth: f32) -> Vec4 {
        let vp = self.viewport;
        Vec4::new(
            (x - vp.x as f32) / vp.width as f32 * 2.0 - 1.0,
            1.0 - (y - vp.y as f32) / vp.height as f32 * 2.0,
            depth,
            1.0,
        )
    }

    fn push_triangle(&mut self, triangle: [GpuVertex; 3]) {
        let alphas = triangle.map(|v| v.color[3]);
        if alphas.iter().all(|&a| a <= 0.0) {
            return;
        }
        if alphas.iter().all(|&a| a >= 0.999) {
            self.opaque.extend(triangle);
        } else {
            self.translucent.extend(triangle);
        }
    }

    /// Two triangles `a b c`, `a c d`.
    fn push_quad(&mut self, quad: [GpuVertex; 4]) {
        self.push_triangle([quad[0], quad[1], quad[2]]);
        self.push_triangle([quad[0], quad[2], quad[3]]);
    }

    fn draw_mesh(&mut self, vertices: &[Vec3], normals: &[Vec3], faces: &[[u32; 3]], colors: &[Vec4], model: Mat4) {
        let normal_matrix = Mat3::from_mat4(model).inverse().transpose();
        let light = -self.forward;
        let fallback = Vec4::new(0.7, 0.7, 0.7, 1.0);
        let shaded: Vec<GpuVertex> = vertices
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let n = normals.get(i).map_or(Vec3::ZERO, |n| (normal_matrix * *n).normalize_or_zero());
                let intensity = 0.3 + 0.7 * n.dot(light).abs();
                let c = colors.get(i).or_else(|| colors.first()).copied().unwrap_or(fallback);
                GpuVertex::new(self.to_clip(model.transform_point3(*v)), (c.xyz() * intensity).extend(c.w))
            })
            .collect();
        for f in faces {
            let (Some(&a), Some(&b), Some(&c)) = (
                shaded.get(f[0] as usize),
                shaded.get(f[1] as usize),
                shaded.get(f[2] as usize),
            ) else {
                continue;
            };
            self.push_triangle([a, b, c]);
        }
    }

    fn disc(&mut self, center: Vec3, radius: f32, inner: Vec4, outer: Vec4) {
        let mid = GpuVertex::new(self.from_screen(center.x, center.y, center.z), inner);
        let rim: Vec<GpuVertex> = (0..=DISC_SEGMENTS)
            .map(|k| {
                let angle = std::f32::consts::TAU * k as f32 / DISC_SEGMENTS as f32;
                let p = center.truncate() + Vec2::from_angle(angle) * radius;
                GpuVertex::new(self.from_screen(p.x, p.y, center.z), outer)
            })
            .collect();
        for pair in rim.windows(2) {
            self.push_triangle([mid, pair[0], pair[1]]);
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
            let rim = (color.xyz() * 0.6).extend(color.w);
            match edge {
                Some(edge) if rp > 1.0 => {
                    self.disc(s, rp, edge, edge);
                    self.disc(s, rp - 1.0, color, rim);
                }
                _ => self.disc(s, rp, color, rim),
            }
        }
    }

    fn draw_lines(&mut self, positions: &[Vec3], colors: &[Vec4], segments: &[[u32; 2]], width: f32, model: Mat4) {
        let half = (width * self.pixel_scale).max(1.0) / 2.0;
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
            let dir = (b.truncate() - a.truncate()).try_normalize().unwrap_or(Vec2::X);
            let n = dir.perp() * half;
            // Square caps, as wide as the line.
            let (a2, b2) = (a.truncate() - dir * half, b.truncate() + dir * half);
            let quad = [
                GpuVertex::new(self.from_screen(a2.x + n.x, a2.y + n.y, a.z), ca),
                GpuVertex::new(self.from_screen(b2.x + n.x, b2.y + n.y, b.z), cb),
                GpuVertex::new(self.from_screen(b2.x - n.x, b2.y - n.y, b.z), cb),
                GpuVertex::new(self.from_screen(a2.x - n.x, a2.y - n.y, a.z), ca),
            ];
            self.push_quad(quad);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_image(&mut self, origin: Vec3, u: Vec3, v: Vec3, width: u32, height: u32, pixels: &[Vec4], model: Mat4) {
        if width == 0 || height == 0 || pixels.len() < (width * height) as usize {
            log::warn!("image primitive has {} pixels for {width}x{height}, skipped", pixels.len());
            return;
        }
        let (w, h) = (width as usize, height as usize);
        let grid: Vec<Vec4> = (0..=h)
            .flat_map(|j| (0..=w).map(move |i| (i, j)))
            .map(|(i, j)| {
                let p = origin + u * (i as f32 / w as f32) + v * (j as f32 / h as f32);
                self.to_clip(model.transform_point3(p))
            })
            .collect();
        for j in 0..h {
            for i in 0..w {
                let c = pixels[j * w + i];
                let corner = |di: usize, dj: usize| GpuVertex::new(grid[(j + dj) * (w + 1) + i + di], c);
                self.push_quad([corner(0, 0), corner(1, 0), corner(1, 1), corner(0, 1)]);
            }
        }
    }

    fn draw_text(&mut self, position: Vec3, text: &str, color: Vec4, size: f32, bold: bool, model: Mat4) {
        let Some(s) = self.to_screen(model.transform_point3(position)) else {
            return;
        };
        let cell = (size * self.pixel_scale / font::GLYPH_HEIGHT as f32).round().max(1.0);
        let width = font::text_width(text) as f32 * cell;
        let x0 = s.x.round() - (width / 2.0).floor();
        let y0 = s.y.round() - (font::GLYPH_HEIGHT as f32 * cell / 2.0).floor();
        let dx = cell + f32::from(u8::from(bold));
        let mut lit = Vec::new();
        font::for_each_pixel(text, |x, y| lit.push((x as f32, y as f32)));
        let quads: Vec<GpuVertex> = lit
            .into_iter()
            .flat_map(|(fx, fy)| {
                let (x, y) = (x0 + fx * cell, y0 + fy * cell);
                let corners = [(x, y), (x + dx, y), (x + dx, y + cell), (x, y + cell)];
                [0, 1, 2, 0, 2, 3].map(|k| GpuVertex::new(self.from_screen(corners[k].0, corners[k].1, 0.0), color))
            })
            .collect();
        self.overlay.extend(quads);
    }
}

impl RenderContext for GpuPass<'_> {
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

impl Drop for GpuPass<'_> {
    fn drop(&mut self) {
        self.canvas
            .draw(self.viewport, [&self.opaque, &self.translucent, &self.overlay]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use visbrain_core::view::Rotation;

    /// `None` when the host has no adapter; the tests then have nothing to
    /// check.
    fn gpu(width: u32, height: u32) -> Option<GpuCanvas> {
        GpuCanvas::new(width, height).ok()
    }

    fn top_camera() -> Camera {
        let mut camera = Camera::new(1.0);
        camera.rotate(Rotation::Top);
        camera.look_at_box(Vec3::splat(-1.0), Vec3::splat(1.0));
        camera
    }

    #[test]
    fn test_aligned_bytes_per_row() {
        assert_eq!(aligned_bytes_per_row(1), 256);
        assert_eq!(aligned_bytes_per_row(64), 256);
        assert_eq!(aligned_bytes_per_row(65), 512);
    }

    #[test]
    fn test_default_backend_has_requested_size() {
        let backend = default_backend(40, 30, 512);
        assert_eq!(backend.size(), (40, 30));
        assert!(backend.max_size() <= 512);
        assert_eq!(backend.read_pixels().dimensions(), (40, 30));
    }

    #[test]
    fn test_clear_fill_and_read_back() {
        let Some(mut canvas) = gpu(70, 20) else {
            return;
        };
        canvas.set_bgcolor(Vec4::new(0.0, 0.0, 1.0, 1.0));
        canvas.clear();
        canvas.fill_viewport(Viewport { x: 10, y: 5, width: 4, height: 4 }, Vec4::new(1.0, 0.0, 0.0, 1.0)).unwrap();
        let img = canvas.read_pixels();
        assert_eq!(img.dimensions(), (70, 20));
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(img.get_pixel(11, 6).0, [255, 0, 0, 255]);
        assert!(canvas.fill_viewport(Viewport { x: 68, y: 0, width: 4, height: 1 }, Vec4::ONE).is_err());
    }

    #[test]
    fn test_triangle_and_resize() {
        let Some(mut canvas) = gpu(50, 50) else {
            return;
        };
        canvas.resize(64, 48).unwrap();
        assert_eq!(canvas.size(), (64, 48));
        assert!(canvas.resize(0, 10).is_err());
        {
            let mut pass = canvas.begin_pass(Viewport::full(64, 48), &top_camera()).unwrap();
            pass.submit(
                Primitive::Mesh {
                    vertices: Cow::Owned(vec![Vec3::new(-1.0, -1.0, 0.0), Vec3::new(1.0, -1.0, 0.0), Vec3::new(0.0, 1.0, 0.0)]),
                    normals: Cow::Owned(vec![Vec3::Z; 3]),
                    faces: Cow::Owned(vec![[0, 1, 2]]),
                    colors: Cow::Owned(vec![Vec4::new(1.0, 0.0, 0.0, 1.0)]),
                },
                Mat4::IDENTITY,
            );
        }
        let img = canvas.read_pixels();
        let center = img.get_pixel(32, 24);
        assert!(center[0] > 200 && center[1] < 30 && center[2] < 30);
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }
}

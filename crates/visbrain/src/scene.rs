//! Scene composition.
//!
//! A [`SceneObj`] lays objects out on a grid of subplots. Each occupied cell
//! is a [`SubScene`] with its own camera; cameras of several cells can be
//! linked so that they share one view. The scene owns every object it holds
//! and objects only keep the [`NodeId`] of their subplot.
//!
//! Rendering goes through a [`CanvasBackend`]. Screenshots temporarily resize
//! the backend, render, crop and encode, then restore the previous size and
//! background whatever happened in between.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use glam::{Mat4, Quat, Vec3, Vec4};
use image::{Rgba, RgbaImage};
use visbrain_core::{
    downcast_mut, downcast_ref, NodeId, Projection, Result, Rotation, SceneOptions, VisbrainError, VisbrainObject,
};
use visbrain_render::{
    autocrop, crop_region, default_backend, save_image, target_size, Camera, CameraState, CanvasBackend, RenderError,
    SizeRequest, SoftwareCanvas, Viewport,
};

/// A camera shared by linked subplots.
pub type SharedCamera = Rc<RefCell<Camera>>;

/// Title drawn at the top of a subplot.
#[derive(Debug, Clone, PartialEq)]
pub struct Title {
    pub text: String,
    pub size: f32,
    pub color: Vec4,
    pub bold: bool,
}

/// Options of [`SceneObj::add_to_subplot`].
#[derive(Debug, Clone)]
pub struct SubplotOptions {
    pub row_span: usize,
    pub col_span: usize,
    pub title: Option<String>,
    /// Title styling; `None` falls back to the scene defaults.
    pub title_size: Option<f32>,
    pub title_color: Option<Vec4>,
    pub title_bold: Option<bool>,
    /// Refit the subplot camera on this object even if the cell exists.
    pub use_this_cam: bool,
    pub rotate: Option<Rotation>,
    pub camera_state: Option<CameraState>,
    /// Largest size of the cell in pixels.
    pub width_max: Option<u32>,
    pub height_max: Option<u32>,
}

impl Default for SubplotOptions {
    fn default() -> Self {
        Self {
            row_span: 1,
            col_span: 1,
            title: None,
            title_size: None,
            title_color: None,
            title_bold: None,
            use_this_cam: false,
            rotate: None,
            camera_state: None,
            width_max: None,
            height_max: None,
        }
    }
}

impl SubplotOptions {
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotate = Some(rotation);
        self
    }

    #[must_use]
    pub fn spanning(mut self, row_span: usize, col_span: usize) -> Self {
        self.row_span = row_span;
        self.col_span = col_span;
        self
    }
}

/// Subplots whose cameras should be linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link<'a> {
    /// Every occupied cell.
    All,
    Cells(&'a [(usize, usize)]),
}

impl<'a> Link<'a> {
    /// `[-1]` means every cell, anything else is read as `(row, col)` pairs.
    pub fn from_indices(indices: &[i64], cells: &'a mut Vec<(usize, usize)>) -> Result<Self> {
        if indices == [-1] {
            return Ok(Self::All);
        }
        if indices.len() % 2 != 0 {
            return Err(VisbrainError::invalid(format!("link expects (row, col) pairs, got {indices:?}")));
        }
        cells.clear();
        for pair in indices.chunks(2) {
            let row = usize::try_from(pair[0]).map_err(|_| VisbrainError::invalid(format!("bad row {}", pair[0])))?;
            let col = usize::try_from(pair[1]).map_err(|_| VisbrainError::invalid(format!("bad col {}", pair[1])))?;
            cells.push((row, col));
        }
        Ok(Self::Cells(cells))
    }
}

/// Options of [`SceneObj::screenshot`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenshotOptions {
    pub size: SizeRequest,
    /// `(x, y, width, height)` of the output to keep.
    pub region: Option<(u32, u32, u32, u32)>,
    /// Crop to the pixels that differ from the background.
    pub autocrop: bool,
    /// Background for this screenshot only.
    pub bgcolor: Option<Vec4>,
    /// Zero background alpha. Only PNG and TIFF keep it.
    pub transparent: bool,
}

/// One occupied cell of the grid.
pub struct SubScene {
    id: NodeId,
    row: usize,
    col: usize,
    row_span: usize,
    col_span: usize,
    title: Option<Title>,
    camera: SharedCamera,
    home: CameraState,
    camera_owner: Option<String>,
    objects: Vec<Box<dyn VisbrainObject>>,
    width_max: Option<u32>,
    height_max: Option<u32>,
}

impl SubScene {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn cell(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    pub fn span(&self) -> (usize, usize) {
        (self.row_span, self.col_span)
    }

    pub fn title(&self) -> Option<&Title> {
        self.title.as_ref()
    }

    /// The camera, shared with every linked subplot.
    pub fn camera(&self) -> SharedCamera {
        Rc::clone(&self.camera)
    }

    /// Name of the object the camera was fitted on.
    pub fn camera_owner(&self) -> Option<&str> {
        self.camera_owner.as_deref()
    }

    pub fn objects(&self) -> impl Iterator<Item = &dyn VisbrainObject> {
        self.objects.iter().map(|o| &**o)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Union of the world bounding boxes of the visible objects.
    pub fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        self.objects
            .iter()
            .filter(|o| o.visible_obj())
            .filter_map(|o| o.world_bounding_box())
            .reduce(|(amin, amax), (bmin, bmax)| (amin.min(bmin), amax.max(bmax)))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.objects.iter().position(|o| o.name() == name)
    }
}

/// A grid of subplots rendered through one canvas.
pub struct SceneObj {
    options: SceneOptions,
    backend: Box<dyn CanvasBackend>,
    subscenes: Vec<SubScene>,
    next_id: u64,
    pixel_scale: f32,
}

impl SceneObj {
    /// A scene drawing into a GPU canvas of `options.size`, or a software
    /// canvas when no graphics adapter is available.
    pub fn new(options: SceneOptions) -> Self {
        let (width, height) = options.size;
        let backend = default_backend(width.max(1), height.max(1), options.max_canvas_size);
        Self::with_backend(options, backend)
    }

    /// A scene drawing into a software canvas of `options.size`.
    pub fn software(options: SceneOptions) -> Self {
        let (width, height) = options.size;
        let canvas = SoftwareCanvas::new(width.max(1), height.max(1)).with_max_size(options.max_canvas_size);
        Self::with_backend(options, Box::new(canvas))
    }

    /// A scene drawing into `backend`.
    pub fn with_backend(options: SceneOptions, mut backend: Box<dyn CanvasBackend>) -> Self {
        backend.set_bgcolor(options.bgcolor);
        backend.clear();
        log::info!("scene created ({}x{})", backend.size().0, backend.size().1);
        Self {
            options,
            backend,
            subscenes: Vec::new(),
            next_id: 0,
            pixel_scale: 1.0,
        }
    }

    pub fn options(&self) -> &SceneOptions {
        &self.options
    }

    /// Current canvas size in pixels.
    pub fn size(&self) -> (u32, u32) {
        self.backend.size()
    }

    pub fn bgcolor(&self) -> Vec4 {
        self.backend.bgcolor()
    }

    pub fn set_bgcolor(&mut self, color: Vec4) {
        self.options.bgcolor = color;
        self.backend.set_bgcolor(color);
    }

    /// `(rows, cols)` covered by the occupied cells and their spans.
    pub fn grid_shape(&self) -> (usize, usize) {
        self.subscenes.iter().fold((0, 0), |(rows, cols), s| {
            (rows.max(s.row + s.row_span), cols.max(s.col + s.col_span))
        })
    }

    /// Occupied cells in creation order.
    pub fn subscenes(&self) -> &[SubScene] {
        &self.subscenes
    }

    fn index_of(&self, row: usize, col: usize) -> Result<usize> {
        self.subscenes
            .iter()
            .position(|s| s.row == row && s.col == col)
            .ok_or(VisbrainError::SubplotNotFound { row, col })
    }

    pub fn subplot(&self, row: usize, col: usize) -> Result<&SubScene> {
        Ok(&self.subscenes[self.index_of(row, col)?])
    }

    /// Places `obj` in the cell `(row, col)`.
    ///
    /// The first object of a cell creates it, with a camera fitted on that
    /// object's preferred view. Later objects leave the camera alone unless
    /// `use_this_cam` is set. Every object is scaled by the fix-gl factor
    /// before it is attached.
    pub fn add_to_subplot<T: VisbrainObject>(
        &mut self,
        mut obj: T,
        row: usize,
        col: usize,
        options: &SubplotOptions,
    ) -> Result<NodeId> {
        if options.row_span == 0 || options.col_span == 0 {
            return Err(VisbrainError::invalid(format!(
                "subplot span ({}, {}) must be at least 1",
                options.row_span, options.col_span
            )));
        }
        if let Ok(idx) = self.index_of(row, col) {
            if self.subscenes[idx].position(obj.name()).is_some() {
                return Err(VisbrainError::ObjectExists(obj.name().to_string()));
            }
        }

        let factor = self.options.fix_gl_factor;
        obj.set_transform(Mat4::from_scale(Vec3::splat(factor)) * obj.transform());

        let (idx, created) = match self.index_of(row, col) {
            Ok(idx) => (idx, false),
            Err(_) => {
                let id = NodeId(self.next_id);
                self.next_id += 1;
                let camera = Camera::default();
                self.subscenes.push(SubScene {
                    id,
                    row,
                    col,
                    row_span: options.row_span,
                    col_span: options.col_span,
                    title: None,
                    home: camera.state(),
                    camera_owner: None,
                    camera: Rc::new(RefCell::new(camera)),
                    objects: Vec::new(),
                    width_max: None,
                    height_max: None,
                });
                log::debug!("subplot ({row}, {col}) created");
                (self.subscenes.len() - 1, true)
            }
        };

        if created || options.use_this_cam {
            let aspect = self.cell_viewport(&self.subscenes[idx], self.backend.size()).aspect();
            let camera = Camera::from_preset(&obj.preferred_view(), obj.world_bounding_box(), aspect);
            let sub = &mut self.subscenes[idx];
            sub.home = camera.state();
            sub.camera_owner = Some(obj.name().to_string());
            *sub.camera.borrow_mut() = camera;
        }

        let sub = &mut self.subscenes[idx];
        if let Some(rotation) = options.rotate {
            sub.camera.borrow_mut().rotate(rotation);
        }
        if let Some(state) = &options.camera_state {
            sub.camera.borrow_mut().set_state(state);
        }
        if let Some(text) = &options.title {
            sub.title = Some(Title {
                text: text.clone(),
                size: options.title_size.unwrap_or(self.options.title_size),
                color: options.title_color.unwrap_or(self.options.title_color),
                bold: options.title_bold.unwrap_or(self.options.title_bold),
            });
        }
        if options.width_max.is_some() {
            sub.width_max = options.width_max;
        }
        if options.height_max.is_some() {
            sub.height_max = options.height_max;
        }

        obj.set_parent(Some(sub.id));
        log::debug!("'{}' ({}) added to subplot ({row}, {col})", obj.name(), obj.type_name());
        sub.objects.push(Box::new(obj));
        Ok(sub.id)
    }

    /// Looks up an object of type `T` by name in a cell.
    pub fn object<T: VisbrainObject>(&self, row: usize, col: usize, name: &str) -> Option<&T> {
        let sub = self.subplot(row, col).ok()?;
        let obj = &sub.objects[sub.position(name)?];
        downcast_ref::<T>(obj.as_ref())
    }

    /// Mutable lookup of an object of type `T` by name in a cell.
    pub fn object_mut<T: VisbrainObject>(&mut self, row: usize, col: usize, name: &str) -> Option<&mut T> {
        let idx = self.index_of(row, col).ok()?;
        let sub = &mut self.subscenes[idx];
        let pos = sub.position(name)?;
        downcast_mut::<T>(sub.objects[pos].as_mut())
    }

    /// Detaches an object from its cell and hands it back.
    pub fn remove(&mut self, row: usize, col: usize, name: &str) -> Option<Box<dyn VisbrainObject>> {
        let idx = self.index_of(row, col).ok()?;
        let sub = &mut self.subscenes[idx];
        let pos = sub.position(name)?;
        let mut obj = sub.objects.remove(pos);
        if sub.camera_owner.as_deref() == Some(name) {
            sub.camera_owner = None;
        }
        obj.set_parent(None);
        Some(obj)
    }

    /// Shares one camera between several subplots: the first cell's.
    pub fn link(&mut self, cells: Link<'_>) -> Result<()> {
        let indices: Vec<usize> = match cells {
            Link::All => (0..self.subscenes.len()).collect(),
            Link::Cells(cells) => cells
                .iter()
                .map(|&(row, col)| self.index_of(row, col))
                .collect::<Result<_>>()?,
        };
        if indices.len() < 2 {
            return Err(VisbrainError::invalid("linking needs at least two subplots"));
        }
        let shared = Rc::clone(&self.subscenes[indices[0]].camera);
        for &i in &indices[1..] {
            self.subscenes[i].camera = Rc::clone(&shared);
        }
        log::debug!("{} subplots linked", indices.len());
        Ok(())
    }

    pub fn camera_state(&self, row: usize, col: usize) -> Result<CameraState> {
        Ok(self.subplot(row, col)?.camera.borrow().state())
    }

    pub fn set_camera_state(&mut self, row: usize, col: usize, state: &CameraState) -> Result<()> {
        self.subplot(row, col)?.camera.borrow_mut().set_state(state);
        Ok(())
    }

    /// Turns the camera of a subplot (and of every linked subplot).
    pub fn rotate(&mut self, row: usize, col: usize, rotation: Rotation) -> Result<()> {
        self.subplot(row, col)?.camera.borrow_mut().rotate(rotation);
        Ok(())
    }

    /// Puts a subplot camera back in the state it had when it was fitted.
    pub fn reset_camera(&mut self, row: usize, col: usize) -> Result<()> {
        let sub = self.subplot(row, col)?;
        sub.camera.borrow_mut().set_state(&sub.home);
        Ok(())
    }

    /// Gives every object of a cell the scale of the cell's first object,
    /// keeping rotations and translations. Returns how many transforms
    /// changed.
    pub fn standardize(&mut self) -> usize {
        let mut changed = 0;
        for sub in &mut self.subscenes {
            let Some(first) = sub.objects.first() else {
                continue;
            };
            let reference = uniform_scale(first.transform());
            for obj in sub.objects.iter_mut().skip(1) {
                let (scale, rotation, translation) = obj.transform().to_scale_rotation_translation();
                if (scale - Vec3::splat(reference)).abs().max_element() > reference.abs() * 1e-5 {
                    obj.set_transform(Mat4::from_scale_rotation_translation(
                        Vec3::splat(reference),
                        rotation,
                        translation,
                    ));
                    changed += 1;
                }
            }
        }
        if changed > 0 {
            log::debug!("standardization rescaled {changed} objects");
        }
        changed
    }

    /// Pixel rectangle of a cell for a canvas of `size`.
    fn cell_viewport(&self, sub: &SubScene, size: (u32, u32)) -> Viewport {
        let (rows, cols) = self.grid_shape();
        let cell_w = size.0 / cols.max(1) as u32;
        let cell_h = size.1 / rows.max(1) as u32;
        let mut width = (cell_w * sub.col_span as u32).max(1);
        let mut height = (cell_h * sub.row_span as u32).max(1);
        if let Some(max) = sub.width_max {
            width = width.min(max.max(1));
        }
        if let Some(max) = sub.height_max {
            height = height.min(max.max(1));
        }
        Viewport {
            x: cell_w * sub.col as u32,
            y: cell_h * sub.row as u32,
            width,
            height,
        }
    }

    /// Pixel rectangle of a subplot on the current canvas.
    pub fn viewport(&self, row: usize, col: usize) -> Result<Viewport> {
        Ok(self.cell_viewport(self.subplot(row, col)?, self.backend.size()))
    }

    /// Renders every subplot into the canvas.
    fn render_frame(&mut self) -> Result<()> {
        let size = self.backend.size();
        let viewports: Vec<Viewport> = self.subscenes.iter().map(|s| self.cell_viewport(s, size)).collect();
        self.backend.clear();
        for (sub, viewport) in self.subscenes.iter().zip(viewports) {
            let mut scene_viewport = viewport;
            if let Some(title) = &sub.title {
                let band = ((title.size * self.pixel_scale * 1.5).round() as u32).min(viewport.height / 2);
                if band > 0 {
                    let band_viewport = Viewport { height: band, ..viewport };
                    let camera = title_camera(band_viewport.aspect());
                    let mut pass = self.backend.begin_pass(band_viewport, &camera)?;
                    pass.submit(
                        visbrain_core::Primitive::Text {
                            position: Vec3::ZERO,
                            text: std::borrow::Cow::Borrowed(title.text.as_str()),
                            color: title.color,
                            size: title.size,
                            bold: title.bold,
                        },
                        Mat4::IDENTITY,
                    );
                    scene_viewport = Viewport {
                        y: viewport.y + band,
                        height: viewport.height - band,
                        ..viewport
                    };
                }
            }
            let camera = sub.camera.borrow().clone();
            let mut pass = self.backend.begin_pass(scene_viewport, &camera)?;
            for obj in &sub.objects {
                obj.render(pass.as_mut());
            }
        }
        Ok(())
    }

    /// Renders the scene at its current size.
    pub fn render(&mut self) -> Result<RgbaImage> {
        self.render_frame()?;
        Ok(self.backend.read_pixels())
    }

    /// Renders the scene as requested by `options`, without writing it.
    ///
    /// A target size the backend refuses falls back to the current size
    /// with a warning. Size, background and pixel scale are restored
    /// before returning, also on error.
    pub fn capture(&mut self, options: &ScreenshotOptions) -> Result<RgbaImage> {
        let previous_size = self.backend.size();
        let previous_bg = self.backend.bgcolor();
        let target = target_size(previous_size, options.size).map_err(RenderError::from)?;

        let mut scale = 1.0;
        if target != previous_size {
            match self.backend.resize(target.0, target.1) {
                Ok(()) => scale = target.0 as f32 / previous_size.0.max(1) as f32,
                Err(err) => log::warn!(
                    "{err}; screenshot kept at the current size {}x{}",
                    previous_size.0,
                    previous_size.1
                ),
            }
        }
        let mut bgcolor = options.bgcolor.unwrap_or(previous_bg);
        if options.transparent {
            bgcolor.w = 0.0;
        }
        self.backend.set_bgcolor(bgcolor);
        self.backend.set_pixel_scale(scale);
        self.pixel_scale = scale;
        self.standardize();

        let frame = self.render();
        self.restore(previous_size, previous_bg);

        let mut img = frame?;
        if let Some(region) = options.region {
            img = crop_region(&img, region).map_err(RenderError::from)?;
        }
        if options.autocrop {
            img = autocrop(&img, to_rgba8(bgcolor));
        }
        Ok(img)
    }

    fn restore(&mut self, size: (u32, u32), bgcolor: Vec4) {
        self.pixel_scale = 1.0;
        self.backend.set_pixel_scale(1.0);
        self.backend.set_bgcolor(bgcolor);
        if self.backend.size() != size {
            if let Err(err) = self.backend.resize(size.0, size.1) {
                log::warn!("canvas size could not be restored: {err}");
            }
        }
    }

    /// Renders and writes the scene to `path` (PNG, TIFF or JPEG).
    pub fn screenshot(&mut self, path: &Path, options: &ScreenshotOptions) -> Result<RgbaImage> {
        let img = self.capture(options)?;
        save_image(path, &img).map_err(RenderError::from)?;
        Ok(img)
    }

    /// Shows the current frame on `host`, running its event loop when the
    /// host process is not interactive.
    pub fn preview(&mut self, host: &mut dyn PreviewHost) -> Result<()> {
        let frame = self.render()?;
        host.show(&frame)?;
        if !host.is_interactive() {
            host.run_event_loop()?;
        }
        Ok(())
    }
}

/// Mean of the absolute scale factors of a transform.
fn uniform_scale(transform: Mat4) -> f32 {
    let (scale, _, _): (Vec3, Quat, Vec3) = transform.to_scale_rotation_translation();
    scale.abs().element_sum() / 3.0
}

/// Orthographic camera looking down at a unit band.
fn title_camera(aspect: f32) -> Camera {
    let mut camera = Camera::new(aspect);
    camera.projection = Projection::Orthographic;
    camera.rotate(Rotation::Top);
    camera.target = Vec3::ZERO;
    camera.ortho_scale = 1.0;
    camera
}

fn to_rgba8(color: Vec4) -> Rgba<u8> {
    let c = color.clamp(Vec4::ZERO, Vec4::ONE) * 255.0;
    Rgba([c.x.round() as u8, c.y.round() as u8, c.z.round() as u8, c.w.round() as u8])
}

/// Where previews are shown. The host owns the event loop.
pub trait PreviewHost {
    /// Whether the host process already runs an event loop.
    fn is_interactive(&self) -> bool;

    fn show(&mut self, frame: &RgbaImage) -> Result<()>;

    /// Blocks in the host event loop until the preview is closed.
    fn run_event_loop(&mut self) -> Result<()>;
}

/// A host without a display: every shown frame is written as a
/// timestamped PNG.
pub struct HeadlessHost {
    dir: PathBuf,
    shown: Vec<PathBuf>,
}

impl HeadlessHost {
    /// Writes frames into the temp directory.
    pub fn new() -> Self {
        Self::in_dir(std::env::temp_dir())
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            shown: Vec::new(),
        }
    }

    /// Files written so far.
    pub fn shown(&self) -> &[PathBuf] {
        &self.shown
    }
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new()
    }
}

impl PreviewHost for HeadlessHost {
    fn is_interactive(&self) -> bool {
        false
    }

    fn show(&mut self, frame: &RgbaImage) -> Result<()> {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S%.3f");
        let path = self
            .dir
            .join(format!("visbrain-preview-{stamp}-{}.png", self.shown.len()));
        save_image(&path, frame).map_err(RenderError::from)?;
        self.shown.push(path);
        Ok(())
    }

    fn run_event_loop(&mut self) -> Result<()> {
        log::debug!("headless host has no event loop");
        Ok(())
    }
}

//! The render core: owned visualization state, dirty uniform tracking and
//! the per-frame update/draw cycle.
//!
//! Lifecycle: `Constructed -> Running <-> Stopped -> Disposed`. Every public
//! call after dispose either returns [`RenderError::Disposed`] or `false`,
//! except `dispose` itself which does nothing the second time.
//!
//! Callbacks never receive the core. Code inside `on_render` or `on_error`
//! that needs to steer the core (including disposing it) goes through a
//! [`CoreHandle`]; queued requests are applied once the callback returns.

use std::cell::RefCell;
use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::rc::Rc;

use crate::backend::{GraphicsContext, LocationLookup, RenderSurface};
use crate::compile::POSITION_ATTRIBUTE;
use crate::error::RenderError;
use crate::runtime::{FrameHandle, FrameScheduler};
use crate::shader::ShaderManager;
use crate::state::{DirtyUniforms, PartialState, Uniform, VisualizationState};

/// Name of the program the core builds from the current geometry and
/// projection.
pub const PROGRAM_NAME: &str = "field";

pub const MIN_QUALITY: f32 = 0.1;
pub const MAX_QUALITY: f32 = 1.0;

const QUAD_VERTICES: [f32; 8] = [-1.0, -1.0, 1.0, -1.0, -1.0, 1.0, 1.0, 1.0];
const QUAD_VERTEX_COUNT: u32 = 4;

pub type RenderCallback = Box<dyn FnMut(&VisualizationState)>;
pub type ErrorCallback = Box<dyn FnMut(&RenderError)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Constructed,
    Running,
    Stopped,
    Disposed,
}

/// Narrow control surface used by the performance governor.
pub trait QualityControl {
    /// Requests a new quality factor; returns whether it was accepted.
    fn set_quality(&mut self, quality: f32) -> bool;
    /// Requests a parameter merge; returns whether it was accepted.
    fn update_parameters(&mut self, partial: &PartialState) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
enum CoreRequest {
    UpdateParameters(PartialState),
    SetQuality(f32),
    Start,
    Stop,
    Dispose,
}

/// Cloneable handle that queues control requests for a [`RenderCore`].
#[derive(Clone, Default)]
pub struct CoreHandle {
    requests: Rc<RefCell<VecDeque<CoreRequest>>>,
}

impl fmt::Debug for CoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreHandle")
            .field("queued", &self.requests.borrow().len())
            .finish()
    }
}

impl CoreHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_parameters(&self, partial: PartialState) {
        self.push(CoreRequest::UpdateParameters(partial));
    }

    pub fn set_quality(&self, quality: f32) {
        self.push(CoreRequest::SetQuality(quality));
    }

    pub fn start(&self) {
        self.push(CoreRequest::Start);
    }

    pub fn stop(&self) {
        self.push(CoreRequest::Stop);
    }

    pub fn dispose(&self) {
        self.push(CoreRequest::Dispose);
    }

    pub fn queued(&self) -> usize {
        self.requests.borrow().len()
    }

    fn push(&self, request: CoreRequest) {
        self.requests.borrow_mut().push_back(request);
    }

    fn pop(&self) -> Option<CoreRequest> {
        self.requests.borrow_mut().pop_front()
    }
}

impl QualityControl for CoreHandle {
    fn set_quality(&mut self, quality: f32) -> bool {
        CoreHandle::set_quality(self, quality);
        true
    }

    fn update_parameters(&mut self, partial: &PartialState) -> bool {
        CoreHandle::update_parameters(self, partial.clone());
        true
    }
}

/// Construction options for [`RenderCore::new`].
pub struct CoreOptions {
    /// Parameters merged over the defaults before the first build.
    pub initial: PartialState,
    pub quality: Option<f32>,
    pub on_render: Option<RenderCallback>,
    pub on_error: Option<ErrorCallback>,
    /// Handle whose queued requests the core will serve.
    pub handle: CoreHandle,
}

impl Default for CoreOptions {
    fn default() -> Self {
        Self {
            initial: PartialState::default(),
            quality: None,
            on_render: None,
            on_error: None,
            handle: CoreHandle::new(),
        }
    }
}

impl fmt::Debug for CoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreOptions")
            .field("initial", &self.initial)
            .field("quality", &self.quality)
            .field("on_render", &self.on_render.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

pub struct RenderCore<G: GraphicsContext, S: RenderSurface> {
    surface: S,
    graphics: G,
    shaders: ShaderManager<G>,
    scheduler: Box<dyn FrameScheduler>,
    state: VisualizationState,
    dirty: DirtyUniforms,
    rebuild_pending: bool,
    quad: Option<G::Buffer>,
    attribute_bound: bool,
    lifecycle: Lifecycle,
    scheduled: Option<FrameHandle>,
    start_time: Option<f64>,
    frames: u64,
    missing_reported: BTreeSet<Uniform>,
    on_render: Option<RenderCallback>,
    on_error: Option<ErrorCallback>,
    handle: CoreHandle,
    applying_requests: bool,
}

impl<G: GraphicsContext, S: RenderSurface> fmt::Debug for RenderCore<G, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderCore")
            .field("lifecycle", &self.lifecycle)
            .field("state", &self.state)
            .field("rebuild_pending", &self.rebuild_pending)
            .field("scheduled", &self.scheduled)
            .field("frames", &self.frames)
            .finish_non_exhaustive()
    }
}

impl<G: GraphicsContext, S: RenderSurface> RenderCore<G, S> {
    /// Validates the surface and graphics binding, sets up pipeline state and
    /// the quad buffer, then attempts the first shader build.
    ///
    /// Validation failures are reported to `on_error` and returned. A failed
    /// initial build is only reported; the core is returned unstarted with
    /// the rebuild still pending.
    pub fn new(
        surface: S,
        mut graphics: G,
        shaders: ShaderManager<G>,
        scheduler: Box<dyn FrameScheduler>,
        mut options: CoreOptions,
    ) -> Result<Self, RenderError> {
        let validation = validate_binding(&surface, &graphics, &shaders);
        if let Err(err) = validation {
            tracing::error!(error = %err, "render core construction failed");
            if let Some(on_error) = options.on_error.as_mut() {
                on_error(&err);
            }
            return Err(err);
        }

        let mut state = VisualizationState::default();
        state.merge(&options.initial);
        state.resolution = graphics.drawing_buffer_size();

        let Some(quad) = graphics.create_vertex_buffer(&QUAD_VERTICES) else {
            let err = RenderError::InvalidBinding("failed to allocate quad buffer".to_string());
            if let Some(on_error) = options.on_error.as_mut() {
                on_error(&err);
            }
            return Err(err);
        };

        let mut core = Self {
            surface,
            graphics,
            shaders,
            scheduler,
            state,
            dirty: DirtyUniforms::default(),
            rebuild_pending: true,
            quad: Some(quad),
            attribute_bound: false,
            lifecycle: Lifecycle::Constructed,
            scheduled: None,
            start_time: None,
            frames: 0,
            missing_reported: BTreeSet::new(),
            on_render: options.on_render.take(),
            on_error: options.on_error.take(),
            handle: options.handle,
            applying_requests: false,
        };

        core.dirty.mark_all(false);
        core.graphics.set_clear_color(core.state.clear_color());
        core.sync_backing_size();
        let (width, height) = core.graphics.drawing_buffer_size();
        core.graphics.set_viewport(width, height);
        core.graphics.configure_pipeline_state();

        if let Some(quality) = options.quality {
            core.set_quality(quality);
        }

        if let Err(err) = core.rebuild() {
            tracing::warn!(error = %err, "initial shader build failed");
            core.report(err);
        }

        tracing::debug!(
            geometry = %core.state.geometry,
            projection = %core.state.projection,
            resolution = ?core.state.resolution,
            "render core constructed"
        );
        Ok(core)
    }

    /// Merges `partial` into the state and marks exactly the affected
    /// uniforms dirty. Geometry and projection changes defer a rebuild to
    /// the next frame or `start`.
    pub fn update_parameters(&mut self, partial: &PartialState) -> Result<(), RenderError> {
        self.ensure_live()?;
        for change in self.state.merge(partial) {
            if change.key.requires_rebuild() {
                self.rebuild_pending = true;
            } else {
                self.dirty.mark_change(&change);
            }
            tracing::trace!(
                parameter = ?change.key,
                uniforms = ?change.uniforms,
                "parameter changed"
            );
        }
        Ok(())
    }

    /// Starts the frame loop. Does nothing if already running.
    pub fn start(&mut self) -> Result<(), RenderError> {
        self.ensure_live()?;
        if self.lifecycle == Lifecycle::Running {
            return Ok(());
        }
        if self.graphics.is_context_lost() {
            self.report(RenderError::ContextLost);
            return Err(RenderError::ContextLost);
        }

        if self.rebuild_pending {
            if let Err(err) = self.rebuild() {
                self.report(err.clone());
                return Err(err);
            }
        } else {
            self.bind_vertex_attribute();
        }

        // time restarts at zero so the first delta is never negative
        self.start_time = None;
        self.state.time = 0.0;
        self.dirty.mark_all(true);
        self.lifecycle = Lifecycle::Running;
        self.scheduled = Some(self.scheduler.schedule_next_frame());
        tracing::info!(
            geometry = %self.state.geometry,
            projection = %self.state.projection,
            "render loop started"
        );
        Ok(())
    }

    /// Cancels the scheduled frame; no frame runs after this returns.
    pub fn stop(&mut self) -> Result<(), RenderError> {
        self.ensure_live()?;
        self.halt_loop();
        Ok(())
    }

    /// Releases every graphics resource and enters the terminal state.
    pub fn dispose(&mut self) {
        if self.lifecycle == Lifecycle::Disposed {
            return;
        }
        self.halt_loop();
        if let Some(quad) = self.quad.take() {
            self.graphics.delete_buffer(quad);
        }
        self.shaders.dispose(&mut self.graphics);
        self.graphics.lose_context();
        self.lifecycle = Lifecycle::Disposed;
        self.attribute_bound = false;
        self.on_render = None;
        self.on_error = None;
        self.dirty.clear();
        tracing::debug!(frames = self.frames, "render core disposed");
    }

    /// Clamps `quality` to `[0.1, 1.0]` and resizes the backing store when
    /// the scaled size changes. Below 0.5 the grid density is thinned out as
    /// well. Returns whether the call was accepted.
    pub fn set_quality(&mut self, quality: f32) -> bool {
        if self.lifecycle == Lifecycle::Disposed {
            return false;
        }
        if quality.is_nan() {
            tracing::warn!("rejecting NaN quality");
            return false;
        }

        let quality = quality.clamp(MIN_QUALITY, MAX_QUALITY);
        if quality == self.state.quality {
            return true;
        }
        self.state.quality = quality;
        self.sync_backing_size();
        tracing::debug!(quality, resolution = ?self.state.resolution, "quality changed");

        if quality < 0.5 {
            let density = self.state.grid_density * (0.5 + quality * 0.5);
            let partial = PartialState {
                grid_density: Some(density),
                ..PartialState::default()
            };
            if let Err(err) = self.update_parameters(&partial) {
                tracing::warn!(error = %err, "failed to scale grid density");
            }
        }
        true
    }

    pub fn quality(&self) -> f32 {
        self.state.quality
    }

    pub fn state(&self) -> &VisualizationState {
        &self.state
    }

    /// Uniforms waiting to be uploaded on the next frame.
    pub fn dirty_uniforms(&self) -> BTreeSet<Uniform> {
        self.dirty.snapshot()
    }

    pub fn rebuild_pending(&self) -> bool {
        self.rebuild_pending
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Frame currently scheduled with the host, if any.
    pub fn scheduled_frame(&self) -> Option<FrameHandle> {
        self.scheduled
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    pub fn handle(&self) -> CoreHandle {
        self.handle.clone()
    }

    pub fn graphics(&self) -> &G {
        &self.graphics
    }

    pub fn shaders(&self) -> &ShaderManager<G> {
        &self.shaders
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Applies requests queued on the [`CoreHandle`] from outside a callback.
    pub fn process_requests(&mut self) {
        self.apply_requests();
    }

    /// Runs one frame for `handle`. Frames that were cancelled or superseded
    /// are ignored. Returns whether a frame was drawn.
    pub fn run_frame(&mut self, handle: FrameHandle, timestamp_ms: f64) -> bool {
        if self.lifecycle != Lifecycle::Running || self.scheduled != Some(handle) {
            tracing::trace!(?handle, "ignoring stale frame");
            return false;
        }
        self.scheduled = None;

        if self.graphics.is_context_lost() {
            self.fail(RenderError::ContextLost);
            return false;
        }

        let start = *self.start_time.get_or_insert(timestamp_ms);
        let current = ((timestamp_ms - start) / 1000.0).max(0.0);
        self.state.delta_time = current - self.state.time;
        self.state.time = current;
        self.dirty.mark(Uniform::Time);

        self.sync_backing_size();

        if self.rebuild_pending {
            if let Err(err) = self.rebuild() {
                self.fail(err);
                return false;
            }
        }

        self.push_uniforms();

        self.graphics.set_clear_color(self.state.clear_color());
        self.graphics.clear();
        if !self.attribute_bound {
            self.bind_vertex_attribute();
        }
        if self.attribute_bound {
            if let Err(message) = self.graphics.draw_triangle_strip(QUAD_VERTEX_COUNT) {
                self.fail(RenderError::DrawFailed(message));
                return false;
            }
        }
        if let Err(message) = self.graphics.present() {
            self.fail(RenderError::DrawFailed(message));
            return false;
        }
        self.frames += 1;

        if let Some(mut on_render) = self.on_render.take() {
            on_render(&self.state);
            if self.lifecycle != Lifecycle::Disposed {
                self.on_render = Some(on_render);
            }
        }
        self.apply_requests();

        if self.lifecycle == Lifecycle::Running && self.scheduled.is_none() {
            self.scheduled = Some(self.scheduler.schedule_next_frame());
        }
        true
    }

    fn ensure_live(&self) -> Result<(), RenderError> {
        if self.lifecycle == Lifecycle::Disposed {
            Err(RenderError::Disposed)
        } else {
            Ok(())
        }
    }

    fn halt_loop(&mut self) {
        if let Some(handle) = self.scheduled.take() {
            self.scheduler.cancel(handle);
        }
        if self.lifecycle == Lifecycle::Running {
            self.lifecycle = Lifecycle::Stopped;
            tracing::debug!(frames = self.frames, "render loop stopped");
        }
    }

    /// Stops the loop and reports `err`.
    fn fail(&mut self, err: RenderError) {
        self.halt_loop();
        self.report(err);
    }

    fn report(&mut self, err: RenderError) {
        tracing::error!(error = %err, "render core error");
        if let Some(mut on_error) = self.on_error.take() {
            on_error(&err);
            if self.lifecycle != Lifecycle::Disposed {
                self.on_error = Some(on_error);
            }
        }
        self.apply_requests();
    }

    fn apply_requests(&mut self) {
        if self.applying_requests {
            return;
        }
        self.applying_requests = true;
        while let Some(request) = self.handle.pop() {
            if self.lifecycle == Lifecycle::Disposed {
                continue;
            }
            match request {
                CoreRequest::UpdateParameters(partial) => {
                    let _ = self.update_parameters(&partial);
                }
                CoreRequest::SetQuality(quality) => {
                    self.set_quality(quality);
                }
                CoreRequest::Start => {
                    // Failures were already reported to `on_error`.
                    let _ = self.start();
                }
                CoreRequest::Stop => self.halt_loop(),
                CoreRequest::Dispose => self.dispose(),
            }
        }
        self.applying_requests = false;
    }

    fn rebuild(&mut self) -> Result<(), RenderError> {
        self.shaders.create_dynamic_program(
            &mut self.graphics,
            PROGRAM_NAME,
            &self.state.geometry,
            &self.state.projection,
        )?;
        if !self.shaders.use_program(&mut self.graphics, Some(PROGRAM_NAME)) {
            return Err(RenderError::LinkFailed(format!(
                "program `{PROGRAM_NAME}` could not be activated"
            )));
        }
        self.rebuild_pending = false;
        self.missing_reported.clear();
        self.dirty.mark_all(false);
        self.bind_vertex_attribute();
        tracing::debug!(
            geometry = %self.state.geometry,
            projection = %self.state.projection,
            "shader program rebuilt"
        );
        Ok(())
    }

    fn bind_vertex_attribute(&mut self) {
        let Some(quad) = self.quad.as_ref() else {
            self.attribute_bound = false;
            return;
        };
        match self
            .shaders
            .attribute_location(&mut self.graphics, POSITION_ATTRIBUTE)
        {
            LocationLookup::Found(location) => {
                self.graphics.enable_vertex_attribute(quad, location, 2);
                self.attribute_bound = true;
            }
            LocationLookup::Missing => {
                tracing::warn!(attribute = POSITION_ATTRIBUTE, "vertex attribute not active");
                self.attribute_bound = false;
            }
            LocationLookup::Pending => self.attribute_bound = false,
        }
    }

    /// Uploads every dirty uniform. Pending locations stay dirty; uniforms
    /// the program does not expose are dropped.
    fn push_uniforms(&mut self) {
        let pending = self.dirty.take();
        let mut retained = Vec::new();
        for uniform in pending {
            match self.shaders.uniform_location(&mut self.graphics, uniform.name()) {
                LocationLookup::Found(location) => {
                    let value = self.state.uniform_value(uniform);
                    self.graphics.set_uniform(&location, value);
                }
                LocationLookup::Pending => retained.push(uniform),
                LocationLookup::Missing => {
                    if self.missing_reported.insert(uniform) {
                        tracing::debug!(%uniform, "uniform not active in program; skipping");
                    }
                }
            }
        }
        self.dirty.restore(retained);
    }

    /// Matches the backing store to `client size * quality`. Returns whether
    /// a resize happened.
    fn sync_backing_size(&mut self) -> bool {
        let Some((width, height)) = self.surface.client_size() else {
            return false;
        };
        let target = scaled_size(width, height, self.state.quality);
        if self.graphics.drawing_buffer_size() == target {
            if self.state.resolution != target {
                self.state.resolution = target;
                self.dirty.mark(Uniform::Resolution);
            }
            return false;
        }

        self.graphics.resize_drawing_buffer(target.0, target.1);
        self.graphics.set_viewport(target.0, target.1);
        self.state.resolution = target;
        self.dirty.mark(Uniform::Resolution);
        tracing::debug!(width = target.0, height = target.1, "resized drawing buffer");
        true
    }
}

impl<G: GraphicsContext, S: RenderSurface> QualityControl for RenderCore<G, S> {
    fn set_quality(&mut self, quality: f32) -> bool {
        RenderCore::set_quality(self, quality)
    }

    fn update_parameters(&mut self, partial: &PartialState) -> bool {
        RenderCore::update_parameters(self, partial).is_ok()
    }
}

impl<G: GraphicsContext, S: RenderSurface> Drop for RenderCore<G, S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn validate_binding<G: GraphicsContext, S: RenderSurface>(
    surface: &S,
    graphics: &G,
    shaders: &ShaderManager<G>,
) -> Result<(), RenderError> {
    if surface.client_size().is_none() {
        return Err(RenderError::InvalidSurface(
            "surface has no client area".to_string(),
        ));
    }
    if graphics.is_context_lost() {
        return Err(RenderError::InvalidBinding(
            "graphics context is lost".to_string(),
        ));
    }
    if shaders.is_disposed() {
        return Err(RenderError::InvalidBinding(
            "shader manager was disposed".to_string(),
        ));
    }
    Ok(())
}

/// `round(size * quality)`, never below one pixel.
pub fn scaled_size(width: u32, height: u32, quality: f32) -> (u32, u32) {
    let scale = |value: u32| ((value as f32 * quality).round() as u32).max(1);
    (scale(width), scale(height))
}

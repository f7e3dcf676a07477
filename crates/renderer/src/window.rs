//! Windowed host for the render core.
//!
//! Owns a winit event loop on the calling thread, binds a [`WgpuGraphics`]
//! to the window and drives [`RenderCore::run_frame`] from redraw events.
//! Frames are requested by the core through [`WinitScheduler`] and paced to
//! the configured rate in `AboutToWait`.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::backend::RenderSurface;
use crate::gpu::{PowerPreference, WgpuGraphics};
use crate::render::{CoreOptions, QualityControl, RenderCore};
use crate::runtime::{Clock, FrameHandle, FramePacer, FrameScheduler, SystemClock};
use crate::shader::ShaderManager;
use crate::state::PartialState;

/// Called after every presented frame with the frame timestamp in
/// milliseconds. The governor hooks in here.
pub type FrameObserver = Box<dyn FnMut(f64, &mut dyn QualityControl)>;

#[derive(Debug, Clone)]
pub struct PreviewConfig {
    pub size: (u32, u32),
    pub title: String,
    /// `None` renders as fast as the compositor allows.
    pub target_fps: Option<f32>,
    pub power: PowerPreference,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            size: (1280, 720),
            title: "hyperfield".to_string(),
            target_fps: None,
            power: PowerPreference::default(),
        }
    }
}

/// Window-backed drawing surface.
#[derive(Debug, Clone)]
pub struct WindowSurface {
    window: Arc<Window>,
}

impl WindowSurface {
    pub fn new(window: Arc<Window>) -> Self {
        Self { window }
    }

    pub fn window(&self) -> &Window {
        &self.window
    }
}

impl RenderSurface for WindowSurface {
    fn client_size(&self) -> Option<(u32, u32)> {
        let size = self.window.inner_size();
        (size.width > 0 && size.height > 0).then_some((size.width, size.height))
    }
}

impl HasWindowHandle for WindowSurface {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.window.window_handle()
    }
}

impl HasDisplayHandle for WindowSurface {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.window.display_handle()
    }
}

/// Frame scheduler that records the requested frame; the event loop turns
/// it into a redraw once the pacer allows.
#[derive(Debug, Clone, Default)]
pub struct WinitScheduler {
    next: Rc<Cell<u64>>,
    pending: Rc<Cell<Option<FrameHandle>>>,
}

impl WinitScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<FrameHandle> {
        self.pending.get()
    }

    pub fn take_pending(&self) -> Option<FrameHandle> {
        self.pending.take()
    }
}

impl FrameScheduler for WinitScheduler {
    fn schedule_next_frame(&mut self) -> FrameHandle {
        let handle = FrameHandle(self.next.get() + 1);
        self.next.set(handle.0);
        self.pending.set(Some(handle));
        handle
    }

    fn cancel(&mut self, handle: FrameHandle) {
        if self.pending.get() == Some(handle) {
            self.pending.set(None);
        }
    }
}

/// Maps a cursor position to `[0, 1]` window coordinates.
fn normalized_mouse(position: PhysicalPosition<f64>, size: PhysicalSize<u32>) -> [f32; 2] {
    let width = f64::from(size.width.max(1));
    let height = f64::from(size.height.max(1));
    [
        (position.x / width).clamp(0.0, 1.0) as f32,
        (position.y / height).clamp(0.0, 1.0) as f32,
    ]
}

fn is_exit_key(event: &KeyEvent) -> bool {
    event.state == ElementState::Pressed
        && matches!(event.logical_key, Key::Named(NamedKey::Escape))
}

/// Opens a preview window and runs the render loop until the window is
/// closed or Escape is pressed.
pub fn run_preview(
    config: PreviewConfig,
    shaders: ShaderManager<WgpuGraphics>,
    options: CoreOptions,
    mut observer: Option<FrameObserver>,
) -> Result<()> {
    let event_loop = EventLoopBuilder::new()
        .build()
        .map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let window = WindowBuilder::new()
        .with_title(config.title.clone())
        .with_inner_size(PhysicalSize::new(config.size.0, config.size.1))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create preview window: {err}"))?;
    let window = Arc::new(window);
    let surface = WindowSurface::new(Arc::clone(&window));

    let graphics = WgpuGraphics::new(&surface, config.size, config.power)?;
    let scheduler = WinitScheduler::new();
    let mut core = RenderCore::new(
        surface,
        graphics,
        shaders,
        Box::new(scheduler.clone()),
        options,
    )
    .map_err(|err| anyhow!("failed to initialise render core: {err}"))?;
    core.start()
        .map_err(|err| anyhow!("failed to start render loop: {err}"))?;

    let mut pacer = FramePacer::new(config.target_fps);
    let mut clock = SystemClock::new();
    tracing::info!(
        width = config.size.0,
        height = config.size.1,
        fps = ?config.target_fps,
        "preview window running"
    );

    let run_result = event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
            WindowEvent::KeyboardInput { event, .. } if is_exit_key(&event) => elwt.exit(),
            WindowEvent::CursorMoved { position, .. } => {
                let partial = PartialState {
                    mouse_position: Some(normalized_mouse(position, window.inner_size())),
                    ..PartialState::default()
                };
                if let Err(err) = core.update_parameters(&partial) {
                    tracing::debug!(error = %err, "dropping cursor update");
                }
            }
            WindowEvent::Resized(_) => window.request_redraw(),
            WindowEvent::RedrawRequested => {
                core.process_requests();
                let Some(handle) = scheduler.take_pending() else {
                    return;
                };
                let timestamp = clock.now_ms();
                if core.run_frame(handle, timestamp) {
                    pacer.mark_frame(Instant::now());
                    if let Some(observer) = observer.as_mut() {
                        observer(timestamp, &mut core);
                    }
                } else if !core.is_running() {
                    tracing::warn!("render loop halted; closing preview");
                    elwt.exit();
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            if scheduler.pending().is_none() {
                elwt.set_control_flow(ControlFlow::Wait);
                return;
            }
            let now = Instant::now();
            match pacer.next_deadline() {
                Some(deadline) if deadline > now => {
                    elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
                }
                _ => {
                    window.request_redraw();
                    elwt.set_control_flow(ControlFlow::Wait);
                }
            }
        }
        Event::LoopExiting => core.dispose(),
        _ => {}
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}

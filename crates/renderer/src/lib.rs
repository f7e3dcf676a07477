//! Rendering core for hyperfield, an adaptive 4D visual field.
//!
//! The crate is split along the seams of a single frame:
//!
//! ```text
//!   PartialState ──▶ RenderCore::update_parameters ──▶ dirty uniforms
//!                          │
//!   FrameScheduler ──▶ RenderCore::run_frame ──▶ ShaderManager ──▶ GraphicsContext
//!                                                   ▲
//!                              GeometryProvider / ProjectionProvider
//! ```
//!
//! [`RenderCore`] owns the visualization state and drives the per-frame
//! cycle. [`ShaderManager`] assembles the fragment template with the chosen
//! geometry and projection fragments and caches compiled shaders, linked
//! programs and lookups. Everything graphics-facing goes through the
//! [`GraphicsContext`] trait: [`gpu::WgpuGraphics`] renders into a window,
//! [`headless::HeadlessGraphics`] records calls for tests and offline runs.

pub mod backend;
pub mod compile;
pub mod error;
pub mod gpu;
pub mod headless;
pub mod provider;
pub mod render;
pub mod runtime;
pub mod shader;
pub mod state;
pub mod window;

#[cfg(test)]
mod fixtures;

pub use backend::{
    CompileDiagnostic, GraphicsCapabilities, GraphicsContext, LocationLookup, RenderSurface,
    ShaderStage, UniformValue,
};
pub use compile::{ShaderTemplate, SlotFills, TemplateError};
pub use error::{FragmentKind, RenderError, ShaderError};
pub use provider::{
    FragmentTable, GeometryProvider, ProjectionProvider, ShaderFragment, SourceFragment,
};
pub use render::{
    scaled_size, CoreHandle, CoreOptions, ErrorCallback, Lifecycle, QualityControl,
    RenderCallback, RenderCore, MAX_QUALITY, MIN_QUALITY,
};
pub use runtime::{
    Clock, FrameHandle, FramePacer, FrameScheduler, ManualScheduler, SteppedClock, SystemClock,
};
pub use shader::{ShaderKey, ShaderManager, ShaderStats};
pub use state::{
    AudioLevels, ColorScheme, ParameterKey, PartialAudioLevels, PartialColorScheme, PartialState,
    Uniform, VisualizationState,
};
pub use window::{run_preview, FrameObserver, PreviewConfig};

//! wgpu implementation of [`crate::backend::GraphicsContext`].
//!
//! - `context` owns the instance, device and surface and reports adapter
//!   capabilities.
//! - `reflect` validates GLSL through naga and extracts the uniform block
//!   layout and vertex inputs of each stage.
//! - `pipeline` turns a vertex/fragment pair into a render pipeline with its
//!   own uniform buffer.
//! - `graphics` exposes all of it as [`WgpuGraphics`].

mod context;
mod graphics;
mod pipeline;
mod reflect;

pub use context::{adapter_capabilities, PowerPreference};
pub use graphics::{WgpuBuffer, WgpuGraphics, WgpuProgram, WgpuShader, WgpuUniform};

use crate::backend::{CompileDiagnostic, ShaderStage};

/// Checks that `source` parses and validates as GLSL for `stage` without
/// touching a device.
pub fn validate_glsl(stage: ShaderStage, source: &str) -> Result<(), CompileDiagnostic> {
    reflect::reflect(stage, source).map(|_| ())
}

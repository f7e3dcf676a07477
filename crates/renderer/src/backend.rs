//! Graphics backend abstraction consumed by the shader manager and render core.
//!
//! [`GraphicsContext`] is deliberately shaped like an immediate-mode GL API:
//! shaders and programs are opaque handles, uniforms are addressed through
//! locations looked up by name, and a single vertex buffer feeds a triangle
//! strip. Two implementations ship with the crate:
//!
//! - [`crate::headless::HeadlessGraphics`] records every call and is used by
//!   tests and the `--headless` CLI mode.
//! - [`crate::gpu::WgpuGraphics`] maps the same calls onto wgpu pipelines.

use std::fmt;

/// Stage a shader source is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value written to a single uniform slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
}

impl UniformValue {
    /// Number of 32-bit components carried by the value.
    pub fn components(&self) -> usize {
        match self {
            Self::Float(_) => 1,
            Self::Vec2(_) => 2,
            Self::Vec3(_) => 3,
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        match self {
            Self::Float(value) => std::slice::from_ref(value),
            Self::Vec2(value) => value,
            Self::Vec3(value) => value,
        }
    }
}

/// Outcome of a uniform or attribute location query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationLookup<L> {
    /// The program exposes the name at this location.
    Found(L),
    /// The program was linked and does not expose the name.
    Missing,
    /// The backend cannot answer yet; ask again on a later frame.
    Pending,
}

impl<L> LocationLookup<L> {
    pub fn found(self) -> Option<L> {
        match self {
            Self::Found(location) => Some(location),
            _ => None,
        }
    }
}

/// Compiler diagnostic returned by [`GraphicsContext::compile_shader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileDiagnostic {
    /// One-based line number inside the submitted source, when known.
    pub line: Option<u32>,
    pub message: String,
}

impl CompileDiagnostic {
    pub fn new(line: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for CompileDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {line}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Static facts about the graphics binding, consumed by capability detection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphicsCapabilities {
    /// Whether the primary (modern) rendering API is available.
    pub primary_api: bool,
    /// Whether the fallback rendering API is available.
    pub secondary_api: bool,
    pub max_texture_size: u32,
    pub extensions: Vec<String>,
    /// Human readable adapter description.
    pub renderer: String,
}

/// Drawing surface the core renders into.
pub trait RenderSurface {
    /// Current client area in physical pixels, or `None` when the surface is
    /// detached or not yet realised.
    fn client_size(&self) -> Option<(u32, u32)>;
}

/// Immediate-mode graphics binding used by [`crate::ShaderManager`] and
/// [`crate::RenderCore`].
///
/// Handles are plain values; the caller is responsible for deleting what it
/// creates. Every method must be safe to call after the context was lost, in
/// which case it may do nothing.
pub trait GraphicsContext {
    type Shader;
    type Program: Clone + PartialEq + fmt::Debug;
    type Buffer;
    type UniformLocation: Clone + fmt::Debug;

    fn is_context_lost(&self) -> bool;
    /// Best-effort request to release the underlying device.
    fn lose_context(&mut self);
    fn capabilities(&self) -> GraphicsCapabilities;

    fn compile_shader(
        &mut self,
        stage: ShaderStage,
        source: &str,
    ) -> Result<Self::Shader, CompileDiagnostic>;
    fn delete_shader(&mut self, shader: Self::Shader);

    fn link_program(
        &mut self,
        vertex: &Self::Shader,
        fragment: &Self::Shader,
    ) -> Result<Self::Program, String>;
    fn delete_program(&mut self, program: Self::Program);
    fn use_program(&mut self, program: Option<&Self::Program>);
    fn current_program(&self) -> Option<Self::Program>;

    fn uniform_location(
        &mut self,
        program: &Self::Program,
        name: &str,
    ) -> LocationLookup<Self::UniformLocation>;
    fn attribute_location(&mut self, program: &Self::Program, name: &str) -> LocationLookup<u32>;
    fn set_uniform(&mut self, location: &Self::UniformLocation, value: UniformValue);

    fn create_vertex_buffer(&mut self, data: &[f32]) -> Option<Self::Buffer>;
    fn delete_buffer(&mut self, buffer: Self::Buffer);
    fn enable_vertex_attribute(&mut self, buffer: &Self::Buffer, location: u32, components: u32);

    /// Size of the backing store in pixels.
    fn drawing_buffer_size(&self) -> (u32, u32);
    fn resize_drawing_buffer(&mut self, width: u32, height: u32);
    fn set_viewport(&mut self, width: u32, height: u32);
    /// Disables depth testing and enables straight alpha blending.
    fn configure_pipeline_state(&mut self);
    fn set_clear_color(&mut self, rgba: [f32; 4]);
    fn clear(&mut self);
    fn draw_triangle_strip(&mut self, vertex_count: u32) -> Result<(), String>;
    /// Flushes recorded work to the surface.
    fn present(&mut self) -> Result<(), String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_value_reports_components() {
        assert_eq!(UniformValue::Float(1.0).components(), 1);
        assert_eq!(UniformValue::Vec2([0.0, 1.0]).as_slice(), &[0.0, 1.0]);
        assert_eq!(UniformValue::Vec3([1.0, 2.0, 3.0]).components(), 3);
    }

    #[test]
    fn diagnostic_display_includes_line() {
        let diagnostic = CompileDiagnostic::new(Some(12), "unexpected token");
        assert_eq!(diagnostic.to_string(), "line 12: unexpected token");
        let bare = CompileDiagnostic::new(None, "boom");
        assert_eq!(bare.to_string(), "boom");
    }
}

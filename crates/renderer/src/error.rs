use std::fmt;

use crate::backend::{CompileDiagnostic, ShaderStage};
use crate::compile::TemplateError;

/// Which provider a fragment was requested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    Geometry,
    Projection,
}

impl fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Geometry => f.write_str("geometry"),
            Self::Projection => f.write_str("projection"),
        }
    }
}

/// Failures raised while building shader programs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShaderError {
    #[error("{kind} provider has no shader code for `{name}`")]
    ProviderMissing { kind: FragmentKind, name: String },
    #[error("failed to compile {stage} shader `{label}`: {diagnostic}")]
    CompileFailed {
        stage: ShaderStage,
        label: String,
        diagnostic: CompileDiagnostic,
    },
    #[error("failed to link program `{program}`: {message}")]
    LinkFailed { program: String, message: String },
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("no shader source registered under `{0}`")]
    UnknownSource(String),
    #[error("shader source `{name}` is a {actual} source, expected {expected}")]
    StageMismatch {
        name: String,
        expected: ShaderStage,
        actual: ShaderStage,
    },
    #[error("shader manager has been disposed")]
    Disposed,
}

/// Failures surfaced by [`crate::RenderCore`], either returned directly or
/// passed to the `on_error` callback.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("invalid drawing surface: {0}")]
    InvalidSurface(String),
    #[error("invalid graphics binding: {0}")]
    InvalidBinding(String),
    #[error("{kind} provider has no shader code for `{name}`")]
    ProviderMissing { kind: FragmentKind, name: String },
    #[error("shader compilation failed: {0}")]
    ShaderCompileFailed(String),
    #[error("program link failed: {0}")]
    LinkFailed(String),
    #[error("shader template error: {0}")]
    Template(TemplateError),
    #[error("graphics context lost")]
    ContextLost,
    #[error("draw call failed: {0}")]
    DrawFailed(String),
    #[error("render core used after dispose")]
    Disposed,
}

impl From<ShaderError> for RenderError {
    fn from(err: ShaderError) -> Self {
        match err {
            ShaderError::ProviderMissing { kind, name } => Self::ProviderMissing { kind, name },
            err @ ShaderError::CompileFailed { .. } => Self::ShaderCompileFailed(err.to_string()),
            ShaderError::LinkFailed { program, message } => {
                Self::LinkFailed(format!("{program}: {message}"))
            }
            ShaderError::Template(err) => Self::Template(err),
            err @ (ShaderError::UnknownSource(_) | ShaderError::StageMismatch { .. }) => {
                Self::InvalidBinding(err.to_string())
            }
            ShaderError::Disposed => Self::InvalidBinding("shader manager disposed".to_string()),
        }
    }
}

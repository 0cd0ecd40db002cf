//! Render error types

use std::fmt;

use crate::gpu::StageKind;
use crate::shader::VariableKind;

/// Failures reported by a GPU backend
#[derive(Debug, Clone, PartialEq)]
pub enum GpuError {
    /// No adapter compatible with the surface
    AdapterUnavailable,
    /// The adapter refused to create a device
    DeviceRequest(String),
    /// The window surface could not be created or configured
    SurfaceCreation(String),
    /// Presenting to the surface failed
    Surface(String),
    /// The backend ran out of memory
    OutOfMemory,
    /// The backend cannot allocate another object of this kind
    OutOfHandles(&'static str),
    /// A call was made in a state the backend cannot honour
    InvalidOperation(String),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::AdapterUnavailable => write!(f, "no suitable GPU adapter found"),
            GpuError::DeviceRequest(msg) => write!(f, "failed to create GPU device: {}", msg),
            GpuError::SurfaceCreation(msg) => write!(f, "failed to create surface: {}", msg),
            GpuError::Surface(msg) => write!(f, "surface error: {}", msg),
            GpuError::OutOfMemory => write!(f, "GPU out of memory"),
            GpuError::OutOfHandles(kind) => write!(f, "cannot allocate another {} object", kind),
            GpuError::InvalidOperation(msg) => write!(f, "invalid GPU operation: {}", msg),
        }
    }
}

impl std::error::Error for GpuError {}

/// Errors raised by shader programs and the render controller
///
/// Shader compile and link failures are not errors; they are reported
/// through a [`DiagnosticSink`](crate::diagnostics::DiagnosticSink).
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// `start` was called while a session is running
    AlreadyRunning,
    /// A uniform name that no stage of the program declared
    UnknownUniform(String),
    /// A uniform was set with a value of the wrong kind
    UniformKindMismatch {
        name: String,
        expected: VariableKind,
        found: VariableKind,
    },
    /// Two stages declare the same uniform name with different kinds
    ConflictingUniform(String),
    /// A declared attribute the linked program does not expose
    UnknownAttribute(String),
    /// The vertex layout does not fit the declared attributes or the data
    InvalidLayout(String),
    /// A stage of the wrong kind was passed to link
    StageMismatch { expected: StageKind, found: StageKind },
    /// The GPU backend failed
    Gpu(GpuError),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::AlreadyRunning => write!(f, "render loop is already running"),
            RenderError::UnknownUniform(name) => write!(f, "unknown uniform '{}'", name),
            RenderError::UniformKindMismatch { name, expected, found } => write!(
                f,
                "uniform '{}' is declared as {} but was set with a {}",
                name, expected, found
            ),
            RenderError::ConflictingUniform(name) => {
                write!(f, "uniform '{}' is declared with different kinds", name)
            }
            RenderError::UnknownAttribute(name) => {
                write!(f, "attribute '{}' is not active in the linked program", name)
            }
            RenderError::InvalidLayout(msg) => write!(f, "invalid vertex layout: {}", msg),
            RenderError::StageMismatch { expected, found } => {
                write!(f, "expected a {} stage, got a {} stage", expected, found)
            }
            RenderError::Gpu(e) => write!(f, "GPU error: {}", e),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Gpu(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GpuError> for RenderError {
    fn from(e: GpuError) -> Self {
        RenderError::Gpu(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display_names_the_uniform() {
        let err = RenderError::UnknownUniform("u_modle".to_string());
        assert_eq!(err.to_string(), "unknown uniform 'u_modle'");
    }

    #[test]
    fn test_kind_mismatch_display() {
        let err = RenderError::UniformKindMismatch {
            name: "u_model".to_string(),
            expected: VariableKind::Mat4,
            found: VariableKind::Vec3,
        };
        assert_eq!(
            err.to_string(),
            "uniform 'u_model' is declared as mat4 but was set with a vec3"
        );
    }

    #[test]
    fn test_gpu_error_is_source() {
        let err: RenderError = GpuError::OutOfMemory.into();
        assert!(err.source().is_some());
        assert!(RenderError::AlreadyRunning.source().is_none());
    }
}

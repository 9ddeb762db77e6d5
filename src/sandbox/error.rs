//! Domain-specific error types for sandbox operations.
//!
//! Typed errors enable callers to match on specific failure modes
//! rather than parsing error message strings.

/// Errors that can occur during sandbox operations.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// Docker daemon is not running or not accessible.
    #[error("Docker is not available: {message}")]
    DockerUnavailable { message: String },

    /// Creating or starting the sandbox failed.
    #[error("failed to start sandbox {name}: {message}")]
    CreationFailed { name: String, message: String },

    /// Handing the terminal to the sandbox failed.
    #[error("failed to attach to sandbox {name}: {message}")]
    AttachFailed { name: String, message: String },
}

impl SandboxError {
    /// Creates a `DockerUnavailable` error.
    pub fn docker_unavailable(message: impl Into<String>) -> Self {
        Self::DockerUnavailable {
            message: message.into(),
        }
    }

    /// Creates a `CreationFailed` error.
    pub fn creation_failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CreationFailed {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates an `AttachFailed` error.
    pub fn attach_failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AttachFailed {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Returns true if this is a creation failure.
    pub fn is_creation_failed(&self) -> bool {
        matches!(self, Self::CreationFailed { .. })
    }
}

//! Per-level sandbox lifecycle.
//!
//! One sandbox per level, named after it. Creation parameters follow the
//! level's run profile; removal is best-effort; attach hands the terminal
//! to the container until its shell exits.

mod docker;
mod error;

pub(crate) use docker::DockerSandbox;
pub(crate) use error::SandboxError;

use async_trait::async_trait;

/// Sandbox lifecycle operations.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Make sure a sandbox for the level exists and is running.
    /// Creation failure is fatal to the current level attempt.
    async fn ensure_running(&self, level: u32, user_id: &str) -> Result<(), SandboxError>;

    /// Force-remove the level's sandbox. Best-effort: the sandbox may
    /// already be gone, so errors are ignored.
    async fn remove(&self, level: u32);

    /// Start the sandbox if stopped and hand interactive control to it.
    /// Returns once the interactive session ends.
    async fn attach(&self, level: u32) -> Result<(), SandboxError>;
}

use async_trait::async_trait;
use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, ListContainersOptions,
    RemoveContainerOptions,
};
use bollard::service::HostConfig;
use bollard::Docker;
use std::process::Stdio;
use tracing::{debug, warn};

use crate::config::LevelConfig;
use crate::level::{Level, RunProfile};
use crate::sandbox::{Sandbox, SandboxError};

/// Sandbox lifecycle backed by the local Docker daemon.
///
/// Container create/start/remove go through the daemon API; the interactive
/// attach shells out to the docker CLI with argument arrays, since that is
/// the one operation that needs the caller's TTY.
pub struct DockerSandbox {
    docker: Docker,
    levels: LevelConfig,
}

impl DockerSandbox {
    /// Creates a manager over a connected daemon handle.
    pub fn new(docker: Docker, levels: LevelConfig) -> Self {
        Self { docker, levels }
    }

    /// Whether a container with this exact name exists, running or not.
    async fn container_exists(&self, name: &str) -> Result<bool, SandboxError> {
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                ..Default::default()
            }))
            .await
            .map_err(|e| SandboxError::docker_unavailable(e.to_string()))?;

        // Daemon-reported names carry a leading slash.
        let slash_name = format!("/{name}");
        let found = containers.iter().any(|c| {
            c.names
                .as_deref()
                .unwrap_or_default()
                .iter()
                .any(|n| n == &slash_name)
        });

        Ok(found)
    }

    /// Build creation parameters for a level from its run profile.
    fn container_config(&self, level: Level, user_id: &str) -> ContainerConfig<String> {
        let mut config = ContainerConfig {
            image: Some(level.image_reference(&self.levels)),
            tty: Some(true),
            open_stdin: Some(true),
            ..Default::default()
        };

        match RunProfile::for_level(level, &self.levels) {
            RunProfile::Default => {
                config.hostname = Some(user_id.to_string());
                config.cmd = Some(vec!["/bin/sh".to_string()]);
            }
            RunProfile::IdentityTagged => {
                // Keep the image's native entry point.
                config.hostname = Some(user_id.to_string());
            }
            RunProfile::Privileged => {
                config.cmd = Some(vec!["/bin/sh".to_string()]);
                config.host_config = Some(HostConfig {
                    privileged: Some(true),
                    ..Default::default()
                });
            }
        }

        config
    }
}

#[async_trait]
impl Sandbox for DockerSandbox {
    async fn ensure_running(&self, level: u32, user_id: &str) -> Result<(), SandboxError> {
        let level = Level::new(level);
        let name = level.sandbox_name();

        if self.container_exists(&name).await? {
            debug!(%name, "sandbox already exists");
            return Ok(());
        }

        debug!(%name, "creating sandbox");
        self.docker
            .create_container(
                Some(CreateContainerOptions {
                    name: name.clone(),
                    platform: None,
                }),
                self.container_config(level, user_id),
            )
            .await
            .map_err(|e| SandboxError::creation_failed(&name, e.to_string()))?;

        self.docker
            .start_container::<String>(&name, None)
            .await
            .map_err(|e| SandboxError::creation_failed(&name, e.to_string()))?;

        Ok(())
    }

    async fn remove(&self, level: u32) {
        let name = Level::new(level).sandbox_name();
        debug!(%name, "removing sandbox");

        // The sandbox may already be gone.
        let _ = self
            .docker
            .remove_container(
                &name,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await;
    }

    async fn attach(&self, level: u32) -> Result<(), SandboxError> {
        let name = Level::new(level).sandbox_name();

        let start = tokio::process::Command::new("docker")
            .args(["start", &name])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| SandboxError::attach_failed(&name, e.to_string()))?;

        if !start.success() {
            return Err(SandboxError::attach_failed(
                &name,
                format!("docker start exited with {start}"),
            ));
        }

        // Inherited stdio hands the user's terminal to the container shell.
        let status = tokio::process::Command::new("docker")
            .args(["exec", "-it", &name, "sh"])
            .status()
            .await
            .map_err(|e| SandboxError::attach_failed(&name, e.to_string()))?;

        // A nonzero shell exit is the user's business, not a failure.
        if !status.success() {
            warn!(%name, %status, "interactive shell exited nonzero");
        }

        Ok(())
    }
}

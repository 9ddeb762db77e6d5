use anyhow::{Context, Result};
use bollard::Docker;
use colored::Colorize;

use crate::backend::HttpBackend;
use crate::config::Config;
use crate::controller;
use crate::images::DockerImageStore;
use crate::onboarding;
use crate::sandbox::DockerSandbox;

/// Run the full wargame session: onboarding, preflight, then the level loop.
pub async fn run() -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let config = Config::load(&cwd)?;

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let stdin = std::io::stdin();
    let mut input = stdin.lock();

    let user_id = onboarding::get_or_prompt(&home, &mut input)?;
    println!(
        "{}",
        format!("Welcome, {user_id}! Preparing your game session...").green().bold()
    );

    // Preflight: the rest of the session assumes a reachable daemon.
    let docker = Docker::connect_with_local_defaults()
        .context("Failed to connect to Docker. Is Docker running?")?;
    docker
        .ping()
        .await
        .context("Cannot ping Docker daemon. Is Docker running?")?;

    let backend = HttpBackend::new(config.backend.url.clone());
    let images = DockerImageStore::new(docker.clone(), config.levels.clone());
    let sandbox = DockerSandbox::new(docker, config.levels.clone());

    controller::run_session(&config, &user_id, &backend, &images, &sandbox, &mut input).await?;

    Ok(())
}

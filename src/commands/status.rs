use anyhow::{Context, Result};
use bollard::Docker;
use colored::Colorize;

use crate::backend::{Backend, HttpBackend};
use crate::config::Config;
use crate::images::DockerImageStore;
use crate::onboarding;

/// Show the stored user, the backend-reported level, and whether the images
/// for the current and next level are already local.
pub async fn run() -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let config = Config::load(&cwd)?;

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let Some(profile) = onboarding::load(&home)? else {
        println!("\n{} No user registered yet.", "ℹ".blue());
        println!("  Run {} to get started.", "warplay play".green());
        return Ok(());
    };

    println!("\n{}", "━".repeat(50).dimmed());
    println!("{}", "   🚩 Wargame Session Status".yellow().bold());
    println!("{}", "━".repeat(50).dimmed());

    println!("  User:       {}", profile.username.cyan());
    println!(
        "  Registered: {}",
        profile
            .registered_at
            .format("%Y-%m-%d %H:%M:%S UTC")
            .to_string()
            .cyan()
    );

    let backend = HttpBackend::new(config.backend.url.clone());
    match backend.get_level(&profile.username).await {
        Ok(level) => {
            println!(
                "  Level:      {} of {}",
                level.to_string().cyan(),
                config.levels.total.to_string().cyan()
            );

            match Docker::connect_with_local_defaults() {
                Ok(docker) => {
                    let images = DockerImageStore::new(docker, config.levels.clone());
                    for n in [Some(level), level.checked_add(1)].into_iter().flatten() {
                        if n > config.levels.total {
                            continue;
                        }
                        let present = images.is_present(n).await.unwrap_or(false);
                        let mark = if present { "cached".green() } else { "not pulled".red() };
                        println!("  Image {n}:    {mark}");
                    }
                }
                Err(_) => {
                    println!("  Images:     {}", "Docker unavailable".red());
                }
            }
        }
        Err(e) => {
            println!("  Level:      {}", "unavailable".red());
            println!("  ({e})");
        }
    }

    println!("{}", "━".repeat(50).dimmed());

    Ok(())
}

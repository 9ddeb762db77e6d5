//! Top-level session driver.
//!
//! Owns the current-level state for the life of the process: bootstraps it
//! from the verification service, blocks until the images it needs are
//! local, then cycles sandboxes and level sessions until the user finishes
//! or stops. The level only ever advances on a server-confirmed submission.

use anyhow::{Context, Result};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::backend::Backend;
use crate::config::Config;
use crate::images::{ImageStore, PullProgress};
use crate::sandbox::Sandbox;
use crate::session;
use crate::ui;

/// How the session ended. Aborts surface as errors instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// All levels cleared.
    Completed,
    /// The user stopped (or input ended) at this level.
    Stopped { level: u32 },
}

/// Run one full session for `user_id`.
pub async fn run_session(
    config: &Config,
    user_id: &str,
    backend: &dyn Backend,
    images: &dyn ImageStore,
    sandbox: &dyn Sandbox,
    input: &mut dyn BufRead,
) -> Result<SessionOutcome> {
    let total = config.levels.total;

    let mut current = backend
        .get_level(user_id)
        .await
        .context("Could not determine your current level from the verification service")?;
    info!(user_id, current, "session bootstrapped");

    ensure_initial_images(current, total, images).await?;

    while current <= total {
        sandbox
            .ensure_running(current, user_id)
            .await
            .context("Failed to start the level sandbox")?;

        let reached = session::run_level(
            current,
            user_id,
            total,
            backend,
            images,
            sandbox,
            input,
        )
        .await?;

        if reached > current {
            debug!(from = current, to = reached, "level progression accepted");
            current = reached;
        } else {
            break;
        }
    }

    if current > total {
        ui::completion_banner();
        Ok(SessionOutcome::Completed)
    } else {
        ui::try_again_banner();
        Ok(SessionOutcome::Stopped { level: current })
    }
}

/// Block until the current and (when in bounds) next level images are local,
/// with a progress indicator running for the duration of the wait.
async fn ensure_initial_images(
    current: u32,
    total: u32,
    images: &dyn ImageStore,
) -> Result<()> {
    println!("Getting levels...! Patience is the key.");

    // checked_add: the backend owns `current`, so it may sit at the top of
    // the range.
    let wanted: Vec<u32> = [Some(current), current.checked_add(1)]
        .into_iter()
        .flatten()
        .filter(|&n| n <= total)
        .collect();

    let progress = Arc::new(PullProgress::new());
    let done = Arc::new(AtomicBool::new(false));
    let indicator = tokio::spawn(ui::progress_indicator(
        Arc::clone(&progress),
        wanted.len(),
        Arc::clone(&done),
    ));

    let mut result = Ok(());
    for &level in &wanted {
        if let Err(e) = images.ensure_available(level, Some(progress.as_ref())).await {
            result = Err(e).with_context(|| format!("Failed to pull the image for level {level}"));
            break;
        }
    }

    done.store(true, Ordering::Relaxed);
    let _ = indicator.await;

    result
}

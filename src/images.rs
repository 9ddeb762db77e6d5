//! Image cache and prefetcher.
//!
//! Levels become playable once their image is present locally. The blocking
//! path (`ensure_available`) reports progress and is the only one callers may
//! rely on; background prefetch is best-effort and its outcome is discarded,
//! so a later blocking check must re-verify rather than trust it.

use async_trait::async_trait;
use bollard::image::{CreateImageOptions, ListImagesOptions};
use bollard::Docker;
use futures_util::StreamExt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::LevelConfig;
use crate::level::Level;

/// Attempts per pull invocation.
const PULL_ATTEMPTS: u32 = 3;
/// Fixed delay between failed attempts.
const RETRY_DELAY: Duration = Duration::from_secs(3);
/// Background pulls in flight across the process.
const MAX_BACKGROUND_PULLS: usize = 2;

/// Errors from image acquisition.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    /// Docker daemon is not running or not accessible.
    #[error("Docker is not available: {message}")]
    DockerUnavailable { message: String },

    /// Pull failed on every attempt.
    #[error("failed to pull image for level {level} after {attempts} attempts")]
    PullExhausted { level: u32, attempts: u32 },
}

impl ImageError {
    /// Creates a `DockerUnavailable` error.
    pub fn docker_unavailable(message: impl Into<String>) -> Self {
        Self::DockerUnavailable {
            message: message.into(),
        }
    }

    /// Returns true if this is a pull exhaustion error.
    pub fn is_pull_exhausted(&self) -> bool {
        matches!(self, Self::PullExhausted { .. })
    }
}

/// Counter shared with the progress indicator during the blocking
/// `ensure_available` phase. One tick per level that becomes available.
#[derive(Debug, Default)]
pub struct PullProgress {
    completed: AtomicUsize,
}

impl PullProgress {
    /// Creates a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Levels made available so far.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    /// Counts one more level as available.
    pub fn record(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Local image store operations.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Block until the level's image is present, pulling it if needed.
    /// An already-present image also counts toward `progress`; the counter
    /// feeds the progress bar and nothing else.
    async fn ensure_available(
        &self,
        level: u32,
        progress: Option<&PullProgress>,
    ) -> Result<(), ImageError>;

    /// Fire-and-forget pull of the level's image. Detached; failures are
    /// absorbed and never surfaced.
    fn prefetch(&self, level: u32);
}

/// Image store backed by the local Docker daemon.
pub struct DockerImageStore {
    docker: Docker,
    levels: LevelConfig,
    prefetch_slots: Arc<Semaphore>,
}

impl DockerImageStore {
    /// Creates a store over a connected daemon handle.
    pub fn new(docker: Docker, levels: LevelConfig) -> Self {
        Self {
            docker,
            levels,
            prefetch_slots: Arc::new(Semaphore::new(MAX_BACKGROUND_PULLS)),
        }
    }

    /// Whether the level's image is present locally, without pulling.
    pub async fn is_present(&self, level: u32) -> Result<bool, ImageError> {
        let reference = Level::new(level).image_reference(&self.levels);
        image_present(&self.docker, &reference).await
    }
}

#[async_trait]
impl ImageStore for DockerImageStore {
    async fn ensure_available(
        &self,
        level: u32,
        progress: Option<&PullProgress>,
    ) -> Result<(), ImageError> {
        let reference = Level::new(level).image_reference(&self.levels);
        let check_docker = self.docker.clone();
        let check_reference = reference.clone();
        let pull_docker = self.docker.clone();

        ensure_image(
            level,
            progress,
            || async move { image_present(&check_docker, &check_reference).await },
            move || {
                let docker = pull_docker.clone();
                let reference = reference.clone();
                async move { pull_once(&docker, &reference).await }
            },
        )
        .await
    }

    fn prefetch(&self, level: u32) {
        if level > self.levels.total {
            return;
        }

        let docker = self.docker.clone();
        let reference = Level::new(level).image_reference(&self.levels);
        let slots = Arc::clone(&self.prefetch_slots);

        tokio::spawn(async move {
            // The semaphore is never closed; acquire only fails at shutdown.
            let Ok(_permit) = slots.acquire_owned().await else {
                return;
            };

            match image_present(&docker, &reference).await {
                Ok(true) => debug!(level, "prefetch: image already present"),
                Ok(false) => {
                    let pull = move || {
                        let docker = docker.clone();
                        let reference = reference.clone();
                        async move { pull_once(&docker, &reference).await }
                    };
                    if let Err(e) = pull_with_retry(level, pull).await {
                        debug!(level, error = %e, "background prefetch failed");
                    } else {
                        debug!(level, "background prefetch complete");
                    }
                }
                Err(e) => debug!(level, error = %e, "prefetch existence check failed"),
            }
        });
    }
}

/// Check the local image list for an exact reference match.
async fn image_present(docker: &Docker, reference: &str) -> Result<bool, ImageError> {
    let images = docker
        .list_images(Some(ListImagesOptions::<String> {
            all: true,
            ..Default::default()
        }))
        .await
        .map_err(|e| ImageError::docker_unavailable(e.to_string()))?;

    let (name, tag) = parse_image_tag(reference);

    let found = images.iter().any(|img| {
        img.repo_tags.iter().any(|tag_str| {
            if let Some(colon_pos) = tag_str.rfind(':') {
                let (n, t) = tag_str.split_at(colon_pos);
                n == name && &t[1..] == tag
            } else {
                tag_str == name && tag == "latest"
            }
        })
    });

    Ok(found)
}

/// Existence check, then bounded pull. Generic over both effects so the
/// short-circuit and the retry policy are testable without a daemon.
async fn ensure_image<C, CFut, P, PFut>(
    level: u32,
    progress: Option<&PullProgress>,
    check: C,
    pull: P,
) -> Result<(), ImageError>
where
    C: FnOnce() -> CFut,
    CFut: Future<Output = Result<bool, ImageError>>,
    P: FnMut() -> PFut,
    PFut: Future<Output = Result<(), String>>,
{
    if check().await? {
        debug!(level, "image already present, skipping pull");
        if let Some(progress) = progress {
            progress.record();
        }
        return Ok(());
    }

    info!(level, "pulling level image");
    pull_with_retry(level, pull).await?;

    if let Some(progress) = progress {
        progress.record();
    }
    Ok(())
}

/// Run pull attempts up to [`PULL_ATTEMPTS`] times, sleeping a fixed delay
/// between failures but not after the last one.
async fn pull_with_retry<P, PFut>(level: u32, mut pull: P) -> Result<(), ImageError>
where
    P: FnMut() -> PFut,
    PFut: Future<Output = Result<(), String>>,
{
    for attempt in 1..=PULL_ATTEMPTS {
        match pull().await {
            Ok(()) => {
                debug!(level, attempt, "image pulled");
                return Ok(());
            }
            Err(message) => {
                warn!(level, attempt, %message, "pull attempt failed");
                if attempt < PULL_ATTEMPTS {
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }

    Err(ImageError::PullExhausted {
        level,
        attempts: PULL_ATTEMPTS,
    })
}

/// Single pull attempt; drains the progress stream from the daemon.
async fn pull_once(docker: &Docker, reference: &str) -> Result<(), String> {
    let options = CreateImageOptions {
        from_image: reference,
        ..Default::default()
    };

    let mut stream = docker.create_image(Some(options), None, None);

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(update) => {
                if let Some(error) = update.error {
                    return Err(error);
                }
            }
            Err(e) => return Err(e.to_string()),
        }
    }

    Ok(())
}

/// Parse image name and tag from a reference string.
fn parse_image_tag(image: &str) -> (&str, &str) {
    if let Some(colon_pos) = image.rfind(':') {
        let (name, tag) = image.split_at(colon_pos);
        (name, &tag[1..])
    } else {
        (image, "latest")
    }
}

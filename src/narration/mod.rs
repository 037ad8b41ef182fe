//! Narration synchronization.
//!
//! `say` is a barrier: synthesis latency `L` is measured, the authoritative
//! playback duration `D` is read back from the synthesized file, and the
//! scene pauses for `D - L` so the next action only starts once the clip has
//! been voiced on the recorded timeline. `D < L` cannot be made up for and
//! surfaces as the retryable [`ElmoError::NarrationTooSlow`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{ElmoError, Result};
use crate::scene::metadata::NarrationEntry;

/// Text-to-speech backend plus the source of truth for clip length.
#[async_trait]
pub trait NarrationProvider: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio>;

    /// Playback length measured from the audio artifact itself.
    async fn audio_duration(&self, path: &Path) -> Result<Duration>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    pub path: PathBuf,
}

/// Recording clock of one scene. Reads zero until recording starts.
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneClock {
    origin: Option<Instant>,
}

impl SceneClock {
    pub fn start(&mut self) {
        self.origin = Some(Instant::now());
    }

    pub fn is_started(&self) -> bool {
        self.origin.is_some()
    }

    pub fn elapsed(&self) -> Duration {
        self.origin.map(|o| o.elapsed()).unwrap_or_default()
    }

    /// Seconds since recording began, rounded to the millisecond.
    pub fn elapsed_secs(&self) -> f64 {
        round_millis(self.elapsed())
    }
}

pub fn round_millis(d: Duration) -> f64 {
    (d.as_secs_f64() * 1000.0).round() / 1000.0
}

/// Measurements of one synthesis; consumed immediately by the scene.
#[derive(Debug, Clone)]
pub struct NarrationResult {
    pub audio_path: PathBuf,
    pub latency: Duration,
    pub duration: Duration,
}

impl NarrationResult {
    /// How long the scene must still pause, `D - L`.
    pub fn remaining_wait(&self) -> Result<Duration> {
        self.duration
            .checked_sub(self.latency)
            .ok_or(ElmoError::NarrationTooSlow {
                latency: self.latency,
                duration: self.duration,
            })
    }
}

/// A narration ready to be logged, with the pause owed after logging it.
#[derive(Debug, Clone)]
pub struct Narration {
    pub entry: NarrationEntry,
    pub wait: Duration,
}

#[derive(Clone)]
pub struct NarrationSynchronizer {
    provider: Arc<dyn NarrationProvider>,
}

impl NarrationSynchronizer {
    pub fn new(provider: Arc<dyn NarrationProvider>) -> Self {
        Self { provider }
    }

    /// Synthesize `text` and work out the pause owed.
    ///
    /// The entry timestamp is taken when synthesis completes, which is when
    /// the clip starts on the recorded timeline. Nothing is returned for a
    /// clip that cannot be synchronized, so the caller logs no entry for it.
    pub async fn prepare(&self, text: &str, clock: &SceneClock) -> Result<Narration> {
        if text.trim().is_empty() {
            return Err(ElmoError::Narration("narration text is empty".to_string()));
        }

        let started = Instant::now();
        let audio = self.provider.synthesize(text).await?;
        let latency = started.elapsed();
        let timestamp = clock.elapsed_secs();

        let (duration, wait) = match self.measure(&audio.path, latency).await {
            Ok(measured) => measured,
            Err(e) => {
                discard_clip(&audio.path).await;
                return Err(e);
            }
        };
        debug!(
            latency_ms = latency.as_millis() as u64,
            duration_ms = duration.as_millis() as u64,
            wait_ms = wait.as_millis() as u64,
            "narration synthesized"
        );

        Ok(Narration {
            entry: NarrationEntry {
                filename: audio.path.display().to_string(),
                timestamp,
                text: text.to_string(),
            },
            wait,
        })
    }

    async fn measure(&self, path: &Path, latency: Duration) -> Result<(Duration, Duration)> {
        let duration = self.provider.audio_duration(path).await?;
        if duration.is_zero() {
            return Err(ElmoError::Narration(format!(
                "Could not read audio length {}",
                path.display()
            )));
        }
        let wait = NarrationResult {
            audio_path: path.to_path_buf(),
            latency,
            duration,
        }
        .remaining_wait()?;
        Ok((duration, wait))
    }
}

/// A clip that will never be logged is removed so retries don't pile up files.
async fn discard_clip(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        debug!(path = %path.display(), error = %e, "could not remove discarded clip");
    }
}

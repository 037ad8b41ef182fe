//! The process-wide registry that starts scenes and builds the final video.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::{Pacing, SessionConfig};
use crate::driver::DriverFactory;
use crate::error::{ElmoError, Result};
use crate::files;
use crate::narration::{NarrationProvider, NarrationSynchronizer};
use crate::scene::metadata::SceneMetadata;
use crate::scene::Scene;
use crate::video::{BuildConfig, SceneBuilder};

/// Finished scenes in the order they reported, safe to append from any task.
#[derive(Debug, Clone, Default)]
pub struct SceneCollector {
    scenes: Arc<Mutex<Vec<SceneMetadata>>>,
}

impl SceneCollector {
    pub async fn add_scene(&self, metadata: SceneMetadata) {
        self.scenes.lock().await.push(metadata);
    }

    pub async fn snapshot(&self) -> Vec<SceneMetadata> {
        self.scenes.lock().await.clone()
    }
}

pub struct Elmo {
    config: SessionConfig,
    pacing: Pacing,
    drivers: Arc<dyn DriverFactory>,
    narration: NarrationSynchronizer,
    builder: Arc<dyn SceneBuilder>,
    collector: SceneCollector,
}

impl Elmo {
    pub fn new(
        config: SessionConfig,
        drivers: Arc<dyn DriverFactory>,
        narrator: Arc<dyn NarrationProvider>,
        builder: Arc<dyn SceneBuilder>,
    ) -> Self {
        Self {
            config,
            pacing: Pacing::default(),
            drivers,
            narration: NarrationSynchronizer::new(narrator),
            builder,
            collector: SceneCollector::default(),
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Open a fresh browser page on `initial_url` and wrap it in a scene.
    pub async fn start_scene(&self, initial_url: &str) -> Result<Scene> {
        let scenes_dir = files::scenes_dir(&self.config.work_dir).await?;
        let mut driver = self.drivers.open(self.config.headless).await?;

        if let Err(e) = driver.navigate(initial_url).await {
            if let Err(close_err) = driver.close().await {
                warn!(error = %close_err, "failed to close browser after navigation error");
            }
            return Err(e);
        }

        let scene = Scene::new(
            driver,
            self.narration.clone(),
            self.pacing.clone(),
            &scenes_dir,
            self.collector.clone(),
        );
        info!(url = initial_url, path = %scene.recording_path().display(), "scene started");
        Ok(scene)
    }

    /// Append finished metadata. Order is arrival order, not creation order.
    pub async fn add_scene(&self, metadata: SceneMetadata) {
        self.collector.add_scene(metadata).await;
    }

    pub async fn scenes(&self) -> Vec<SceneMetadata> {
        self.collector.snapshot().await
    }

    /// Hand every collected scene to the builder and wait for the output.
    pub async fn build(self) -> Result<PathBuf> {
        let scenes = self.collector.snapshot().await;
        if scenes.is_empty() {
            return Err(ElmoError::Build("no scenes were recorded".to_string()));
        }

        let build = BuildConfig {
            filename: self.config.output.clone(),
            subtitles: self.config.subtitles,
            headless: self.config.headless,
            work_dir: self.config.work_dir.clone(),
        };
        self.builder.build(&scenes, &build).await?;

        info!("Wrote {}", build.filename.display());
        Ok(build.filename)
    }
}

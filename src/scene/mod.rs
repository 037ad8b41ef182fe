//! One page, one recording.
//!
//! A scene moves `Created -> Recording -> Stopped`. Primitives take
//! `&mut self`, so a scene never runs two of them against its page at once.

pub mod callout;
pub mod metadata;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::Pacing;
use crate::driver::InteractionDriver;
use crate::error::{ElmoError, Result};
use crate::files;
use crate::narration::{NarrationSynchronizer, SceneClock};
use crate::session::SceneCollector;
use callout::{CalloutHandle, CalloutId};
use metadata::{NarrationEntry, SceneMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneState {
    Created,
    Recording,
    Stopped,
}

impl fmt::Display for SceneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SceneState::Created => "created",
            SceneState::Recording => "recording",
            SceneState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

pub struct Scene {
    name: String,
    recording: PathBuf,
    metadata: SceneMetadata,
    state: SceneState,
    clock: SceneClock,
    driver: Box<dyn InteractionDriver>,
    driver_open: bool,
    narration: NarrationSynchronizer,
    pacing: Pacing,
    callout: Option<CalloutHandle>,
    callouts_shown: u64,
    collector: SceneCollector,
}

impl Scene {
    pub(crate) fn new(
        driver: Box<dyn InteractionDriver>,
        narration: NarrationSynchronizer,
        pacing: Pacing,
        scenes_dir: &Path,
        collector: SceneCollector,
    ) -> Self {
        let recording = scenes_dir.join(files::random_file_name("mp4"));
        let name = recording
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            name,
            metadata: SceneMetadata::video(recording.display().to_string()),
            recording,
            state: SceneState::Created,
            clock: SceneClock::default(),
            driver,
            driver_open: true,
            narration,
            pacing,
            callout: None,
            callouts_shown: 0,
            collector,
        }
    }

    pub fn state(&self) -> SceneState {
        self.state
    }

    /// Where the recording is written.
    pub fn recording_path(&self) -> &Path {
        &self.recording
    }

    pub fn narration_log(&self) -> &[NarrationEntry] {
        &self.metadata.audio
    }

    /// Seconds since recording started; zero before that.
    pub fn elapsed_secs(&self) -> f64 {
        self.clock.elapsed_secs()
    }

    pub fn has_callout(&self) -> bool {
        self.callout.is_some()
    }

    /// Open the shutter: pointer overlay, capture, clock origin.
    pub async fn start_recording(&mut self) -> Result<()> {
        if self.state != SceneState::Created {
            return Err(self.invalid("start recording"));
        }

        self.install_pointer().await?;
        self.driver.start_capture(&self.recording).await?;
        self.clock.start();
        self.state = SceneState::Recording;

        info!(scene = %self.name, path = %self.recording.display(), "recording started");
        Ok(())
    }

    pub async fn wait_for_selector(&mut self, selector: &str) -> Result<()> {
        self.ensure_live("wait for selector")?;
        self.driver.wait_for_selector(selector).await
    }

    /// Glide the pointer to the centre of `selector`.
    pub async fn move_to(&mut self, selector: &str) -> Result<()> {
        self.ensure_live("move pointer")?;
        self.install_pointer().await?;

        let target = self.driver.element_geometry(selector).await?;
        let (x, y) = target.center();
        self.driver
            .move_pointer(x, y, self.pacing.pointer_steps)
            .await?;
        self.log(&format!("moved to {}", selector));

        self.settle().await;
        Ok(())
    }

    /// Click at `selector`, or where the pointer already is.
    pub async fn click(&mut self, selector: Option<&str>) -> Result<()> {
        self.ensure_live("click")?;
        self.install_pointer().await?;
        if let Some(selector) = selector {
            self.move_to(selector).await?;
        }

        self.driver.press_button().await?;
        self.driver.release_button().await?;
        self.log("clicked");

        self.settle().await;
        Ok(())
    }

    /// Key cadence comes from the driver; the settle happens once at the end.
    pub async fn type_text(&mut self, text: &str) -> Result<()> {
        self.ensure_live("type")?;
        self.install_pointer().await?;

        self.driver.type_text(text).await?;
        self.log(&format!("typed {} chars", text.chars().count()));

        self.settle().await;
        Ok(())
    }

    pub async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Voice `text` and hold the scene until the clip has played out.
    ///
    /// Fails with the retryable [`ElmoError::NarrationTooSlow`] and logs
    /// nothing when synthesis outlasted the clip.
    pub async fn say(&mut self, text: &str) -> Result<()> {
        self.ensure_live("say")?;
        self.log("synthesizing narration");

        let narration = self.narration.prepare(text, &self.clock).await?;
        self.metadata.audio.push(narration.entry);
        self.log(&format!("narrating, holding for {:?}", narration.wait));

        tokio::time::sleep(narration.wait).await;
        Ok(())
    }

    /// Darken everything around `selector`, replacing any active callout.
    pub async fn show_callout(&mut self, selector: &str) -> Result<CalloutId> {
        self.ensure_live("show callout")?;
        if self.callout.is_some() {
            self.hide_callout().await?;
        }

        self.callouts_shown += 1;
        let handle = CalloutHandle::new(&self.name, self.callouts_shown);
        let fade_ms = self.pacing.callout_fade.as_millis() as u64;
        let status = self
            .driver
            .run_script(
                callout::SHOW_SCRIPT,
                handle.show_args(selector, self.pacing.callout_offset, fade_ms),
            )
            .await?;

        match status.as_str() {
            Some("ok") => {
                let id = handle.id();
                self.callout = Some(handle);
                self.log(&format!("callout on {}", selector));
                Ok(id)
            }
            Some("missing") => Err(ElmoError::ElementNotFound {
                selector: selector.to_string(),
            }),
            Some("hidden") => Err(ElmoError::GeometryUnavailable {
                selector: selector.to_string(),
            }),
            _ => Err(ElmoError::Driver(format!(
                "unexpected callout script result: {}",
                status
            ))),
        }
    }

    /// Fade out and remove the active callout. No-op when none is shown.
    pub async fn hide_callout(&mut self) -> Result<()> {
        let Some(handle) = self.callout.take() else {
            return Ok(());
        };
        self.ensure_live("hide callout")?;

        self.driver
            .run_script(callout::FADE_SCRIPT, handle.mask_args())
            .await?;
        tokio::time::sleep(self.pacing.callout_fade).await;
        self.driver
            .run_script(callout::REMOVE_SCRIPT, handle.mask_args())
            .await?;

        self.log("callout hidden");
        Ok(())
    }

    /// Hide the callout `id` refers to, unless it was already replaced.
    pub async fn dismiss_callout(&mut self, id: CalloutId) -> Result<()> {
        match &self.callout {
            Some(active) if active.is(&id) => self.hide_callout().await,
            _ => Ok(()),
        }
    }

    /// Finish the recording and report it to the session.
    ///
    /// The returned metadata is final; the scene accepts no further
    /// primitives afterwards.
    pub async fn stop(&mut self, close_browser: bool) -> Result<SceneMetadata> {
        tokio::time::sleep(self.pacing.stop_pause).await;
        if self.state != SceneState::Recording || !self.clock.is_started() {
            return Err(self.invalid("stop"));
        }
        self.log("done");

        self.driver.stop_capture().await?;
        self.state = SceneState::Stopped;
        self.callout = None;

        if close_browser {
            self.close_driver().await?;
        }

        let metadata = self.metadata.clone();
        self.collector.add_scene(metadata.clone()).await;
        info!(
            scene = %self.name,
            narrations = metadata.audio.len(),
            "scene stopped"
        );
        Ok(metadata)
    }

    /// Tear down without producing metadata. Safe to call repeatedly.
    pub async fn close(&mut self) -> Result<()> {
        self.state = SceneState::Stopped;
        self.callout = None;
        self.close_driver().await
    }

    async fn close_driver(&mut self) -> Result<()> {
        if !self.driver_open {
            return Ok(());
        }
        self.driver_open = false;
        if let Err(e) = self.driver.close().await {
            warn!(scene = %self.name, error = %e, "browser did not close cleanly");
            return Err(e);
        }
        Ok(())
    }

    async fn install_pointer(&self) -> Result<()> {
        self.driver
            .run_script(callout::POINTER_SCRIPT, json!([]))
            .await?;
        Ok(())
    }

    async fn settle(&self) {
        tokio::time::sleep(self.pacing.settle).await;
    }

    fn ensure_live(&self, operation: &'static str) -> Result<()> {
        if self.state == SceneState::Stopped {
            return Err(self.invalid(operation));
        }
        Ok(())
    }

    fn invalid(&self, operation: &'static str) -> ElmoError {
        ElmoError::InvalidState {
            operation,
            state: self.state,
        }
    }

    fn log(&self, msg: &str) {
        debug!(
            scene = %self.name,
            elapsed = %format!("{:8.3}", self.elapsed_secs()),
            "{}",
            msg
        );
    }
}

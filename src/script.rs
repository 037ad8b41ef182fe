//! JSON scene scripts and the runner that plays them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::future::join_all;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::{ElmoError, Result};
use crate::scene::metadata::SceneMetadata;
use crate::scene::Scene;
use crate::session::Elmo;

/// A whole production: where it goes and the scenes that make it up.
///
/// `output`, `subtitles` and `headless` are defaults; command-line flags win.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductionScript {
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub subtitles: Option<bool>,
    #[serde(default)]
    pub headless: Option<bool>,
    pub scenes: Vec<SceneScript>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneScript {
    pub url: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    WaitFor { selector: String },
    StartRecording,
    MoveTo { selector: String },
    Click {
        #[serde(default)]
        selector: Option<String>,
    },
    Type { text: String },
    Say { text: String },
    Sleep { ms: u64 },
    ShowCallout { selector: String },
    HideCallout,
}

impl ProductionScript {
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let script: Self = serde_json::from_str(raw)?;
        if script.scenes.is_empty() {
            return Err(ElmoError::Config("script has no scenes".to_string()));
        }
        Ok(script)
    }
}

/// Play `steps` against `scene`, then stop it and close its browser.
pub async fn play(scene: &mut Scene, steps: &[Step]) -> Result<SceneMetadata> {
    for step in steps {
        match step {
            Step::WaitFor { selector } => scene.wait_for_selector(selector).await?,
            Step::StartRecording => scene.start_recording().await?,
            Step::MoveTo { selector } => scene.move_to(selector).await?,
            Step::Click { selector } => scene.click(selector.as_deref()).await?,
            Step::Type { text } => scene.type_text(text).await?,
            Step::Say { text } => scene.say(text).await?,
            Step::Sleep { ms } => scene.sleep(Duration::from_millis(*ms)).await,
            Step::ShowCallout { selector } => {
                scene.show_callout(selector).await?;
            }
            Step::HideCallout => scene.hide_callout().await?,
        }
    }
    scene.stop(true).await
}

/// Record one scene, starting over on a fresh page after retryable failures.
pub async fn run_scene(elmo: &Elmo, script: &SceneScript, retries: u32) -> Result<SceneMetadata> {
    let (_abort_tx, abort_rx) = watch::channel(false);
    record_scene(elmo, script, retries, abort_rx).await
}

/// Run every scene concurrently. When one fails for good the others are
/// cancelled, and every scene is closed before the first error is returned.
pub async fn run_all(
    elmo: &Elmo,
    scenes: &[SceneScript],
    retries: u32,
) -> Result<Vec<SceneMetadata>> {
    info!(scenes = scenes.len(), "recording scenes");

    let (abort_tx, abort_rx) = watch::channel(false);
    let abort_tx = &abort_tx;
    let runs = scenes.iter().map(|scene| {
        let abort = abort_rx.clone();
        async move {
            let result = record_scene(elmo, scene, retries, abort).await;
            if result.is_err() {
                abort_tx.send_replace(true);
            }
            result
        }
    });

    let mut finished = Vec::with_capacity(scenes.len());
    let mut errors = Vec::new();
    for result in join_all(runs).await {
        match result {
            Ok(metadata) => finished.push(metadata),
            Err(e) => errors.push(e),
        }
    }

    // Report the failure that triggered the cancellations, not a cancellation.
    if let Some(at) = errors
        .iter()
        .position(|e| !matches!(e, ElmoError::Cancelled))
    {
        return Err(errors.swap_remove(at));
    }
    match errors.pop() {
        Some(e) => Err(e),
        None => Ok(finished),
    }
}

async fn record_scene(
    elmo: &Elmo,
    script: &SceneScript,
    retries: u32,
    mut abort: watch::Receiver<bool>,
) -> Result<SceneMetadata> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        if *abort.borrow() {
            return Err(ElmoError::Cancelled);
        }
        let mut scene = elmo.start_scene(&script.url).await?;

        let cancelled = async { abort.wait_for(|aborted| *aborted).await.is_ok() };
        let outcome = tokio::select! {
            result = play(&mut scene, &script.steps) => result,
            true = cancelled => Err(ElmoError::Cancelled),
        };
        let err = match outcome {
            Ok(metadata) => return Ok(metadata),
            Err(e) => e,
        };

        if let Err(close_err) = scene.close().await {
            warn!(url = %script.url, error = %close_err, "failed to close scene");
        }

        if err.is_retryable() && attempt <= retries {
            warn!(url = %script.url, attempt, error = %err, "scene failed, retrying");
            continue;
        }
        return Err(err);
    }
}

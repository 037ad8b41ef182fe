//! In-memory collaborators for unit tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::Pacing;
use crate::driver::{BoundingBox, DriverFactory, InteractionDriver};
use crate::error::{ElmoError, Result};
use crate::narration::{NarrationProvider, NarrationSynchronizer, SynthesizedAudio};
use crate::scene::callout;
use crate::scene::metadata::SceneMetadata;
use crate::scene::Scene;
use crate::session::SceneCollector;
use crate::video::{BuildConfig, SceneBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    Pointer,
    ShowCallout,
    FadeCallout,
    RemoveCallout,
    Other,
}

impl ScriptKind {
    fn of(script: &str) -> Self {
        if script == callout::POINTER_SCRIPT {
            ScriptKind::Pointer
        } else if script == callout::SHOW_SCRIPT {
            ScriptKind::ShowCallout
        } else if script == callout::FADE_SCRIPT {
            ScriptKind::FadeCallout
        } else if script == callout::REMOVE_SCRIPT {
            ScriptKind::RemoveCallout
        } else {
            ScriptKind::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Navigate(String),
    WaitForSelector(String),
    Geometry(String),
    MovePointer { x: f64, y: f64, steps: u32 },
    Press,
    Release,
    TypeText(String),
    StartCapture(PathBuf),
    StopCapture,
    Script(ScriptKind),
    Close,
}

#[derive(Debug, Default)]
struct FakePage {
    calls: Vec<DriverCall>,
    /// `None` marks an element that exists but has no box.
    elements: HashMap<String, Option<BoundingBox>>,
    overlays: HashSet<String>,
    capturing: bool,
    closed: bool,
    fail_navigation: bool,
}

/// Shared view of one fake page, kept by tests after the scene owns it.
#[derive(Debug, Clone, Default)]
pub struct FakeDriverHandle {
    page: Arc<Mutex<FakePage>>,
}

impl FakeDriverHandle {
    pub fn add_element(&self, selector: &str, geometry: Option<BoundingBox>) {
        self.page
            .lock()
            .unwrap()
            .elements
            .insert(selector.to_string(), geometry);
    }

    /// Calls other than pointer-overlay installs.
    pub fn calls(&self) -> Vec<DriverCall> {
        self.page
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| **c != DriverCall::Script(ScriptKind::Pointer))
            .cloned()
            .collect()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DriverCall::Navigate(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn overlays(&self) -> HashSet<String> {
        self.page.lock().unwrap().overlays.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.page.lock().unwrap().closed
    }

    fn record(&self, call: DriverCall) {
        self.page.lock().unwrap().calls.push(call);
    }
}

pub struct FakeDriver {
    handle: FakeDriverHandle,
}

impl FakeDriver {
    pub fn new() -> (Self, FakeDriverHandle) {
        let handle = FakeDriverHandle::default();
        (
            Self {
                handle: handle.clone(),
            },
            handle,
        )
    }

    fn mask_ids(args: &Value, index: usize) -> Vec<String> {
        args[index]
            .as_array()
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| id.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl InteractionDriver for FakeDriver {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.handle.record(DriverCall::Navigate(url.to_string()));
        if self.handle.page.lock().unwrap().fail_navigation {
            return Err(ElmoError::Timeout {
                what: format!("{} to load", url),
                after: Duration::from_secs(30),
            });
        }
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str) -> Result<()> {
        self.handle
            .record(DriverCall::WaitForSelector(selector.to_string()));
        Ok(())
    }

    async fn element_geometry(&self, selector: &str) -> Result<BoundingBox> {
        self.handle.record(DriverCall::Geometry(selector.to_string()));
        match self.handle.page.lock().unwrap().elements.get(selector) {
            Some(Some(geometry)) => Ok(*geometry),
            Some(None) => Err(ElmoError::GeometryUnavailable {
                selector: selector.to_string(),
            }),
            None => Err(ElmoError::ElementNotFound {
                selector: selector.to_string(),
            }),
        }
    }

    async fn move_pointer(&mut self, x: f64, y: f64, steps: u32) -> Result<()> {
        self.handle.record(DriverCall::MovePointer { x, y, steps });
        Ok(())
    }

    async fn press_button(&mut self) -> Result<()> {
        self.handle.record(DriverCall::Press);
        Ok(())
    }

    async fn release_button(&mut self) -> Result<()> {
        self.handle.record(DriverCall::Release);
        Ok(())
    }

    async fn type_text(&mut self, text: &str) -> Result<()> {
        self.handle.record(DriverCall::TypeText(text.to_string()));
        Ok(())
    }

    async fn start_capture(&mut self, path: &Path) -> Result<()> {
        self.handle
            .record(DriverCall::StartCapture(path.to_path_buf()));
        self.handle.page.lock().unwrap().capturing = true;
        Ok(())
    }

    async fn stop_capture(&mut self) -> Result<()> {
        self.handle.record(DriverCall::StopCapture);
        let mut page = self.handle.page.lock().unwrap();
        if !page.capturing {
            return Err(ElmoError::Driver("capture was never started".to_string()));
        }
        page.capturing = false;
        Ok(())
    }

    async fn run_script(&self, script: &str, args: Value) -> Result<Value> {
        let kind = ScriptKind::of(script);
        self.handle.record(DriverCall::Script(kind));

        let mut guard = self.handle.page.lock().unwrap();
        let page = &mut *guard;
        let result = match kind {
            ScriptKind::ShowCallout => {
                let selector = args[0].as_str().unwrap_or_default();
                match page.elements.get(selector) {
                    None => json!("missing"),
                    Some(None) => json!("hidden"),
                    Some(Some(_)) => {
                        page.overlays.extend(Self::mask_ids(&args, 1));
                        json!("ok")
                    }
                }
            }
            ScriptKind::RemoveCallout => {
                for id in Self::mask_ids(&args, 0) {
                    page.overlays.remove(&id);
                }
                json!(true)
            }
            ScriptKind::Pointer | ScriptKind::FadeCallout => json!(true),
            ScriptKind::Other => Value::Null,
        };
        Ok(result)
    }

    async fn close(&mut self) -> Result<()> {
        self.handle.record(DriverCall::Close);
        let mut page = self.handle.page.lock().unwrap();
        page.capturing = false;
        page.closed = true;
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeDriverFactory {
    opened: Mutex<Vec<FakeDriverHandle>>,
    fail_navigation: bool,
}

impl FakeDriverFactory {
    pub fn failing_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn driver(&self, index: usize) -> FakeDriverHandle {
        self.opened.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl DriverFactory for FakeDriverFactory {
    async fn open(&self, _headless: bool) -> Result<Box<dyn InteractionDriver>> {
        let (driver, handle) = FakeDriver::new();
        handle.page.lock().unwrap().fail_navigation = self.fail_navigation;
        self.opened.lock().unwrap().push(handle);
        Ok(Box::new(driver))
    }
}

/// Narrator with fixed synthesis latency `L` and clip duration `D`.
pub struct ScriptedNarrator {
    latency: Duration,
    duration: Duration,
    overrides: HashMap<String, (Duration, Duration)>,
    requests: AtomicUsize,
}

impl Default for ScriptedNarrator {
    fn default() -> Self {
        Self::new(Duration::ZERO, Duration::from_secs(1))
    }
}

impl ScriptedNarrator {
    pub fn new(latency: Duration, duration: Duration) -> Self {
        Self {
            latency,
            duration,
            overrides: HashMap::new(),
            requests: AtomicUsize::new(0),
        }
    }

    pub fn with_text(mut self, text: &str, latency: Duration, duration: Duration) -> Self {
        self.overrides
            .insert(text.to_string(), (latency, duration));
        self
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn timing(&self, text: &str) -> (Duration, Duration) {
        self.overrides
            .get(text)
            .copied()
            .unwrap_or((self.latency, self.duration))
    }
}

#[async_trait]
impl NarrationProvider for ScriptedNarrator {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio> {
        let n = self.requests.fetch_add(1, Ordering::SeqCst);
        let (latency, _) = self.timing(text);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        // The clip's text is encoded in its name so duration lookups can find it.
        Ok(SynthesizedAudio {
            path: PathBuf::from(format!("/narration/{}-{}.mp3", n, text)),
        })
    }

    async fn audio_duration(&self, path: &Path) -> Result<Duration> {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let text = stem.split_once('-').map(|(_, t)| t).unwrap_or_default();
        Ok(self.timing(text).1)
    }
}

#[derive(Default)]
pub struct RecordingBuilder {
    builds: Mutex<Vec<(Vec<SceneMetadata>, BuildConfig)>>,
    failure: Mutex<Option<String>>,
}

impl RecordingBuilder {
    pub fn fail_with(&self, reason: &str) {
        *self.failure.lock().unwrap() = Some(reason.to_string());
    }

    pub fn last_build(&self) -> Option<(Vec<SceneMetadata>, BuildConfig)> {
        self.builds.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl SceneBuilder for RecordingBuilder {
    async fn build(&self, scenes: &[SceneMetadata], config: &BuildConfig) -> Result<()> {
        if let Some(reason) = self.failure.lock().unwrap().clone() {
            return Err(ElmoError::Build(reason));
        }
        self.builds
            .lock()
            .unwrap()
            .push((scenes.to_vec(), config.clone()));
        Ok(())
    }
}

pub struct SceneFixture {
    pub scene: Scene,
    pub driver: FakeDriverHandle,
    pub collector: SceneCollector,
}

/// A scene over a fake page with default pacing, already "navigated".
pub async fn scene_fixture(narrator: ScriptedNarrator) -> SceneFixture {
    let (driver, handle) = FakeDriver::new();
    let collector = SceneCollector::default();
    let scene = Scene::new(
        Box::new(driver),
        NarrationSynchronizer::new(Arc::new(narrator)),
        Pacing::default(),
        Path::new("/tmp/elmotron9000/scenes"),
        collector.clone(),
    );
    SceneFixture {
        scene,
        driver: handle,
        collector,
    }
}

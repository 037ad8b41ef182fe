//! Chromium adapter built on `chromiumoxide`.
//!
//! Each scene gets its own browser process so capture streams and input
//! state never interfere across concurrently running scenes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
    DispatchMouseEventType, MouseButton,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::capture::ScreencastRecorder;
use super::{BoundingBox, DriverFactory, InteractionDriver};
use crate::error::{ElmoError, Result};

#[derive(Debug, Clone)]
pub struct ChromeOptions {
    pub window: (u32, u32),
    /// Total time one pointer move takes, spread across its steps.
    pub pointer_travel: Duration,
    /// Delay between key events; sets the visible typing cadence.
    pub key_delay: Duration,
    pub selector_timeout: Duration,
    pub poll_interval: Duration,
    pub capture_fps: u32,
    pub executable: Option<PathBuf>,
}

impl Default for ChromeOptions {
    fn default() -> Self {
        Self {
            window: (1280, 720),
            pointer_travel: Duration::from_millis(1000),
            key_delay: Duration::from_millis(42),
            selector_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
            capture_fps: 25,
            executable: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChromeDriverFactory {
    options: ChromeOptions,
}

impl ChromeDriverFactory {
    pub fn new(options: ChromeOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl DriverFactory for ChromeDriverFactory {
    async fn open(&self, headless: bool) -> Result<Box<dyn InteractionDriver>> {
        let driver = ChromeDriver::launch(self.options.clone(), headless).await?;
        Ok(Box::new(driver))
    }
}

pub struct ChromeDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    options: ChromeOptions,
    pointer: (f64, f64),
    capture: Option<ScreencastRecorder>,
    closed: bool,
}

impl ChromeDriver {
    pub async fn launch(options: ChromeOptions, headless: bool) -> Result<Self> {
        let (width, height) = options.window;
        let mut builder = BrowserConfig::builder().window_size(width, height);
        if !headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &options.executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder.build().map_err(ElmoError::Driver)?;

        let (browser, mut handler) = Browser::launch(config).await?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler stopped");
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await?;
        info!(headless, "browser launched");

        Ok(Self {
            browser,
            page,
            handler,
            options,
            pointer: (0.0, 0.0),
            capture: None,
            closed: false,
        })
    }

    async fn dispatch_mouse(&self, kind: DispatchMouseEventType, button: MouseButton) -> Result<()> {
        let (x, y) = self.pointer;
        let is_move = matches!(kind, DispatchMouseEventType::MouseMoved);
        let mut params = DispatchMouseEventParams::builder()
            .r#type(kind)
            .x(x)
            .y(y)
            .button(button);
        if !is_move {
            params = params.click_count(1);
        }
        self.page
            .execute(params.build().map_err(ElmoError::Driver)?)
            .await?;
        Ok(())
    }

    async fn dispatch_key(&self, kind: DispatchKeyEventType, key: &str) -> Result<()> {
        let params = DispatchKeyEventParams::builder()
            .r#type(kind)
            .key(key.to_string())
            .text(key.to_string())
            .unmodified_text(key.to_string())
            .build()
            .map_err(ElmoError::Driver)?;
        self.page.execute(params).await?;
        Ok(())
    }

    async fn ready_state(&self) -> Result<String> {
        let state = self.page.evaluate("document.readyState").await?;
        Ok(state
            .value()
            .and_then(|v| v.as_str())
            .unwrap_or("loading")
            .to_string())
    }
}

#[async_trait]
impl InteractionDriver for ChromeDriver {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.page.goto(url).await?;

        let deadline = tokio::time::Instant::now() + self.options.selector_timeout;
        while self.ready_state().await? == "loading" {
            if tokio::time::Instant::now() >= deadline {
                return Err(ElmoError::Timeout {
                    what: format!("{} to load", url),
                    after: self.options.selector_timeout,
                });
            }
            tokio::time::sleep(self.options.poll_interval).await;
        }

        info!(url, "navigated");
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str) -> Result<()> {
        let deadline = tokio::time::Instant::now() + self.options.selector_timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ElmoError::Timeout {
                    what: selector.to_string(),
                    after: self.options.selector_timeout,
                });
            }
            tokio::time::sleep(self.options.poll_interval).await;
        }
    }

    async fn element_geometry(&self, selector: &str) -> Result<BoundingBox> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| ElmoError::ElementNotFound {
                selector: selector.to_string(),
            })?;

        let geometry = element
            .bounding_box()
            .await
            .map_err(|_| ElmoError::GeometryUnavailable {
                selector: selector.to_string(),
            })?;

        let geometry = BoundingBox {
            x: geometry.x,
            y: geometry.y,
            width: geometry.width,
            height: geometry.height,
        };
        if !geometry.has_area() {
            return Err(ElmoError::GeometryUnavailable {
                selector: selector.to_string(),
            });
        }
        Ok(geometry)
    }

    async fn move_pointer(&mut self, x: f64, y: f64, steps: u32) -> Result<()> {
        let steps = steps.max(1);
        let pause = self.options.pointer_travel / steps;
        let (from_x, from_y) = self.pointer;

        for step in 1..=steps {
            let t = f64::from(step) / f64::from(steps);
            self.pointer = (from_x + (x - from_x) * t, from_y + (y - from_y) * t);
            self.dispatch_mouse(DispatchMouseEventType::MouseMoved, MouseButton::None)
                .await?;
            tokio::time::sleep(pause).await;
        }
        Ok(())
    }

    async fn press_button(&mut self) -> Result<()> {
        self.dispatch_mouse(DispatchMouseEventType::MousePressed, MouseButton::Left)
            .await
    }

    async fn release_button(&mut self) -> Result<()> {
        self.dispatch_mouse(DispatchMouseEventType::MouseReleased, MouseButton::Left)
            .await
    }

    async fn type_text(&mut self, text: &str) -> Result<()> {
        for ch in text.chars() {
            let key = ch.to_string();
            self.dispatch_key(DispatchKeyEventType::KeyDown, &key).await?;
            self.dispatch_key(DispatchKeyEventType::KeyUp, &key).await?;
            tokio::time::sleep(self.options.key_delay).await;
        }
        Ok(())
    }

    async fn start_capture(&mut self, path: &Path) -> Result<()> {
        if self.capture.is_some() {
            return Err(ElmoError::Driver("capture already running".to_string()));
        }
        let recorder = ScreencastRecorder::start(&self.page, path, self.options.capture_fps).await?;
        self.capture = Some(recorder);
        Ok(())
    }

    async fn stop_capture(&mut self) -> Result<()> {
        match self.capture.take() {
            Some(recorder) => recorder.finish(&self.page).await,
            None => Err(ElmoError::Driver("capture was never started".to_string())),
        }
    }

    async fn run_script(&self, script: &str, args: Value) -> Result<Value> {
        let args = match args {
            Value::Array(_) => args,
            Value::Null => Value::Array(Vec::new()),
            other => Value::Array(vec![other]),
        };
        let expression = format!("({}).apply(null, {})", script, args);
        let result = self.page.evaluate(expression).await?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Some(recorder) = self.capture.take() {
            if let Err(e) = recorder.finish(&self.page).await {
                warn!(error = %e, "capture did not finish during close");
            }
        }

        self.browser.close().await?;
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "browser process did not exit cleanly");
        }
        self.handler.abort();
        info!("browser closed");
        Ok(())
    }
}

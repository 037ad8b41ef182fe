//! Capability interface over the browser automation backend.
//!
//! Scenes only ever talk to an [`InteractionDriver`]; the concrete Chromium
//! adapter lives in [`chrome`]. Timeouts on navigation and selector waits are
//! owned by the driver and surface as fatal errors.

pub mod capture;
pub mod chrome;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

pub use chrome::{ChromeDriver, ChromeDriverFactory, ChromeOptions};

/// Element box in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Zero width or zero height counts as hidden. `callout_show.js` uses
    /// the same rule.
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// One page of one browser context.
#[async_trait]
pub trait InteractionDriver: Send + Sync {
    /// Navigate and block until the DOM content has loaded.
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Block until an element matching `selector` exists.
    async fn wait_for_selector(&self, selector: &str) -> Result<()>;

    /// Fails with `ElementNotFound` when nothing matches and
    /// `GeometryUnavailable` when the match has no renderable box.
    async fn element_geometry(&self, selector: &str) -> Result<BoundingBox>;

    /// Animate the pointer to `(x, y)` over `steps` discrete moves.
    async fn move_pointer(&mut self, x: f64, y: f64, steps: u32) -> Result<()>;

    async fn press_button(&mut self) -> Result<()>;

    async fn release_button(&mut self) -> Result<()>;

    /// One key event per character, in order.
    async fn type_text(&mut self, text: &str) -> Result<()>;

    async fn start_capture(&mut self, path: &Path) -> Result<()>;

    /// Returns only once the capture file is fully flushed.
    async fn stop_capture(&mut self) -> Result<()>;

    /// Run `script` (a JS function expression) in the page with `args` spread
    /// as its parameters and return its JSON result.
    async fn run_script(&self, script: &str, args: Value) -> Result<Value>;

    /// Release the page, its context and any capture still running.
    async fn close(&mut self) -> Result<()>;
}

/// Allocates a fresh browser context + page per scene.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn open(&self, headless: bool) -> Result<Box<dyn InteractionDriver>>;
}

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::files;

/// Session-wide settings handed to every scene and, at the end, to the builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Final muxed video path.
    pub output: PathBuf,
    /// Burn narration text into the final video.
    #[serde(default)]
    pub subtitles: bool,
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Scratch root for recordings, narration audio and build intermediates.
    #[serde(default = "files::default_work_dir")]
    pub work_dir: PathBuf,
}

fn default_headless() -> bool {
    true
}

impl SessionConfig {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            subtitles: false,
            headless: default_headless(),
            work_dir: files::default_work_dir(),
        }
    }
}

/// Fixed delays that keep the recorded video legible.
#[derive(Debug, Clone, PartialEq)]
pub struct Pacing {
    /// Pause after every pointer or keyboard primitive.
    pub settle: Duration,
    /// Discrete pointer moves per `move_to`.
    pub pointer_steps: u32,
    /// Trailing pause before capture ends so the last frame is not cut.
    pub stop_pause: Duration,
    /// Fade window of the callout masks.
    pub callout_fade: Duration,
    /// Gap in CSS pixels between a callout target and its masks.
    pub callout_offset: f64,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(200),
            pointer_steps: 24,
            stop_pause: Duration::from_millis(1000),
            callout_fade: Duration::from_millis(250),
            callout_offset: 8.0,
        }
    }
}

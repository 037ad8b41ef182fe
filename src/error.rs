use std::time::Duration;

use thiserror::Error;

use crate::scene::SceneState;

#[derive(Error, Debug)]
pub enum ElmoError {
    #[error("cannot {operation} while scene is {state}")]
    InvalidState {
        operation: &'static str,
        state: SceneState,
    },

    #[error("element not found: {selector}")]
    ElementNotFound { selector: String },

    #[error("element has no renderable box: {selector}")]
    GeometryUnavailable { selector: String },

    /// Synthesis took longer than the audio it produced will play for.
    #[error("narration synthesis took {latency:?}, longer than its {duration:?} of audio")]
    NarrationTooSlow { latency: Duration, duration: Duration },

    #[error("timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },

    /// Another scene in the same run failed first.
    #[error("scene cancelled after a sibling scene failed")]
    Cancelled,

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Narration error: {0}")]
    Narration(String),

    #[error("Build error: {0}")]
    Build(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CDP error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
}

impl ElmoError {
    /// Whether the caller may re-attempt the narration step or the whole scene.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ElmoError::NarrationTooSlow { .. })
    }
}

pub type Result<T> = std::result::Result<T, ElmoError>;

use serde::{Deserialize, Serialize};

/// One narration clip placed on a scene's timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationEntry {
    /// Synthesized audio file.
    pub filename: String,
    /// Seconds since the scene's recording began, millisecond precision.
    pub timestamp: f64,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneKind {
    Video,
}

/// What a finished scene hands downstream. Never mutated once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneMetadata {
    pub filename: String,
    #[serde(rename = "type")]
    pub kind: SceneKind,
    pub audio: Vec<NarrationEntry>,
}

impl SceneMetadata {
    pub fn video(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            kind: SceneKind::Video,
            audio: Vec::new(),
        }
    }
}

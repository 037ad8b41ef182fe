//! Muxing finished scenes into the final video.

mod generator;
pub mod subtitles;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;
use crate::scene::metadata::SceneMetadata;

pub use generator::VideoGenerator;

/// What the session hands the builder alongside the scenes.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfig {
    pub filename: PathBuf,
    pub subtitles: bool,
    pub headless: bool,
    /// Scratch root for intermediates.
    pub work_dir: PathBuf,
}

#[async_trait]
pub trait SceneBuilder: Send + Sync {
    /// Combine `scenes`, in order, into `config.filename`.
    async fn build(&self, scenes: &[SceneMetadata], config: &BuildConfig) -> Result<()>;
}

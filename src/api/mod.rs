//! Concrete narration providers.

mod dashscope;
mod openai;
mod probe;

use std::path::{Path, PathBuf};

pub use dashscope::DashScopeNarrator;
pub use openai::OpenAiNarrator;
pub use probe::probe_duration;

use crate::error::Result;
use crate::files;

/// Persist synthesized audio under the narration scratch directory.
async fn save_audio(work_dir: &Path, bytes: &[u8]) -> Result<PathBuf> {
    let path = files::narration_dir(work_dir)
        .await?
        .join(files::random_file_name("mp3"));
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

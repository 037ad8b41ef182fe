use std::path::{Path, PathBuf};

use crate::error::Result;

const SCENES_DIR: &str = "scenes";
const NARRATION_DIR: &str = "narration";
const BUILD_DIR: &str = "build";

pub fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("elmotron9000")
}

pub async fn scenes_dir(work_dir: &Path) -> Result<PathBuf> {
    ensure_dir(work_dir.join(SCENES_DIR)).await
}

pub async fn narration_dir(work_dir: &Path) -> Result<PathBuf> {
    ensure_dir(work_dir.join(NARRATION_DIR)).await
}

pub async fn build_dir(work_dir: &Path) -> Result<PathBuf> {
    ensure_dir(work_dir.join(BUILD_DIR)).await
}

/// Random hex file name, unique enough for concurrently running scenes.
pub fn random_file_name(extension: &str) -> String {
    format!("{:016x}.{}", rand::random::<u64>(), extension)
}

async fn ensure_dir(path: PathBuf) -> Result<PathBuf> {
    tokio::fs::create_dir_all(&path).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_names_carry_extension_and_differ() {
        let a = random_file_name("mp4");
        let b = random_file_name("mp4");
        assert!(a.ends_with(".mp4"));
        assert_eq!(a.len(), 16 + ".mp4".len());
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn scratch_dirs_are_created_on_demand() {
        let root = tempfile::tempdir().unwrap();
        let scenes = scenes_dir(root.path()).await.unwrap();
        assert!(scenes.is_dir());
        assert_eq!(scenes, root.path().join("scenes"));

        let again = scenes_dir(root.path()).await.unwrap();
        assert_eq!(scenes, again);
    }
}

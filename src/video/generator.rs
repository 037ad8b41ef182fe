use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use super::subtitles::{render_srt, Cue};
use super::{BuildConfig, SceneBuilder};
use crate::api::probe_duration;
use crate::error::{ElmoError, Result};
use crate::files;
use crate::narration::round_millis;
use crate::scene::metadata::{NarrationEntry, SceneMetadata};

const SAMPLE_RATE: u32 = 44_100;
const FRAME_RATE: u32 = 25;

/// ffmpeg-backed builder: one normalized segment per scene, then a concat.
#[derive(Debug, Clone, Default)]
pub struct VideoGenerator;

impl VideoGenerator {
    pub fn new() -> Self {
        Self
    }

    async fn create_segment(
        &self,
        scene: &SceneMetadata,
        subtitles: Option<&Path>,
        output_path: &Path,
    ) -> Result<()> {
        info!(
            scene = %scene.filename,
            narrations = scene.audio.len(),
            "Creating video segment"
        );
        run_ffmpeg(segment_args(scene, subtitles, output_path), "segment creation").await?;
        info!("Created segment: {}", output_path.display());
        Ok(())
    }

    async fn write_subtitles(&self, scene: &SceneMetadata, path: &Path) -> Result<()> {
        let mut cues = Vec::with_capacity(scene.audio.len());
        for entry in &scene.audio {
            let length = probe_duration(Path::new(&entry.filename)).await?;
            cues.push(Cue {
                start: entry.timestamp,
                end: entry.timestamp + round_millis(length),
                text: entry.text.clone(),
            });
        }
        tokio::fs::write(path, render_srt(&cues)).await?;
        Ok(())
    }

    async fn concat_videos(&self, concat_file: &Path, output_path: &Path) -> Result<()> {
        info!("Concatenating video segments...");
        let args = vec![
            "-y".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            "concat".to_string(),
            "-safe".to_string(),
            "0".to_string(),
            "-i".to_string(),
            concat_file.display().to_string(),
            "-c".to_string(),
            "copy".to_string(),
            output_path.display().to_string(),
        ];
        run_ffmpeg(args, "concat").await?;
        info!("Concatenated video: {}", output_path.display());
        Ok(())
    }
}

#[async_trait]
impl SceneBuilder for VideoGenerator {
    async fn build(&self, scenes: &[SceneMetadata], config: &BuildConfig) -> Result<()> {
        if scenes.is_empty() {
            return Err(ElmoError::Build("no scenes to build".to_string()));
        }
        info!(scenes = scenes.len(), "Starting video generation...");

        let build_dir = files::build_dir(&config.work_dir).await?;
        let mut concat_content = String::new();
        let mut intermediates: Vec<PathBuf> = Vec::new();

        for (index, scene) in scenes.iter().enumerate() {
            let segment_path = build_dir.join(format!("segment_{}.mp4", index));

            let subtitles = if config.subtitles && !scene.audio.is_empty() {
                let srt = build_dir.join(format!("segment_{}.srt", index));
                self.write_subtitles(scene, &srt).await?;
                intermediates.push(srt.clone());
                Some(srt)
            } else {
                None
            };

            self.create_segment(scene, subtitles.as_deref(), &segment_path)
                .await?;

            let abs_segment_path = segment_path.canonicalize().map_err(|e| {
                ElmoError::Build(format!("Failed to get absolute path: {}", e))
            })?;
            concat_content.push_str(&format!("file '{}'\n", abs_segment_path.display()));
            intermediates.push(segment_path);
        }

        let concat_file = build_dir.join("concat.txt");
        tokio::fs::write(&concat_file, concat_content).await?;
        intermediates.push(concat_file.clone());

        self.concat_videos(&concat_file, &config.filename).await?;
        info!("Video generation completed: {}", config.filename.display());

        for path in intermediates {
            tokio::fs::remove_file(&path).await.ok();
        }
        Ok(())
    }
}

async fn run_ffmpeg(args: Vec<String>, step: &str) -> Result<()> {
    let output = Command::new("ffmpeg")
        .args(&args)
        .output()
        .await
        .map_err(|e| ElmoError::Build(format!("Failed to run FFmpeg: {}", e)))?;

    if !output.status.success() {
        let error = String::from_utf8_lossy(&output.stderr);
        return Err(ElmoError::Build(format!(
            "FFmpeg {} failed: {}",
            step, error
        )));
    }
    Ok(())
}

/// Each narration clip is delayed to its timestamp and mixed into one track,
/// padded with silence so `-shortest` trims the mix to the video length.
fn audio_filter(audio: &[NarrationEntry]) -> String {
    let mut graph = String::new();
    for (i, entry) in audio.iter().enumerate() {
        let delay_ms = (entry.timestamp.max(0.0) * 1000.0).round() as u64;
        graph.push_str(&format!(
            "[{input}:a]aresample={rate},adelay={delay}|{delay}[a{input}];",
            input = i + 1,
            rate = SAMPLE_RATE,
            delay = delay_ms,
        ));
    }

    if audio.len() == 1 {
        graph.push_str("[a1]apad[aout]");
    } else {
        let labels: String = (1..=audio.len()).map(|i| format!("[a{}]", i)).collect();
        graph.push_str(&format!(
            "{}amix=inputs={}:duration=longest:dropout_transition=0,volume={},apad[aout]",
            labels,
            audio.len(),
            audio.len()
        ));
    }
    graph
}

/// Escape a path for use inside a quoted filtergraph option.
fn filter_path(path: &Path) -> String {
    path.display()
        .to_string()
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
}

fn segment_args(scene: &SceneMetadata, subtitles: Option<&Path>, output_path: &Path) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        scene.filename.clone(),
    ];

    let mut graph = String::new();
    let video_label = match subtitles {
        Some(srt) => {
            graph.push_str(&format!("[0:v]subtitles='{}'[v];", filter_path(srt)));
            "[v]".to_string()
        }
        None => "0:v:0".to_string(),
    };

    let audio_label = if scene.audio.is_empty() {
        args.extend([
            "-f".into(),
            "lavfi".into(),
            "-i".into(),
            format!("anullsrc=channel_layout=stereo:sample_rate={}", SAMPLE_RATE),
        ]);
        "1:a:0".to_string()
    } else {
        for entry in &scene.audio {
            args.extend(["-i".into(), entry.filename.clone()]);
        }
        graph.push_str(&audio_filter(&scene.audio));
        "[aout]".to_string()
    };

    let graph = graph.trim_end_matches(';').to_string();
    if !graph.is_empty() {
        args.extend(["-filter_complex".into(), graph]);
    }

    args.extend([
        "-map".into(),
        video_label,
        "-map".into(),
        audio_label,
        "-c:v".into(),
        "libx264".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-r".into(),
        FRAME_RATE.to_string(),
        "-c:a".into(),
        "aac".into(),
        "-ar".into(),
        SAMPLE_RATE.to_string(),
        "-ac".into(),
        "2".into(),
        "-shortest".into(),
        output_path.display().to_string(),
    ]);
    args
}

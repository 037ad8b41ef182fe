//! Page video capture: CDP screencast frames piped into an ffmpeg encoder.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use chromiumoxide::cdp::browser_protocol::page::{
    EventScreencastFrame, ScreencastFrameAckParams, StartScreencastFormat,
    StartScreencastParams, StopScreencastParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{ElmoError, Result};

pub struct ScreencastRecorder {
    path: PathBuf,
    ffmpeg: Child,
    stop_tx: Option<oneshot::Sender<()>>,
    pump: JoinHandle<Result<u64>>,
}

impl ScreencastRecorder {
    pub async fn start(page: &Page, path: &Path, fps: u32) -> Result<Self> {
        let mut ffmpeg = Command::new("ffmpeg")
            .args(ffmpeg_capture_args(path, fps))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ElmoError::Driver(format!("Failed to run FFmpeg: {}", e)))?;

        let stdin = ffmpeg
            .stdin
            .take()
            .ok_or_else(|| ElmoError::Driver("FFmpeg stdin unavailable".to_string()))?;

        let frames = page.event_listener::<EventScreencastFrame>().await?;
        page.execute(
            StartScreencastParams::builder()
                .format(StartScreencastFormat::Jpeg)
                .quality(90)
                .every_nth_frame(1)
                .build(),
        )
        .await?;

        let (stop_tx, stop_rx) = oneshot::channel();
        let pump = tokio::spawn(pump_frames(page.clone(), frames, stdin, stop_rx));

        info!(path = %path.display(), "capture started");
        Ok(Self {
            path: path.to_path_buf(),
            ffmpeg,
            stop_tx: Some(stop_tx),
            pump,
        })
    }

    /// Stop the screencast and wait for ffmpeg to finish writing the file.
    pub async fn finish(mut self, page: &Page) -> Result<()> {
        if let Err(e) = page.execute(StopScreencastParams::default()).await {
            warn!(error = %e, "failed to stop screencast cleanly");
        }
        if let Some(stop) = self.stop_tx.take() {
            let _ = stop.send(());
        }

        let frames = self
            .pump
            .await
            .map_err(|e| ElmoError::Driver(format!("capture task failed: {}", e)))??;

        let output = self.ffmpeg.wait_with_output().await?;
        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(ElmoError::Driver(format!(
                "FFmpeg capture failed: {}",
                error
            )));
        }

        info!(path = %self.path.display(), frames, "capture written");
        Ok(())
    }
}

async fn pump_frames(
    page: Page,
    mut frames: chromiumoxide::listeners::EventStream<EventScreencastFrame>,
    mut stdin: ChildStdin,
    mut stop_rx: oneshot::Receiver<()>,
) -> Result<u64> {
    let mut written = 0u64;
    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            frame = frames.next() => {
                let Some(frame) = frame else { break };
                let jpeg = decode_frame(&frame)?;
                stdin.write_all(&jpeg).await?;
                written += 1;
                page.execute(ScreencastFrameAckParams::new(frame.session_id)).await?;
            }
        }
    }

    // Closing stdin is what lets ffmpeg finalize the container.
    stdin.shutdown().await?;
    drop(stdin);
    debug!(written, "screencast pump drained");
    Ok(written)
}

fn decode_frame(frame: &EventScreencastFrame) -> Result<Vec<u8>> {
    let encoded = serde_json::to_value(&frame.data)?;
    let encoded = encoded
        .as_str()
        .ok_or_else(|| ElmoError::Driver("screencast frame is not base64 text".to_string()))?;
    B64.decode(encoded)
        .map_err(|e| ElmoError::Driver(format!("failed to decode screencast frame: {}", e)))
}

/// Frames arrive only when the page repaints, so they are stamped with wall
/// clock time on input and resampled to a constant rate on output.
pub fn ffmpeg_capture_args(path: &Path, fps: u32) -> Vec<String> {
    let fps = fps.to_string();
    vec![
        "-y".into(),
        "-loglevel".into(),
        "error".into(),
        "-use_wallclock_as_timestamps".into(),
        "1".into(),
        "-f".into(),
        "image2pipe".into(),
        "-c:v".into(),
        "mjpeg".into(),
        "-i".into(),
        "-".into(),
        "-vf".into(),
        "pad=ceil(iw/2)*2:ceil(ih/2)*2".into(),
        "-vsync".into(),
        "cfr".into(),
        "-r".into(),
        fps,
        "-c:v".into(),
        "libx264".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        path.display().to_string(),
    ]
}

use std::path::Path;
use std::time::Duration;

use tokio::process::Command;

use crate::error::{ElmoError, Result};

/// Playback length read from the file itself with `ffprobe`.
pub async fn probe_duration(path: &Path) -> Result<Duration> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .await
        .map_err(|e| ElmoError::Narration(format!("Failed to run ffprobe: {}", e)))?;

    if !output.status.success() {
        return Err(ElmoError::Narration(format!(
            "Could not read audio length {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
        ElmoError::Narration(format!("Could not read audio length {}", path.display()))
    })
}

fn parse_probe_output(stdout: &str) -> Option<Duration> {
    let seconds: f64 = stdout.lines().next()?.trim().parse().ok()?;
    if seconds.is_finite() && seconds > 0.0 {
        Some(Duration::from_secs_f64(seconds))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_seconds() {
        assert_eq!(
            parse_probe_output("2.500000\n"),
            Some(Duration::from_millis(2500))
        );
    }

    #[test]
    fn rejects_missing_or_zero_length() {
        assert_eq!(parse_probe_output(""), None);
        assert_eq!(parse_probe_output("N/A\n"), None);
        assert_eq!(parse_probe_output("0.000000\n"), None);
    }
}

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{probe_duration, save_audio};
use crate::error::{ElmoError, Result};
use crate::narration::{NarrationProvider, SynthesizedAudio};

const DASHSCOPE_TTS_API: &str =
    "https://dashscope.aliyuncs.com/api/v1/services/aigc/text2speech/speech-synthesis";
const DEFAULT_MODEL: &str = "cosyvoice-v1";
const DEFAULT_VOICE: &str = "longxiaochun";

/// DashScope CosyVoice speech synthesis.
#[derive(Debug, Clone)]
pub struct DashScopeNarrator {
    api_key: String,
    client: Client,
    voice: String,
    work_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct TtsResponse {
    output: TtsOutput,
}

#[derive(Debug, Deserialize)]
struct TtsOutput {
    audio_url: Option<String>,
}

impl DashScopeNarrator {
    pub fn new(api_key: String, voice: Option<String>, work_dir: PathBuf) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            api_key,
            client,
            voice: voice.unwrap_or_else(|| DEFAULT_VOICE.to_string()),
            work_dir,
        })
    }

    /// The endpoint answers either with raw audio or with a JSON envelope
    /// pointing at it.
    async fn fetch_speech(&self, text: &str) -> Result<Vec<u8>> {
        let request_body = json!({
            "model": DEFAULT_MODEL,
            "input": {
                "text": text
            },
            "parameters": {
                "voice": self.voice,
                "format": "mp3"
            }
        });

        let response = self
            .client
            .post(DASHSCOPE_TTS_API)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(ElmoError::Narration(format!(
                "TTS API error: {}",
                error_text
            )));
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("application/json"))
            .unwrap_or(false);

        if !is_json {
            return Ok(response.bytes().await?.to_vec());
        }

        let envelope: TtsResponse = response.json().await?;
        let audio_url = envelope
            .output
            .audio_url
            .ok_or_else(|| ElmoError::Narration("No audio URL in response".to_string()))?;
        Ok(self.client.get(&audio_url).send().await?.bytes().await?.to_vec())
    }
}

#[async_trait]
impl NarrationProvider for DashScopeNarrator {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio> {
        info!(chars = text.chars().count(), voice = %self.voice, "Generating speech");

        let audio = self.fetch_speech(text).await?;
        let path = save_audio(&self.work_dir, &audio).await?;

        info!("Speech saved to: {}", path.display());
        Ok(SynthesizedAudio { path })
    }

    async fn audio_duration(&self, path: &Path) -> Result<Duration> {
        probe_duration(path).await
    }
}

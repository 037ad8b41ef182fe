use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::{probe_duration, save_audio};
use crate::error::{ElmoError, Result};
use crate::narration::{NarrationProvider, SynthesizedAudio};

const DEFAULT_OPENAI_TTS_URL: &str = "https://api.openai.com/v1/audio/speech";
const DEFAULT_MODEL: &str = "tts-1";
const DEFAULT_VOICE: &str = "alloy";

/// OpenAI `/v1/audio/speech`.
#[derive(Debug, Clone)]
pub struct OpenAiNarrator {
    client: Client,
    api_key: String,
    endpoint: String,
    voice: String,
    work_dir: PathBuf,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

impl OpenAiNarrator {
    pub fn new(api_key: String, voice: Option<String>, work_dir: PathBuf) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            api_key,
            endpoint: DEFAULT_OPENAI_TTS_URL.to_string(),
            voice: voice.unwrap_or_else(|| DEFAULT_VOICE.to_string()),
            work_dir,
        })
    }

    fn request_body<'a>(&'a self, text: &'a str) -> SpeechRequest<'a> {
        SpeechRequest {
            model: DEFAULT_MODEL,
            input: text,
            voice: &self.voice,
            response_format: "mp3",
        }
    }
}

#[async_trait]
impl NarrationProvider for OpenAiNarrator {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio> {
        debug!(
            endpoint = %self.endpoint,
            voice = %self.voice,
            text_len = text.len(),
            "sending TTS request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.request_body(text))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(ElmoError::Narration(format!(
                "OpenAI API returned {}: {}",
                status, error_body
            )));
        }

        let audio = response.bytes().await?;
        let path = save_audio(&self.work_dir, &audio).await?;
        debug!(bytes = audio.len(), path = %path.display(), "received TTS audio");
        Ok(SynthesizedAudio { path })
    }

    async fn audio_duration(&self, path: &Path) -> Result<Duration> {
        probe_duration(path).await
    }
}

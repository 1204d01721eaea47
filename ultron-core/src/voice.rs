//! Speech transcription delegate.
//!
//! Turns a recorded audio file into transcript text. `HttpTranscriber` posts
//! the file to a transcription service; `MockTranscriber` serves tests.

use crate::config::VoiceConfig;
use crate::error::VoiceError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

const HYPOTHESIS_MARKER: &str = "hypothesis:";

/// Audio file in, transcript text out. A service that returns no transcript yields `""`.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> Result<String, VoiceError>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

/// Multipart upload to a transcription endpoint answering `{"transcript": "..."}`.
pub struct HttpTranscriber {
    client: reqwest::Client,
    url: String,
}

impl HttpTranscriber {
    pub fn new(config: &VoiceConfig) -> Result<Self, VoiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VoiceError::TranscriptionFailed {
                message: format!("Failed to create HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            url: config.transcription_url.clone(),
        })
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<String, VoiceError> {
        let bytes = tokio::fs::read(audio)
            .await
            .map_err(|_| VoiceError::AudioNotFound {
                path: audio.to_path_buf(),
            })?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.wav".to_string());
        info!(file = %file_name, bytes = bytes.len(), "Uploading audio for transcription");

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| VoiceError::TranscriptionFailed {
                message: format!("HTTP request failed: {e}"),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::TranscriptionFailed {
                message: format!("API returned {status}: {body}"),
            });
        }

        let json: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| VoiceError::TranscriptionFailed {
                    message: format!("JSON parse error: {e}"),
                })?;
        let transcript = transcript_from_json(&json);
        debug!(chars = transcript.len(), "Transcript received");
        Ok(transcript)
    }

    fn name(&self) -> &str {
        "http"
    }
}

fn transcript_from_json(json: &serde_json::Value) -> String {
    json["transcript"].as_str().unwrap_or("").to_string()
}

/// A mock transcriber returning queued transcripts, then `""`.
pub struct MockTranscriber {
    transcripts: Mutex<VecDeque<String>>,
    call_count: AtomicUsize,
}

impl MockTranscriber {
    pub fn new() -> Self {
        Self::with_transcripts(Vec::new())
    }

    pub fn with_transcripts(transcripts: Vec<&str>) -> Self {
        Self {
            transcripts: Mutex::new(transcripts.into_iter().map(str::to_string).collect()),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }
}

impl Default for MockTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, _audio: &Path) -> Result<String, VoiceError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .transcripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// The text after a case-insensitive `hypothesis:` marker, else the whole transcript.
pub fn extract_hypothesis(transcript: &str) -> &str {
    let lower = transcript.to_ascii_lowercase();
    match lower.find(HYPOTHESIS_MARKER) {
        Some(idx) => transcript[idx + HYPOTHESIS_MARKER.len()..].trim(),
        None => transcript,
    }
}

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{AppError, Result};
use crate::media::wav::{self, AudioFormat};

const TEMPERATURE: f64 = 1.0;
const SPEAKERS: [(&str, &str); 2] = [("Alex", "Puck"), ("Maya", "Zephyr")];
const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";

/// Audio containers that are stored as delivered.
const CONTAINER_TYPES: [&str; 8] = [
    "audio/wav",
    "audio/x-wav",
    "audio/wave",
    "audio/mpeg",
    "audio/mp3",
    "audio/ogg",
    "audio/flac",
    "audio/aac",
];

#[async_trait]
pub trait SpeechClient: Send + Sync {
    /// Render a two-host script to a playable audio file.
    async fn synthesize(&self, script: &str) -> Result<Vec<u8>>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    inline_data: Option<InlineData>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: Option<String>,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

impl ApiError {
    fn into_app_error(self, http_status: u16) -> AppError {
        let status = if self.code == 0 { http_status } else { self.code };
        if status == StatusCode::TOO_MANY_REQUESTS.as_u16() || self.status == RESOURCE_EXHAUSTED {
            AppError::QuotaExceeded {
                service: "Gemini",
                message: self.message,
            }
        } else {
            AppError::Api {
                service: "Gemini",
                status,
                message: format!("{} {}", self.status, self.message).trim().to_string(),
            }
        }
    }
}

/// Gemini text-to-speech over `streamGenerateContent` (server-sent events).
pub struct GeminiTtsClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiTtsClient {
    pub fn new(base_url: &str, api_key: String, model: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        tracing::info!("Using Gemini TTS model {}", model);
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        })
    }

    fn request_body(script: &str) -> Value {
        let speakers: Vec<Value> = SPEAKERS
            .iter()
            .map(|(speaker, voice)| {
                json!({
                    "speaker": speaker,
                    "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": voice } }
                })
            })
            .collect();

        json!({
            "contents": [{ "role": "user", "parts": [{ "text": script }] }],
            "generationConfig": {
                "temperature": TEMPERATURE,
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "multiSpeakerVoiceConfig": { "speakerVoiceConfigs": speakers }
                }
            }
        })
    }
}

#[async_trait]
impl SpeechClient for GeminiTtsClient {
    async fn synthesize(&self, script: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/models/{}:streamGenerateContent",
            self.base_url, self.model
        );
        let response = self
            .client
            .post(url)
            .query(&[("alt", "sse")])
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(script))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ErrorEnvelope>(&text) {
                Ok(envelope) => envelope.error.into_app_error(status.as_u16()),
                Err(_) if status == StatusCode::TOO_MANY_REQUESTS => AppError::QuotaExceeded {
                    service: "Gemini",
                    message: text,
                },
                Err(_) => AppError::Api {
                    service: "Gemini",
                    status: status.as_u16(),
                    message: text,
                },
            });
        }

        let mut events = SseLines::default();
        let mut audio = AudioCollector::default();
        let mut stream = std::pin::pin!(response.bytes_stream());
        while let Some(chunk) = stream.next().await {
            for payload in events.push(&chunk?) {
                audio.push_event(&payload)?;
            }
        }
        if let Some(payload) = events.finish() {
            audio.push_event(&payload)?;
        }

        audio.finish()
    }
}

/// Splits a server-sent event stream into `data:` payloads.
#[derive(Debug, Default)]
struct SseLines {
    buffer: Vec<u8>,
}

impl SseLines {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut payloads = Vec::new();
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            if let Some(payload) = data_payload(&line) {
                payloads.push(payload);
            }
        }
        payloads
    }

    fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buffer);
        data_payload(&line)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let payload = line.trim_end_matches(['\r', '\n']).strip_prefix("data:")?.trim();
    (!payload.is_empty()).then(|| payload.to_string())
}

#[derive(Debug, Default)]
struct AudioCollector {
    mime_type: Option<String>,
    data: Vec<u8>,
}

impl AudioCollector {
    fn push_event(&mut self, payload: &str) -> Result<()> {
        let chunk: StreamChunk = serde_json::from_str(payload)
            .map_err(|e| AppError::parse(format!("unexpected Gemini stream event: {}", e)))?;

        if let Some(error) = chunk.error {
            return Err(error.into_app_error(0));
        }

        let parts = chunk
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts)
            .unwrap_or_default();

        for part in parts {
            if let Some(inline) = part.inline_data.filter(|inline| !inline.data.is_empty()) {
                if self.mime_type.is_none() {
                    self.mime_type = inline.mime_type;
                }
                let bytes = STANDARD
                    .decode(inline.data.as_bytes())
                    .map_err(|e| AppError::parse(format!("invalid base64 audio chunk: {}", e)))?;
                self.data.extend_from_slice(&bytes);
            } else if let Some(text) = part.text {
                tracing::debug!(
                    "Gemini text chunk: {}",
                    text.chars().take(100).collect::<String>()
                );
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>> {
        if self.data.is_empty() {
            return Err(AppError::parse("Gemini returned no audio data"));
        }

        match self.mime_type.as_deref() {
            Some(mime) if wav::is_raw_pcm(mime) => {
                wav::wrap_pcm(&self.data, AudioFormat::from_mime(mime)?)
            }
            Some(mime) if is_container(mime) => Ok(self.data),
            _ => wav::wrap_pcm(&self.data, AudioFormat::default()),
        }
    }
}

fn is_container(mime_type: &str) -> bool {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    CONTAINER_TYPES.contains(&essence.as_str())
}

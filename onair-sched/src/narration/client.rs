//! HTTP narration client
//!
//! Wire format:
//! - `POST /generate_text {prompt, max_tokens, temperature}` -> `{text}`
//! - `POST /generate_tts {text, voice, speed}` -> `{audio_data}` (base64)
//! - `GET /health`

use super::NarrationService;
use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

const USER_AGENT: &str = concat!("onair-sched/", env!("CARGO_PKG_VERSION"));
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct TextRequest<'a> {
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct TextResponse {
    text: String,
}

#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    voice: &'a str,
    speed: f32,
}

#[derive(Debug, Deserialize)]
struct TtsResponse {
    audio_data: String,
}

/// Narration service reached over HTTP
pub struct HttpNarrationClient {
    http_client: reqwest::Client,
    base_url: String,
    text_timeout: Duration,
    tts_timeout: Duration,
    output_dir: PathBuf,
}

impl HttpNarrationClient {
    pub fn new(
        base_url: impl Into<String>,
        text_timeout: Duration,
        tts_timeout: Duration,
        output_dir: PathBuf,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| Error::NarrationUnavailable(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            text_timeout,
            tts_timeout,
            output_dir,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    async fn post_json<Req: Serialize + ?Sized, Resp: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        body: &Req,
        timeout: Duration,
    ) -> Result<Resp> {
        let response = self
            .http_client
            .post(self.url(endpoint))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::NarrationUnavailable(format!("{}: {}", endpoint, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::NarrationUnavailable(format!("{} returned {}", endpoint, status)));
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| Error::NarrationUnavailable(format!("{}: malformed response: {}", endpoint, e)))
    }
}

#[async_trait]
impl NarrationService for HttpNarrationClient {
    async fn generate_text(&self, prompt: &str) -> Result<String> {
        let request = TextRequest {
            prompt,
            max_tokens: 150,
            temperature: 0.8,
        };
        let response: TextResponse = self.post_json("generate_text", &request, self.text_timeout).await?;

        let text = response.text.trim();
        if text.is_empty() {
            return Err(Error::NarrationUnavailable("generate_text returned empty text".to_string()));
        }
        Ok(text.to_string())
    }

    async fn synthesize(&self, content_item_id: Uuid, text: &str) -> Result<PathBuf> {
        let request = TtsRequest {
            text,
            voice: "default",
            speed: 1.0,
        };
        let response: TtsResponse = self.post_json("generate_tts", &request, self.tts_timeout).await?;

        let audio = STANDARD
            .decode(response.audio_data.trim())
            .map_err(|e| Error::NarrationUnavailable(format!("generate_tts: invalid audio payload: {}", e)))?;
        if audio.is_empty() {
            return Err(Error::NarrationUnavailable("generate_tts returned no audio".to_string()));
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(format!(
            "intro_{}_{}.mp3",
            content_item_id,
            Utc::now().format("%Y%m%d_%H%M%S")
        ));
        tokio::fs::write(&path, &audio).await?;

        tracing::debug!(
            content_item_id = %content_item_id,
            bytes = audio.len(),
            path = %path.display(),
            "Narration audio written"
        );
        Ok(path)
    }

    async fn health(&self) -> Result<()> {
        let response = self
            .http_client
            .get(self.url("health"))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::NarrationUnavailable(format!("health: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::NarrationUnavailable(format!("health returned {}", response.status())))
        }
    }
}

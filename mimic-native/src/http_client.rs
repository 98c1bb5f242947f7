//! HTTP client for the analysis backend.
//!
//! Endpoints:
//! - `POST /api/game/start`
//! - `GET  /api/game/{session_id}/bird-call?round={n}` (WAV body)
//! - `POST /api/game/{session_id}/analyze` (multipart field `audio`)
//! - `GET  /api/health`
//!
//! No request is retried. Submitting an attempt is not idempotent.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client, Response};
use serde::de::DeserializeOwned;

use mimic_core::models::error::{PlaybackError, SessionError};
use mimic_core::models::verdict::{StartResponse, Verdict};
use mimic_core::models::waveform::WaveformBlob;
use mimic_core::traits::game_client::GameSessionClient;

const ATTEMPT_FILE_NAME: &str = "recording.wav";
const ATTEMPT_FIELD: &str = "audio";

pub struct HttpGameClient {
    client: Client,
    base_url: String,
}

impl HttpGameClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SessionError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SessionError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn start_url(&self) -> String {
        format!("{}/api/game/start", self.base_url)
    }

    fn call_url(&self, session_id: &str, round: u32) -> String {
        format!("{}/api/game/{}/bird-call?round={}", self.base_url, session_id, round)
    }

    fn analyze_url(&self, session_id: &str) -> String {
        format!("{}/api/game/{}/analyze", self.base_url, session_id)
    }

    fn health_url(&self) -> String {
        format!("{}/api/health", self.base_url)
    }
}

/// Turn a non-2xx response into `SessionError::Status`.
async fn check_status(response: Response) -> Result<Response, SessionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    log::error!("Backend request failed: {} - {}", status, body);
    Err(SessionError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, SessionError> {
    let bytes = response.bytes().await.map_err(transport)?;
    serde_json::from_slice(&bytes).map_err(|e| SessionError::Decode(e.to_string()))
}

fn transport(err: reqwest::Error) -> SessionError {
    SessionError::Transport(err.to_string())
}

fn decode_call(bytes: Vec<u8>) -> Result<WaveformBlob, SessionError> {
    WaveformBlob::from_wav_bytes(bytes).map_err(|e| match e {
        PlaybackError::Decode(msg) => SessionError::Decode(format!("call is not a WAV file: {}", msg)),
        other => SessionError::Decode(other.to_string()),
    })
}

#[async_trait]
impl GameSessionClient for HttpGameClient {
    async fn start(&self) -> Result<StartResponse, SessionError> {
        let response = self.client.post(self.start_url()).send().await.map_err(transport)?;
        let start: StartResponse = read_json(check_status(response).await?).await?;
        log::info!(
            "Started session {} (round {}, {} tries)",
            start.session_id,
            start.round,
            start.tries_left
        );
        Ok(start)
    }

    async fn fetch_call(&self, session_id: &str, round: u32) -> Result<WaveformBlob, SessionError> {
        let response = self
            .client
            .get(self.call_url(session_id, round))
            .send()
            .await
            .map_err(transport)?;
        let bytes = check_status(response).await?.bytes().await.map_err(transport)?;
        log::debug!("Fetched call for round {}: {} bytes", round, bytes.len());
        decode_call(bytes.to_vec())
    }

    async fn submit(&self, session_id: &str, waveform: &WaveformBlob) -> Result<Verdict, SessionError> {
        let part = multipart::Part::bytes(waveform.to_vec())
            .file_name(ATTEMPT_FILE_NAME)
            .mime_str("audio/wav")
            .map_err(transport)?;
        let form = multipart::Form::new().part(ATTEMPT_FIELD, part);

        log::debug!("Submitting attempt: {} bytes", waveform.len());
        let response = self
            .client
            .post(self.analyze_url(session_id))
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;
        let verdict: Verdict = read_json(check_status(response).await?).await?;
        log::info!(
            "Verdict: passed={}, score={:?}, game_over={}",
            verdict.passed,
            verdict.total_score.or(verdict.performance_score),
            verdict.game_over
        );
        Ok(verdict)
    }

    async fn health(&self) -> Result<(), SessionError> {
        let response = self.client.get(self.health_url()).send().await.map_err(transport)?;
        check_status(response).await?;
        Ok(())
    }
}

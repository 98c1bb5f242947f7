use async_trait::async_trait;

use crate::models::error::SessionError;
use crate::models::verdict::{StartResponse, Verdict};
use crate::models::waveform::WaveformBlob;

/// RPC boundary to the analysis backend.
///
/// Every call is a single, non-idempotent request. Implementations must not
/// retry on their own; a non-2xx response is reported as
/// `SessionError::Status`.
#[async_trait]
pub trait GameSessionClient: Send + Sync {
    /// Create a new backend session.
    async fn start(&self) -> Result<StartResponse, SessionError>;

    /// Fetch the opponent's call for `round`.
    async fn fetch_call(&self, session_id: &str, round: u32) -> Result<WaveformBlob, SessionError>;

    /// Submit one attempt for judging.
    async fn submit(&self, session_id: &str, waveform: &WaveformBlob) -> Result<Verdict, SessionError>;

    /// Check that the backend is reachable.
    async fn health(&self) -> Result<(), SessionError> {
        Ok(())
    }
}

//! # mimic-core
//!
//! Platform-agnostic core of the mimic battle game.
//!
//! Provides the fixed-window capture engine, 16-bit WAV encoding, serialized
//! call playback, and the battle orchestrator that drives a match against
//! the analysis backend. Platform backends implement `AudioBackend` and
//! `AudioSink`; the backend transport implements `GameSessionClient`.
//!
//! ## Architecture
//!
//! ```text
//! mimic-core (this crate)
//! ├── traits/       ← AudioBackend, AudioContext, AudioSink, GameSessionClient, BattleObserver
//! ├── models/       ← errors, Phase, configs, WaveformBlob, Verdict, MatchOutcome
//! ├── processing/   ← WAV header + PCM encoding, BlockFramer, frame collection
//! ├── capture/      ← CaptureEngine (one capture window at a time)
//! ├── playback/     ← PlaybackService (one clip at a time)
//! └── battle/       ← MatchState (pure transitions), BattleOrchestrator
//! ```

pub mod battle;
pub mod capture;
pub mod models;
pub mod playback;
pub mod processing;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types at crate root for convenience.
pub use battle::orchestrator::{BattleOrchestrator, MatchResources};
pub use battle::state::{BattleEvent, MatchSnapshot, MatchState};
pub use capture::engine::CaptureEngine;
pub use models::config::{BattleConfig, CaptureConfig, PlaybackConfig};
pub use models::error::{BattleError, CaptureError, PlaybackError, SessionError};
pub use models::outcome::MatchOutcome;
pub use models::phase::Phase;
pub use models::verdict::{MatchResult, StartResponse, Verdict};
pub use models::waveform::{DecodedClip, WaveformBlob};
pub use playback::service::PlaybackService;
pub use processing::block_framer::BlockFramer;
pub use traits::audio_backend::{
    AudioBackend, AudioBlockCallback, AudioContext, ContextState, MicrophoneConstraints,
    MicrophoneStream, NodeKind, ProcessingNode,
};
pub use traits::audio_sink::{AudioSink, ClipHandle, PlaybackOutcome};
pub use traits::battle_observer::BattleObserver;
pub use traits::game_client::GameSessionClient;

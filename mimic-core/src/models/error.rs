use thiserror::Error;

use super::phase::Phase;

/// Errors raised while opening or running a capture window.
///
/// `PermissionDenied` is kept apart from every other variant so callers can
/// tell the player to re-grant microphone access instead of reporting a
/// platform fault.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("no capture device available")]
    DeviceNotAvailable,

    #[error("a capture window is already open")]
    WindowAlreadyOpen,

    #[error("capture window duration must be positive (got {0} ms)")]
    InvalidDuration(u64),

    #[error("audio context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("processing node attach failed: {0}")]
    NodeAttachFailed(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("unknown capture error: {0}")]
    Unknown(String),
}

impl CaptureError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied)
    }
}

/// Errors raised by the playback service or its sink.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("could not decode waveform: {0}")]
    Decode(String),

    #[error("output device error: {0}")]
    Device(String),

    #[error("playback stream error: {0}")]
    Stream(String),
}

/// Errors raised by a `GameSessionClient`.
///
/// A failed attempt is not an error: it arrives as a `Verdict` with
/// `passed == false`. These variants mean no verdict was obtained at all.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed backend response: {0}")]
    Decode(String),

    #[error("no active session")]
    MissingSession,
}

/// Errors surfaced by the battle orchestrator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BattleError {
    #[error("match already started")]
    AlreadyStarted,

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("event {event} is not valid in phase {phase:?}")]
    InvalidTransition { phase: Phase, event: &'static str },
}

impl BattleError {
    /// Text suitable for showing to the player.
    pub fn user_message(&self) -> String {
        match self {
            Self::Capture(CaptureError::PermissionDenied) => {
                "Microphone access was denied. Allow microphone access and start a new battle."
                    .into()
            }
            Self::Capture(e) => format!("Could not record your attempt: {}", e),
            Self::Playback(_) => "The opponent's call could not be played. The round was halted.".into(),
            Self::Session(_) => {
                "Could not reach the judge. Your attempt was not scored; please try again later."
                    .into()
            }
            Self::AlreadyStarted | Self::Configuration(_) | Self::InvalidTransition { .. } => {
                "Error occurred during battle".into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denial_is_distinguishable() {
        assert!(CaptureError::PermissionDenied.is_permission_denied());
        assert!(!CaptureError::DeviceNotAvailable.is_permission_denied());
        assert!(!CaptureError::NodeAttachFailed("x".into()).is_permission_denied());
    }

    #[test]
    fn user_messages_differ_for_permission_and_submission() {
        let denied = BattleError::from(CaptureError::PermissionDenied).user_message();
        let submit = BattleError::from(SessionError::Status {
            status: 500,
            body: String::new(),
        })
        .user_message();
        assert_ne!(denied, submit);
        assert!(denied.contains("Microphone"));
    }
}

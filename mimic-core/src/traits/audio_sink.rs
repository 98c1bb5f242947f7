use async_trait::async_trait;

use crate::models::error::PlaybackError;
use crate::models::waveform::DecodedClip;

/// Handle to a clip loaded into an `AudioSink`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClipHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// The clip played through to its end.
    Completed,
    /// Playback was cut short by an interrupt, not by a content failure.
    Interrupted,
}

/// An output element that plays one clip at a time.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Load a clip and resolve once enough is buffered to start without
    /// clipping the first audible samples.
    async fn load(&self, clip: DecodedClip) -> Result<ClipHandle, PlaybackError>;

    /// Play a loaded clip, resolving when it ends or is interrupted.
    async fn play(&self, handle: ClipHandle) -> Result<PlaybackOutcome, PlaybackError>;

    /// Cut the current playback short. The pending `play` resolves with
    /// `PlaybackOutcome::Interrupted`.
    fn interrupt(&self);

    /// Free a loaded clip.
    fn release(&self, handle: ClipHandle);
}

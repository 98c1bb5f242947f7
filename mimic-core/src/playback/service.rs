use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;

use crate::models::config::PlaybackConfig;
use crate::models::error::PlaybackError;
use crate::models::waveform::WaveformBlob;
use crate::traits::audio_sink::{AudioSink, ClipHandle, PlaybackOutcome};

/// Plays received waveforms through one shared output sink.
///
/// Calls to [`PlaybackService::play`] are serialized so two clips never
/// overlap on the sink. A clip interrupted by the platform counts as
/// finished. Dropping a `play` future before it resolves interrupts the
/// sink, so an abandoned match does not keep playing.
pub struct PlaybackService {
    sink: Arc<dyn AudioSink>,
    config: PlaybackConfig,
    player: AsyncMutex<()>,
}

impl PlaybackService {
    pub fn new(sink: Arc<dyn AudioSink>, config: PlaybackConfig) -> Self {
        Self {
            sink,
            config,
            player: AsyncMutex::new(()),
        }
    }

    /// Play `blob` to completion.
    pub async fn play(&self, blob: &WaveformBlob) -> Result<(), PlaybackError> {
        let _player = self.player.lock().await;

        let clip = blob.decode()?;
        log::debug!(
            "Loading clip: {} frames at {} Hz, {} channel(s)",
            clip.frames(),
            clip.sample_rate,
            clip.channels
        );

        let handle = self.sink.load(clip).await?;
        let _lease = ClipLease {
            sink: Arc::clone(&self.sink),
            handle,
            grace: self.config.release_grace,
        };
        let mut playing = InterruptOnDrop {
            sink: self.sink.as_ref(),
            armed: true,
        };

        let result = self.sink.play(handle).await;
        playing.armed = false;

        match result {
            Ok(PlaybackOutcome::Completed) => Ok(()),
            Ok(PlaybackOutcome::Interrupted) => {
                log::info!("Playback interrupted, treating as finished");
                Ok(())
            }
            Err(e) => {
                log::error!("Audio playback error: {}", e);
                Err(e)
            }
        }
    }
}

/// Interrupts the sink if `play` is abandoned mid-clip.
struct InterruptOnDrop<'a> {
    sink: &'a dyn AudioSink,
    armed: bool,
}

impl Drop for InterruptOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            log::debug!("Playback abandoned, interrupting sink");
            self.sink.interrupt();
        }
    }
}

/// Releases a loaded clip shortly after playback ends, so the sink is not
/// cut off while flushing its final buffer.
struct ClipLease {
    sink: Arc<dyn AudioSink>,
    handle: ClipHandle,
    grace: Duration,
}

impl Drop for ClipLease {
    fn drop(&mut self) {
        let sink = Arc::clone(&self.sink);
        let handle = self.handle;
        let grace = self.grace;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    tokio::time::sleep(grace).await;
                    sink.release(handle);
                });
            }
            Err(_) => sink.release(handle),
        }
    }
}

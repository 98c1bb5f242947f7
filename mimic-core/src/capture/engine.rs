use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::models::config::CaptureConfig;
use crate::models::error::CaptureError;
use crate::models::waveform::WaveformBlob;
use crate::processing::frames::{BlockSink, FrameCollector};
use crate::traits::audio_backend::{
    AudioBackend, AudioBlockCallback, AudioContext, ContextState, MicrophoneConstraints,
    MicrophoneStream, NodeKind, ProcessingNode,
};

/// Opens fixed-duration capture windows and encodes them as WAV.
///
/// Data flow for one window:
/// ```text
/// [MicrophoneStream] → [ProcessingNode] ─(realtime thread)→ [BlockSink]
///                                                              ↓
///                  [PendingFrames] → concat → 16-bit PCM → [WaveformBlob]
/// ```
///
/// Streams and contexts passed into [`CaptureEngine::open`] are borrowed and
/// never stopped or closed by the engine. Anything the engine acquires
/// itself is released before `open` returns, on every path.
pub struct CaptureEngine {
    backend: Arc<dyn AudioBackend>,
    config: CaptureConfig,
    window_open: Arc<AtomicBool>,
}

impl CaptureEngine {
    pub fn new(backend: Arc<dyn AudioBackend>, config: CaptureConfig) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::ConfigurationFailed)?;
        Ok(Self {
            backend,
            config,
            window_open: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn is_window_open(&self) -> bool {
        self.window_open.load(Ordering::SeqCst)
    }

    pub fn constraints(&self) -> MicrophoneConstraints {
        MicrophoneConstraints {
            sample_rate: self.config.requested_sample_rate,
            echo_cancellation: self.config.echo_cancellation,
            noise_suppression: self.config.noise_suppression,
        }
    }

    /// Ask the platform for a microphone grant the caller will own.
    pub async fn acquire_microphone(&self) -> Result<Arc<dyn MicrophoneStream>, CaptureError> {
        log::info!("Requesting microphone");
        let stream = self.backend.request_microphone(&self.constraints()).await?;
        log::info!("Microphone granted: {}", stream.device_name());
        Ok(stream)
    }

    /// Create a processing context the caller will own. Never suspends.
    pub fn create_context(&self) -> Result<Arc<dyn AudioContext>, CaptureError> {
        self.backend.create_context(self.config.requested_sample_rate)
    }

    /// Record for `duration` and return the encoded attempt.
    ///
    /// The window is bounded by wall-clock time, not by sample count; the
    /// encoded length reflects however many samples actually arrived.
    pub async fn open(
        &self,
        duration: Duration,
        existing_stream: Option<Arc<dyn MicrophoneStream>>,
        existing_context: Option<Arc<dyn AudioContext>>,
    ) -> Result<WaveformBlob, CaptureError> {
        if duration.is_zero() {
            return Err(CaptureError::InvalidDuration(0));
        }
        if self
            .window_open
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CaptureError::WindowAlreadyOpen);
        }
        let _window = WindowGuard(Arc::clone(&self.window_open));

        let mut owned = OwnedResources::default();

        let stream = match existing_stream {
            Some(stream) => {
                log::debug!("Reusing existing microphone stream");
                stream
            }
            None => {
                let stream = self.acquire_microphone().await?;
                owned.stream = Some(Arc::clone(&stream));
                stream
            }
        };

        let context = match existing_context.filter(|c| c.state() != ContextState::Closed) {
            Some(context) => {
                log::debug!("Reusing shared audio context, state: {:?}", context.state());
                context
            }
            None => {
                log::warn!("No shared audio context, creating one for this window");
                let context = self.create_context()?;
                owned.context = Some(Arc::clone(&context));
                context
            }
        };

        if context.state() == ContextState::Suspended {
            log::info!("Audio context suspended, resuming");
            context.resume()?;
        }

        let (node, collector) = self.attach_node(stream.as_ref(), context.as_ref())?;
        let mut node = NodeGuard(Some(node));

        log::info!(
            "Recording started on {} node, will stop after {} ms",
            node.kind().map(|k| k.as_str()).unwrap_or("?"),
            duration.as_millis()
        );
        tokio::time::sleep(duration).await;

        let actual_rate = context.sample_rate();
        node.detach();
        let frames = collector.finish().await;
        owned.release();
        let frames = frames?;

        log::info!(
            "Recording finished, total blocks: {}, samples: {}",
            frames.block_count(),
            frames.sample_count()
        );

        let blob = WaveformBlob::from_samples(&frames.concat(), actual_rate);
        log::info!(
            "WAV encoded, size: {} bytes, sample rate: {}",
            blob.len(),
            blob.sample_rate()
        );
        Ok(blob)
    }

    /// Attach the dedicated node when the platform offers one, otherwise
    /// (or if it fails to attach) the block-callback node.
    fn attach_node(
        &self,
        stream: &dyn MicrophoneStream,
        context: &dyn AudioContext,
    ) -> Result<(Box<dyn ProcessingNode>, FrameCollector), CaptureError> {
        let log_every = self.config.progress_log_interval;

        if context.supports_dedicated_node() {
            let (sink, collector) = FrameCollector::port(log_every);
            match context.attach_node(stream, NodeKind::Dedicated, block_callback(sink)) {
                Ok(node) => return Ok((node, collector)),
                Err(CaptureError::PermissionDenied) => return Err(CaptureError::PermissionDenied),
                Err(e) => {
                    log::warn!("Dedicated node unavailable ({}), falling back to block callback", e);
                }
            }
        }

        let (sink, collector) = FrameCollector::shared(log_every);
        match context.attach_node(stream, NodeKind::BlockCallback, block_callback(sink)) {
            Ok(node) => Ok((node, collector)),
            Err(CaptureError::PermissionDenied) => Err(CaptureError::PermissionDenied),
            Err(e) => Err(CaptureError::NodeAttachFailed(e.to_string())),
        }
    }
}

fn block_callback(sink: BlockSink) -> AudioBlockCallback {
    Arc::new(move |block: &[f32]| sink.deliver(block))
}

/// Clears the one-window latch when the window ends, however it ends.
struct WindowGuard(Arc<AtomicBool>);

impl Drop for WindowGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Detaches the node if the window is abandoned mid-flight.
struct NodeGuard(Option<Box<dyn ProcessingNode>>);

impl NodeGuard {
    fn kind(&self) -> Option<NodeKind> {
        self.0.as_ref().map(|n| n.kind())
    }

    fn detach(&mut self) {
        if let Some(mut node) = self.0.take() {
            node.detach();
        }
    }
}

impl Drop for NodeGuard {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Stream and context acquired by the engine for a single window.
#[derive(Default)]
struct OwnedResources {
    stream: Option<Arc<dyn MicrophoneStream>>,
    context: Option<Arc<dyn AudioContext>>,
}

impl OwnedResources {
    fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            log::debug!("Stopping owned microphone stream");
            stream.stop();
        }
        if let Some(context) = self.context.take() {
            log::debug!("Closing owned audio context");
            context.close();
        }
    }
}

impl Drop for OwnedResources {
    fn drop(&mut self) {
        self.release();
    }
}

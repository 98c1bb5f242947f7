use std::sync::Arc;

use async_trait::async_trait;

use crate::models::error::CaptureError;

/// Callback invoked with each mono block of f32 samples in [-1, 1].
///
/// Fires on the platform's realtime audio thread; keep work minimal.
pub type AudioBlockCallback = Arc<dyn Fn(&[f32]) + Send + Sync + 'static>;

/// The two mutually exclusive processing node variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Low-latency node running on a dedicated realtime thread, delivering
    /// each device buffer as it arrives.
    Dedicated,
    /// Fallback node delivering fixed-size blocks from a block callback.
    BlockCallback,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dedicated => "dedicated",
            Self::BlockCallback => "block-callback",
        }
    }
}

/// Constraints passed along with a microphone request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MicrophoneConstraints {
    pub sample_rate: u32,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
}

/// A live microphone input granted by the platform.
pub trait MicrophoneStream: Send + Sync {
    /// Name of the input device backing this stream.
    fn device_name(&self) -> String;

    fn is_active(&self) -> bool;

    /// Stop the input and give up the grant.
    fn stop(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Running,
    Suspended,
    Closed,
}

/// Audio-graph execution context that processing nodes run inside.
pub trait AudioContext: Send + Sync {
    /// The rate the context actually runs at, which may differ from the
    /// rate that was requested.
    fn sample_rate(&self) -> u32;

    fn state(&self) -> ContextState;

    fn resume(&self) -> Result<(), CaptureError>;

    fn close(&self);

    /// Whether the platform can run a `NodeKind::Dedicated` node.
    fn supports_dedicated_node(&self) -> bool;

    /// Connect `stream` to a new processing node of the given kind.
    ///
    /// Every block the node produces is passed to `callback`, in order.
    fn attach_node(
        &self,
        stream: &dyn MicrophoneStream,
        kind: NodeKind,
        callback: AudioBlockCallback,
    ) -> Result<Box<dyn ProcessingNode>, CaptureError>;
}

/// A processing node attached to an `AudioContext`.
pub trait ProcessingNode: Send {
    fn kind(&self) -> NodeKind;

    /// Disconnect from the graph. Once this returns no further block is
    /// delivered and the node's callback has been dropped.
    fn detach(&mut self);
}

/// Platform entry point: microphone grants and context creation.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Ask for microphone access. May show a platform permission prompt.
    async fn request_microphone(
        &self,
        constraints: &MicrophoneConstraints,
    ) -> Result<Arc<dyn MicrophoneStream>, CaptureError>;

    /// Create a processing context.
    ///
    /// Synchronous on purpose: some platforms only unlock audio for contexts
    /// created inside the user's initiating action, before any suspension.
    fn create_context(&self, requested_sample_rate: u32) -> Result<Arc<dyn AudioContext>, CaptureError>;
}

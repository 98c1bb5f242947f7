//! Block accumulation shared by both processing paths.
//!
//! A capture window collects blocks into [`PendingFrames`] through a
//! [`BlockSink`]. The dedicated path posts copies across a message port and
//! a drain task appends them on the engine side; the block-callback path
//! appends directly under a lock. Either way blocks land in arrival order.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::models::error::CaptureError;

/// Ordered, append-only list of sample blocks for one capture window.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PendingFrames {
    blocks: Vec<Vec<f32>>,
    samples: usize,
}

impl PendingFrames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, block: Vec<f32>) {
        self.samples += block.len();
        self.blocks.push(block);
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn sample_count(&self) -> usize {
        self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }

    /// Concatenate every block into one contiguous sample array.
    pub fn concat(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.samples);
        for block in &self.blocks {
            out.extend_from_slice(block);
        }
        out
    }
}

/// Realtime-side handle a processing node delivers blocks through.
#[derive(Clone)]
pub enum BlockSink {
    /// Copies are posted across a channel and appended by a drain task.
    Port(mpsc::UnboundedSender<Vec<f32>>),
    /// Blocks are appended in place, under the lock.
    Shared {
        frames: Arc<Mutex<PendingFrames>>,
        log_every: usize,
    },
}

impl BlockSink {
    pub fn deliver(&self, block: &[f32]) {
        if block.is_empty() {
            return;
        }
        match self {
            Self::Port(tx) => {
                // A closed port means the window already ended.
                let _ = tx.send(block.to_vec());
            }
            Self::Shared { frames, log_every } => {
                let mut frames = frames.lock();
                frames.append(block.to_vec());
                let count = frames.block_count();
                if *log_every > 0 && count % log_every == 0 {
                    log::debug!("Recorded {} blocks (block callback)", count);
                }
            }
        }
    }
}

/// Engine-side counterpart of a [`BlockSink`], turned into the final
/// [`PendingFrames`] when the window closes.
pub enum FrameCollector {
    Port {
        stop: oneshot::Sender<()>,
        drain: JoinHandle<PendingFrames>,
    },
    Shared(Arc<Mutex<PendingFrames>>),
}

impl FrameCollector {
    /// Open a message-port pair. Must be called inside a tokio runtime.
    pub fn port(log_every: usize) -> (BlockSink, Self) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<f32>>();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let drain = tokio::spawn(async move {
            let mut frames = PendingFrames::new();
            loop {
                tokio::select! {
                    biased;
                    block = rx.recv() => match block {
                        Some(block) => {
                            frames.append(block);
                            let count = frames.block_count();
                            if log_every > 0 && count % log_every == 0 {
                                log::debug!("Recorded {} blocks (dedicated)", count);
                            }
                        }
                        None => break,
                    },
                    _ = &mut stop_rx => {
                        rx.close();
                        while let Ok(block) = rx.try_recv() {
                            frames.append(block);
                        }
                        break;
                    }
                }
            }
            frames
        });

        (
            BlockSink::Port(tx),
            Self::Port {
                stop: stop_tx,
                drain,
            },
        )
    }

    /// Open a shared-buffer pair.
    pub fn shared(log_every: usize) -> (BlockSink, Self) {
        let frames = Arc::new(Mutex::new(PendingFrames::new()));
        (
            BlockSink::Shared {
                frames: Arc::clone(&frames),
                log_every,
            },
            Self::Shared(frames),
        )
    }

    /// Stop accepting blocks and return everything received, in order.
    ///
    /// Call only after the processing node is detached so no block is
    /// still in flight.
    pub async fn finish(self) -> Result<PendingFrames, CaptureError> {
        match self {
            Self::Port { stop, drain } => {
                let _ = stop.send(());
                drain
                    .await
                    .map_err(|e| CaptureError::Unknown(format!("frame drain task failed: {}", e)))
            }
            Self::Shared(frames) => Ok(std::mem::take(&mut *frames.lock())),
        }
    }
}

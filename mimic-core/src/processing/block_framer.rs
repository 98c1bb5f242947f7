/// Re-chunks a stream of arbitrarily sized device buffers into fixed-size
/// blocks.
///
/// Backs the block-callback processing path, which must hand the engine
/// blocks of exactly `block_size` samples regardless of how the device
/// sizes its own buffers. Samples are never reordered or dropped while
/// framing; a partial block still pending at detach time is discarded,
/// as a fixed-size block callback would never fire for it.
#[derive(Debug)]
pub struct BlockFramer {
    block: Vec<f32>,
    filled: usize,
}

impl BlockFramer {
    pub fn new(block_size: usize) -> Self {
        Self {
            block: vec![0.0; block_size.max(1)],
            filled: 0,
        }
    }

    /// Append samples, invoking `emit` once for every completed block.
    pub fn push<F: FnMut(&[f32])>(&mut self, samples: &[f32], mut emit: F) {
        let block_size = self.block.len();
        let mut rest = samples;
        while !rest.is_empty() {
            let take = (block_size - self.filled).min(rest.len());
            self.block[self.filled..self.filled + take].copy_from_slice(&rest[..take]);
            self.filled += take;
            rest = &rest[take..];

            if self.filled == block_size {
                emit(&self.block);
                self.filled = 0;
            }
        }
    }

    /// Samples waiting for their block to fill.
    pub fn pending(&self) -> usize {
        self.filled
    }
}

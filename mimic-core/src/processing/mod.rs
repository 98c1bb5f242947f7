pub mod block_framer;
pub mod frames;
pub mod wav_format;

use std::io::Cursor;
use std::sync::Arc;

use super::error::PlaybackError;
use crate::processing::wav_format::{self, WAV_HEADER_SIZE};

/// An immutable RIFF/WAVE byte sequence plus its format metadata.
///
/// Produced once per capture window (mono, 16-bit PCM) or received from the
/// backend as an opponent call. Cloning shares the underlying bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveformBlob {
    bytes: Arc<[u8]>,
    sample_rate: u32,
    channels: u16,
    frames: u64,
}

impl WaveformBlob {
    /// Encode mono float samples as 16-bit PCM at `sample_rate`.
    pub fn from_samples(samples: &[f32], sample_rate: u32) -> Self {
        let bytes = wav_format::encode_mono_pcm16(samples, sample_rate);
        Self {
            bytes: bytes.into(),
            sample_rate,
            channels: 1,
            frames: samples.len() as u64,
        }
    }

    /// Wrap received WAV bytes, reading the format from the header.
    pub fn from_wav_bytes(bytes: Vec<u8>) -> Result<Self, PlaybackError> {
        let (spec, frames) = {
            let reader = hound::WavReader::new(Cursor::new(bytes.as_slice()))
                .map_err(|e| PlaybackError::Decode(e.to_string()))?;
            (reader.spec(), reader.duration() as u64)
        };
        Ok(Self {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            frames,
            bytes: bytes.into(),
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Frames (samples per channel) carried by the waveform.
    pub fn sample_count(&self) -> u64 {
        self.frames
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames as f64 / self.sample_rate as f64
    }

    /// The `data` chunk size as declared in a canonical 44-byte header.
    pub fn declared_data_size(&self) -> Option<u32> {
        if self.bytes.len() < WAV_HEADER_SIZE || &self.bytes[36..40] != b"data" {
            return None;
        }
        Some(u32::from_le_bytes([
            self.bytes[40],
            self.bytes[41],
            self.bytes[42],
            self.bytes[43],
        ]))
    }

    /// Decode to interleaved f32 samples for playback.
    pub fn decode(&self) -> Result<DecodedClip, PlaybackError> {
        let mut reader = hound::WavReader::new(Cursor::new(&self.bytes[..]))
            .map_err(|e| PlaybackError::Decode(e.to_string()))?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(|e| PlaybackError::Decode(e.to_string()))?,
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()
                    .map_err(|e| PlaybackError::Decode(e.to_string()))?
            }
        };

        Ok(DecodedClip {
            samples,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
        })
    }
}

/// PCM ready for an output sink: interleaved f32 in [-1, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedClip {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

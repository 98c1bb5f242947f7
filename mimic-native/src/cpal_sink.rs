//! cpal playback sink.
//!
//! Each `play` runs on its own thread holding the output stream. The clip is
//! decoded and fully queued before the stream starts, so the first audible
//! samples are never clipped.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, StreamConfig};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use mimic_core::models::error::PlaybackError;
use mimic_core::models::waveform::DecodedClip;
use mimic_core::processing::wav_format::downmix_to_mono;
use mimic_core::traits::audio_sink::{AudioSink, ClipHandle, PlaybackOutcome};

use crate::device_enumerator::DeviceEnumerator;

const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Extra time allowed past the clip's length before giving up on the device.
const OVERRUN_ALLOWANCE: Duration = Duration::from_secs(2);

pub struct CpalSink {
    output_device: Option<String>,
    clips: Mutex<HashMap<u64, DecodedClip>>,
    next_handle: AtomicU64,
    current: Mutex<Option<Arc<AtomicBool>>>,
}

impl CpalSink {
    /// `output_device` selects a device by name; `None` uses the default.
    pub fn new(output_device: Option<String>) -> Self {
        Self {
            output_device,
            clips: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            current: Mutex::new(None),
        }
    }
}

#[async_trait]
impl AudioSink for CpalSink {
    async fn load(&self, clip: DecodedClip) -> Result<ClipHandle, PlaybackError> {
        if clip.channels == 0 || clip.sample_rate == 0 {
            return Err(PlaybackError::Decode("clip has no channels or sample rate".into()));
        }
        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        log::debug!("Loaded clip {} ({:.2}s)", handle, clip.duration_secs());
        self.clips.lock().insert(handle, clip);
        Ok(ClipHandle(handle))
    }

    async fn play(&self, handle: ClipHandle) -> Result<PlaybackOutcome, PlaybackError> {
        let clip = self
            .clips
            .lock()
            .get(&handle.0)
            .cloned()
            .ok_or_else(|| PlaybackError::Stream(format!("clip {} is not loaded", handle.0)))?;

        let interrupted = Arc::new(AtomicBool::new(false));
        *self.current.lock() = Some(Arc::clone(&interrupted));

        let (done_tx, done_rx) = oneshot::channel();
        let device_name = self.output_device.clone();
        thread::Builder::new()
            .name("mimic-playback".into())
            .spawn(move || {
                let result = play_blocking(device_name.as_deref(), &clip, &interrupted);
                let _ = done_tx.send(result);
            })
            .map_err(|e| PlaybackError::Stream(format!("failed to spawn playback thread: {}", e)))?;

        let result = done_rx
            .await
            .unwrap_or_else(|_| Err(PlaybackError::Stream("playback thread exited early".into())));
        *self.current.lock() = None;
        result
    }

    fn interrupt(&self) {
        if let Some(flag) = self.current.lock().as_ref() {
            log::debug!("Interrupting playback");
            flag.store(true, Ordering::SeqCst);
        }
    }

    fn release(&self, handle: ClipHandle) {
        if self.clips.lock().remove(&handle.0).is_some() {
            log::debug!("Released clip {}", handle.0);
        }
    }
}

fn play_blocking(
    device_name: Option<&str>,
    clip: &DecodedClip,
    interrupted: &AtomicBool,
) -> Result<PlaybackOutcome, PlaybackError> {
    let device = DeviceEnumerator::new()
        .output_device(device_name)
        .ok_or_else(|| PlaybackError::Device("no output device available".into()))?;
    let supported = device
        .default_output_config()
        .map_err(|e| PlaybackError::Device(e.to_string()))?;
    let config: StreamConfig = supported.config();

    let samples = adapt_clip(clip, config.sample_rate.0, config.channels);
    let queue = Arc::new(Mutex::new(VecDeque::from(samples)));
    let drained = Arc::new(AtomicBool::new(false));
    let failure: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

    let stream = match supported.sample_format() {
        SampleFormat::F32 => build_output::<f32>(&device, &config, &queue, &drained, &failure),
        SampleFormat::I16 => build_output::<i16>(&device, &config, &queue, &drained, &failure),
        SampleFormat::U16 => build_output::<u16>(&device, &config, &queue, &drained, &failure),
        other => Err(PlaybackError::Device(format!("unsupported sample format {:?}", other))),
    }?;
    stream.play().map_err(|e| PlaybackError::Stream(e.to_string()))?;

    let deadline = Instant::now() + Duration::from_secs_f64(clip.duration_secs()) + OVERRUN_ALLOWANCE;
    let outcome = loop {
        if interrupted.load(Ordering::SeqCst) {
            break Ok(PlaybackOutcome::Interrupted);
        }
        if let Some(err) = failure.lock().take() {
            break Err(PlaybackError::Stream(err));
        }
        if drained.load(Ordering::SeqCst) {
            break Ok(PlaybackOutcome::Completed);
        }
        if Instant::now() >= deadline {
            log::warn!("Output device stalled, ending playback");
            break Ok(PlaybackOutcome::Completed);
        }
        thread::sleep(POLL_INTERVAL);
    };

    let _ = stream.pause();
    drop(stream);
    outcome
}

fn build_output<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    queue: &Arc<Mutex<VecDeque<f32>>>,
    drained: &Arc<AtomicBool>,
    failure: &Arc<Mutex<Option<String>>>,
) -> Result<cpal::Stream, PlaybackError>
where
    T: SizedSample + FromSample<f32>,
{
    let queue = Arc::clone(queue);
    let drained = Arc::clone(drained);
    let failure = Arc::clone(failure);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if fill_output(&mut queue.lock(), data) {
                    drained.store(true, Ordering::SeqCst);
                }
            },
            move |err| {
                log::error!("Playback stream error: {}", err);
                *failure.lock() = Some(err.to_string());
            },
            None,
        )
        .map_err(|e| PlaybackError::Device(e.to_string()))
}

/// Copy queued samples into a device buffer, padding with silence.
///
/// Returns true only when the queue was already empty on entry. The buffer
/// that carried the last samples has then been handed back by the device,
/// so stopping the stream no longer cuts off the tail.
fn fill_output<T>(queue: &mut VecDeque<f32>, data: &mut [T]) -> bool
where
    T: SizedSample + FromSample<f32>,
{
    let finished = queue.is_empty();
    for sample in data.iter_mut() {
        *sample = T::from_sample(queue.pop_front().unwrap_or(0.0));
    }
    finished
}

/// Convert a decoded clip to the device's rate and channel layout.
///
/// Downmixes to mono, resamples linearly, then copies the mono signal to
/// every output channel.
pub fn adapt_clip(clip: &DecodedClip, target_rate: u32, target_channels: u16) -> Vec<f32> {
    let mono = downmix_to_mono(&clip.samples, clip.channels as usize);
    let resampled = resample_linear(&mono, clip.sample_rate, target_rate);
    let channels = target_channels.max(1) as usize;
    let mut out = Vec::with_capacity(resampled.len() * channels);
    for sample in resampled {
        out.extend(std::iter::repeat(sample).take(channels));
    }
    out
}

fn resample_linear(samples: &[f32], from: u32, to: u32) -> Vec<f32> {
    if from == to || samples.is_empty() || from == 0 || to == 0 {
        return samples.to_vec();
    }
    let ratio = from as f64 / to as f64;
    let out_len = ((samples.len() as f64) / ratio).round() as usize;
    let last = samples.len() - 1;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = (pos.floor() as usize).min(last);
            let next = (idx + 1).min(last);
            let frac = (pos - idx as f64) as f32;
            samples[idx] + (samples[next] - samples[idx]) * frac
        })
        .collect()
}

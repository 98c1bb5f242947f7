//! cpal capture backend.
//!
//! A processing node owns a cpal input stream on its own thread, since
//! streams are not `Send` on every host. The dedicated node forwards each
//! device buffer as it arrives; the block-callback node reframes the input
//! into fixed-size blocks first.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, StreamConfig, SupportedBufferSize};
use parking_lot::Mutex;

use mimic_core::models::error::CaptureError;
use mimic_core::processing::block_framer::BlockFramer;
use mimic_core::processing::wav_format::downmix_to_mono;
use mimic_core::traits::audio_backend::{
    AudioBackend, AudioBlockCallback, AudioContext, ContextState, MicrophoneConstraints,
    MicrophoneStream, NodeKind, ProcessingNode,
};

use crate::device_enumerator::DeviceEnumerator;
use crate::permissions::{map_build_error, map_config_error};

const STARTUP_TIMEOUT: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Microphone and capture contexts on the default cpal host.
pub struct CpalBackend {
    input_device: Option<String>,
    block_size: usize,
}

impl CpalBackend {
    /// `input_device` selects a device by name; `None` uses the default.
    pub fn new(input_device: Option<String>, block_size: usize) -> Self {
        Self {
            input_device,
            block_size,
        }
    }
}

#[async_trait]
impl AudioBackend for CpalBackend {
    async fn request_microphone(
        &self,
        constraints: &MicrophoneConstraints,
    ) -> Result<Arc<dyn MicrophoneStream>, CaptureError> {
        if constraints.echo_cancellation || constraints.noise_suppression {
            log::debug!("Host does not expose echo cancellation or noise suppression; capturing raw input");
        }
        let wanted = self.input_device.clone();

        // Opening a probe stream is what surfaces a denied grant.
        let name = tokio::task::spawn_blocking(move || probe_input(wanted.as_deref()))
            .await
            .map_err(|e| CaptureError::Unknown(format!("microphone probe panicked: {}", e)))??;

        Ok(Arc::new(CpalMicrophone {
            device_name: name,
            active: AtomicBool::new(true),
        }))
    }

    fn create_context(&self, requested_sample_rate: u32) -> Result<Arc<dyn AudioContext>, CaptureError> {
        let device = DeviceEnumerator::new().input_device(self.input_device.as_deref())?;
        let (config, format, dedicated) = resolve_input_config(&device, requested_sample_rate)?;
        log::info!(
            "Capture context: {} Hz, {} channel(s), {:?}, dedicated node {}",
            config.sample_rate.0,
            config.channels,
            format,
            if dedicated { "available" } else { "unavailable" }
        );
        Ok(Arc::new(CpalContext {
            config,
            format,
            dedicated,
            block_size: self.block_size,
            state: Mutex::new(ContextState::Running),
        }))
    }
}

fn probe_input(name: Option<&str>) -> Result<String, CaptureError> {
    let device = DeviceEnumerator::new().input_device(name)?;
    let device_name = device.name().unwrap_or_else(|_| "Default Microphone".into());
    let config = device.default_input_config().map_err(map_config_error)?;
    let stream = device
        .build_input_stream(
            &config.config(),
            |_data: &[f32], _: &cpal::InputCallbackInfo| {},
            |err| log::warn!("Probe stream error: {}", err),
            None,
        )
        .or_else(|_| {
            device.build_input_stream(
                &config.config(),
                |_data: &[i16], _: &cpal::InputCallbackInfo| {},
                |err| log::warn!("Probe stream error: {}", err),
                None,
            )
        })
        .map_err(map_build_error)?;
    drop(stream);
    Ok(device_name)
}

/// Pick the supported input config closest to `requested` and report
/// whether the device accepts a caller-chosen buffer size.
fn resolve_input_config(
    device: &cpal::Device,
    requested: u32,
) -> Result<(StreamConfig, SampleFormat, bool), CaptureError> {
    let supported = device
        .supported_input_configs()
        .map_err(|e| CaptureError::ConfigurationFailed(format!("supported configs unavailable: {}", e)))?;

    let mut best: Option<(u32, cpal::SupportedStreamConfig)> = None;
    for range in supported {
        let rate = clamp_rate(requested, range.min_sample_rate().0, range.max_sample_rate().0);
        let diff = rate.abs_diff(requested);
        if best.as_ref().map(|(d, _)| diff < *d).unwrap_or(true) {
            best = Some((diff, range.with_sample_rate(cpal::SampleRate(rate))));
        }
    }

    let chosen = match best {
        Some((_, config)) => config,
        None => device.default_input_config().map_err(map_config_error)?,
    };
    let dedicated = matches!(chosen.buffer_size(), SupportedBufferSize::Range { .. });
    Ok((chosen.config(), chosen.sample_format(), dedicated))
}

fn clamp_rate(requested: u32, min: u32, max: u32) -> u32 {
    requested.clamp(min, max.max(min))
}

pub struct CpalMicrophone {
    device_name: String,
    active: AtomicBool,
}

impl MicrophoneStream for CpalMicrophone {
    fn device_name(&self) -> String {
        self.device_name.clone()
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            log::debug!("Released microphone {}", self.device_name);
        }
    }
}

pub struct CpalContext {
    config: StreamConfig,
    format: SampleFormat,
    dedicated: bool,
    block_size: usize,
    state: Mutex<ContextState>,
}

impl AudioContext for CpalContext {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn state(&self) -> ContextState {
        *self.state.lock()
    }

    fn resume(&self) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        if *state == ContextState::Closed {
            return Err(CaptureError::ContextUnavailable("context is closed".into()));
        }
        *state = ContextState::Running;
        Ok(())
    }

    fn close(&self) {
        *self.state.lock() = ContextState::Closed;
    }

    fn supports_dedicated_node(&self) -> bool {
        self.dedicated
    }

    fn attach_node(
        &self,
        stream: &dyn MicrophoneStream,
        kind: NodeKind,
        callback: AudioBlockCallback,
    ) -> Result<Box<dyn ProcessingNode>, CaptureError> {
        if self.state() == ContextState::Closed {
            return Err(CaptureError::ContextUnavailable("context is closed".into()));
        }
        if !stream.is_active() {
            return Err(CaptureError::DeviceNotAvailable);
        }

        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), CaptureError>>();
        let spec = NodeSpec {
            device_name: stream.device_name(),
            config: self.config.clone(),
            format: self.format,
            kind,
            block_size: self.block_size,
        };

        let thread_running = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name(format!("mimic-{}-node", kind.as_str()))
            .spawn(move || node_loop(spec, thread_running, callback, ready_tx))
            .map_err(|e| CaptureError::Unknown(format!("failed to spawn node thread: {}", e)))?;

        let started = off_runtime(|| {
            ready_rx
                .recv_timeout(STARTUP_TIMEOUT)
                .unwrap_or_else(|_| Err(CaptureError::NodeAttachFailed("node thread did not start".into())))
        });

        let mut node = CpalNode {
            kind,
            running,
            handle: Some(handle),
        };
        match started {
            Ok(()) => Ok(Box::new(node)),
            Err(e) => {
                node.detach();
                Err(e)
            }
        }
    }
}

struct NodeSpec {
    device_name: String,
    config: StreamConfig,
    format: SampleFormat,
    kind: NodeKind,
    block_size: usize,
}

/// Runs on the node thread: builds the stream, reports startup, then holds
/// the stream until detached.
fn node_loop(
    spec: NodeSpec,
    running: Arc<AtomicBool>,
    callback: AudioBlockCallback,
    ready: mpsc::Sender<Result<(), CaptureError>>,
) {
    let stream = match build_node_stream(&spec, callback) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    if let Err(e) = stream.play() {
        let _ = ready.send(Err(CaptureError::NodeAttachFailed(format!("stream start failed: {}", e))));
        return;
    }
    let _ = ready.send(Ok(()));

    while running.load(Ordering::SeqCst) {
        thread::sleep(POLL_INTERVAL);
    }
    let _ = stream.pause();
    drop(stream);
    log::debug!("{} node stopped", spec.kind.as_str());
}

fn build_node_stream(spec: &NodeSpec, callback: AudioBlockCallback) -> Result<cpal::Stream, CaptureError> {
    let devices = DeviceEnumerator::new();
    let device = devices
        .input_device(Some(spec.device_name.as_str()))
        .or_else(|_| devices.input_device(None))?;
    match spec.format {
        SampleFormat::F32 => build_typed::<f32>(&device, spec, callback),
        SampleFormat::I16 => build_typed::<i16>(&device, spec, callback),
        SampleFormat::U16 => build_typed::<u16>(&device, spec, callback),
        SampleFormat::I32 => build_typed::<i32>(&device, spec, callback),
        other => Err(CaptureError::ConfigurationFailed(format!(
            "unsupported sample format {:?}",
            other
        ))),
    }
}

fn build_typed<T>(
    device: &cpal::Device,
    spec: &NodeSpec,
    callback: AudioBlockCallback,
) -> Result<cpal::Stream, CaptureError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = spec.config.channels as usize;
    let mut framer = match spec.kind {
        NodeKind::Dedicated => None,
        NodeKind::BlockCallback => Some(BlockFramer::new(spec.block_size)),
    };
    let mut scratch: Vec<f32> = Vec::new();

    let data_callback = move |data: &[T], _: &cpal::InputCallbackInfo| {
        scratch.clear();
        scratch.extend(data.iter().map(|s| s.to_sample::<f32>()));
        let mono = downmix_to_mono(&scratch, channels);
        match framer.as_mut() {
            Some(framer) => framer.push(&mono, |block| callback(block)),
            None => callback(&mono),
        }
    };

    device
        .build_input_stream(
            &spec.config,
            data_callback,
            |err| log::error!("Capture stream error: {}", err),
            None,
        )
        .map_err(map_build_error)
}

/// Run a blocking wait without stalling other tasks on a tokio worker.
///
/// On a multi-threaded runtime the worker hands its tasks off first; on a
/// current-thread runtime or outside tokio the closure just runs.
fn off_runtime<R>(f: impl FnOnce() -> R) -> R {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

/// Handle to a node thread. Detaching stops the stream and joins the
/// thread, which drops the block callback.
struct CpalNode {
    kind: NodeKind,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ProcessingNode for CpalNode {
    fn kind(&self) -> NodeKind {
        self.kind
    }

    fn detach(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = off_runtime(|| handle.join());
        }
    }
}

impl Drop for CpalNode {
    fn drop(&mut self) {
        self.detach();
    }
}

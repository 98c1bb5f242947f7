//! In-memory fakes for the platform and backend boundaries.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::battle::state::MatchSnapshot;
use crate::models::error::{BattleError, CaptureError, PlaybackError, SessionError};
use crate::models::outcome::MatchOutcome;
use crate::models::phase::Phase;
use crate::models::verdict::{StartResponse, Verdict};
use crate::models::waveform::{DecodedClip, WaveformBlob};
use crate::traits::audio_backend::{
    AudioBackend, AudioBlockCallback, AudioContext, ContextState, MicrophoneConstraints,
    MicrophoneStream, NodeKind, ProcessingNode,
};
use crate::traits::audio_sink::{AudioSink, ClipHandle, PlaybackOutcome};
use crate::traits::battle_observer::BattleObserver;
use crate::traits::game_client::GameSessionClient;

/// Ordered log shared between fakes, for cross-component ordering checks.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: &str) {
        self.0.lock().push(entry.to_string());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

pub struct FakeStream {
    name: String,
    active: AtomicBool,
    stops: AtomicUsize,
}

impl FakeStream {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            active: AtomicBool::new(true),
            stops: AtomicUsize::new(0),
        }
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl MicrophoneStream for FakeStream {
    fn device_name(&self) -> String {
        self.name.clone()
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Behavior of a [`FakeContext`]: its rate, the blocks every attached node
/// delivers, and which operations fail.
#[derive(Clone, Default)]
pub struct FakeContextSpec {
    sample_rate: u32,
    blocks: Vec<Vec<f32>>,
    no_dedicated: bool,
    fail_dedicated: bool,
    fail_block_callback: bool,
    suspended: bool,
    journal: Option<Journal>,
}

impl FakeContextSpec {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    pub fn with_blocks(mut self, count: usize, size: usize, value: f32) -> Self {
        self.blocks = vec![vec![value; size]; count];
        self
    }

    /// Blocks whose values rise from one block to the next.
    pub fn with_ramp_blocks(mut self, count: usize, size: usize) -> Self {
        self.blocks = (0..count)
            .map(|i| vec![(i as f32 + 1.0) / (count as f32 + 1.0); size])
            .collect();
        self
    }

    pub fn without_dedicated(mut self) -> Self {
        self.no_dedicated = true;
        self
    }

    pub fn failing_dedicated(mut self) -> Self {
        self.fail_dedicated = true;
        self
    }

    pub fn failing_block_callback(mut self) -> Self {
        self.fail_block_callback = true;
        self
    }

    pub fn suspended(mut self) -> Self {
        self.suspended = true;
        self
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }
}

pub struct FakeContext {
    spec: FakeContextSpec,
    state: Mutex<ContextState>,
    closes: AtomicUsize,
    resumes: AtomicUsize,
    detaches: Arc<AtomicUsize>,
    attached: Mutex<Vec<NodeKind>>,
}

impl FakeContext {
    pub fn new(spec: FakeContextSpec) -> Self {
        let state = if spec.suspended {
            ContextState::Suspended
        } else {
            ContextState::Running
        };
        Self {
            spec,
            state: Mutex::new(state),
            closes: AtomicUsize::new(0),
            resumes: AtomicUsize::new(0),
            detaches: Arc::new(AtomicUsize::new(0)),
            attached: Mutex::new(Vec::new()),
        }
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn resume_count(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }

    pub fn detach_count(&self) -> usize {
        self.detaches.load(Ordering::SeqCst)
    }

    /// Every node kind an attach was attempted with, in order.
    pub fn attached_kinds(&self) -> Vec<NodeKind> {
        self.attached.lock().clone()
    }
}

impl AudioContext for FakeContext {
    fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    fn state(&self) -> ContextState {
        *self.state.lock()
    }

    fn resume(&self) -> Result<(), CaptureError> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        *self.state.lock() = ContextState::Running;
        Ok(())
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        *self.state.lock() = ContextState::Closed;
    }

    fn supports_dedicated_node(&self) -> bool {
        !self.spec.no_dedicated
    }

    fn attach_node(
        &self,
        _stream: &dyn MicrophoneStream,
        kind: NodeKind,
        callback: AudioBlockCallback,
    ) -> Result<Box<dyn ProcessingNode>, CaptureError> {
        self.attached.lock().push(kind);
        let fails = match kind {
            NodeKind::Dedicated => self.spec.fail_dedicated,
            NodeKind::BlockCallback => self.spec.fail_block_callback,
        };
        if fails {
            return Err(CaptureError::NodeAttachFailed(format!("{} node refused", kind.as_str())));
        }
        if let Some(ref journal) = self.spec.journal {
            journal.record("attach");
        }
        for block in &self.spec.blocks {
            callback(block);
        }
        Ok(Box::new(FakeNode {
            kind,
            callback: Some(callback),
            detaches: Arc::clone(&self.detaches),
            journal: self.spec.journal.clone(),
        }))
    }
}

struct FakeNode {
    kind: NodeKind,
    callback: Option<AudioBlockCallback>,
    detaches: Arc<AtomicUsize>,
    journal: Option<Journal>,
}

impl ProcessingNode for FakeNode {
    fn kind(&self) -> NodeKind {
        self.kind
    }

    fn detach(&mut self) {
        if self.callback.take().is_some() {
            self.detaches.fetch_add(1, Ordering::SeqCst);
            if let Some(ref journal) = self.journal {
                journal.record("detach");
            }
        }
    }
}

pub struct FakeBackend {
    spec: FakeContextSpec,
    deny: AtomicBool,
    fail_context: AtomicBool,
    requests: AtomicUsize,
    streams: Mutex<Vec<Arc<FakeStream>>>,
    contexts: Mutex<Vec<Arc<FakeContext>>>,
}

impl FakeBackend {
    /// Backend whose contexts all follow `spec`.
    pub fn new(spec: FakeContextSpec) -> Arc<Self> {
        Arc::new(Self {
            spec,
            deny: AtomicBool::new(false),
            fail_context: AtomicBool::new(false),
            requests: AtomicUsize::new(0),
            streams: Mutex::new(Vec::new()),
            contexts: Mutex::new(Vec::new()),
        })
    }

    pub fn denying_permission(self: Arc<Self>) -> Arc<Self> {
        self.deny.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_context(self: Arc<Self>) -> Arc<Self> {
        self.fail_context.store(true, Ordering::SeqCst);
        self
    }

    pub fn microphone_requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn contexts_created(&self) -> usize {
        self.contexts.lock().len()
    }

    pub fn last_stream(&self) -> Option<Arc<FakeStream>> {
        self.streams.lock().last().cloned()
    }

    pub fn last_context(&self) -> Option<Arc<FakeContext>> {
        self.contexts.lock().last().cloned()
    }
}

#[async_trait]
impl AudioBackend for FakeBackend {
    async fn request_microphone(
        &self,
        _constraints: &MicrophoneConstraints,
    ) -> Result<Arc<dyn MicrophoneStream>, CaptureError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.deny.load(Ordering::SeqCst) {
            return Err(CaptureError::PermissionDenied);
        }
        let stream = Arc::new(FakeStream::new("fake-mic"));
        self.streams.lock().push(Arc::clone(&stream));
        Ok(stream)
    }

    fn create_context(&self, _requested_sample_rate: u32) -> Result<Arc<dyn AudioContext>, CaptureError> {
        if self.fail_context.load(Ordering::SeqCst) {
            return Err(CaptureError::ContextUnavailable("context creation refused".into()));
        }
        let context = Arc::new(FakeContext::new(self.spec.clone()));
        self.contexts.lock().push(Arc::clone(&context));
        Ok(context)
    }
}

/// Sink that records what it was asked to do instead of making sound.
pub struct RecordingSink {
    journal: Journal,
    interrupting: AtomicBool,
    failing: AtomicBool,
    clip_time: Mutex<Duration>,
    next_handle: AtomicU64,
    plays: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    released: Mutex<Vec<ClipHandle>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Self::with_journal(Journal::default())
    }

    pub fn with_journal(journal: Journal) -> Arc<Self> {
        Arc::new(Self {
            journal,
            interrupting: AtomicBool::new(false),
            failing: AtomicBool::new(false),
            clip_time: Mutex::new(Duration::ZERO),
            next_handle: AtomicU64::new(1),
            plays: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            released: Mutex::new(Vec::new()),
        })
    }

    pub fn interrupting(self: Arc<Self>) -> Arc<Self> {
        self.interrupting.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing(self: Arc<Self>) -> Arc<Self> {
        self.failing.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_clip_time(self: Arc<Self>, clip_time: Duration) -> Arc<Self> {
        *self.clip_time.lock() = clip_time;
        self
    }

    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> Vec<ClipHandle> {
        self.released.lock().clone()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.entries()
    }
}

#[async_trait]
impl AudioSink for RecordingSink {
    async fn load(&self, _clip: DecodedClip) -> Result<ClipHandle, PlaybackError> {
        self.journal.record("load");
        Ok(ClipHandle(self.next_handle.fetch_add(1, Ordering::SeqCst)))
    }

    async fn play(&self, _handle: ClipHandle) -> Result<PlaybackOutcome, PlaybackError> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        self.journal.record("play:start");
        if self.failing.load(Ordering::SeqCst) {
            return Err(PlaybackError::Stream("output stream died".into()));
        }

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        let clip_time = *self.clip_time.lock();
        if !clip_time.is_zero() {
            tokio::time::sleep(clip_time).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.journal.record("play:end");

        if self.interrupting.load(Ordering::SeqCst) {
            Ok(PlaybackOutcome::Interrupted)
        } else {
            Ok(PlaybackOutcome::Completed)
        }
    }

    fn interrupt(&self) {
        self.journal.record("interrupt");
    }

    fn release(&self, handle: ClipHandle) {
        self.released.lock().push(handle);
    }
}

/// Backend client that answers from a script of queued verdicts.
pub struct ScriptedClient {
    verdicts: Mutex<VecDeque<Result<Verdict, SessionError>>>,
    starts: AtomicUsize,
    submissions: AtomicUsize,
    fetched: Mutex<Vec<u32>>,
}

impl ScriptedClient {
    pub fn new(verdicts: Vec<Result<Verdict, SessionError>>) -> Arc<Self> {
        Arc::new(Self {
            verdicts: Mutex::new(verdicts.into()),
            starts: AtomicUsize::new(0),
            submissions: AtomicUsize::new(0),
            fetched: Mutex::new(Vec::new()),
        })
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn fetched_rounds(&self) -> Vec<u32> {
        self.fetched.lock().clone()
    }
}

#[async_trait]
impl GameSessionClient for ScriptedClient {
    async fn start(&self) -> Result<StartResponse, SessionError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(StartResponse {
            session_id: "session-1".into(),
            round: 1,
            tries_left: 3,
            max_rounds: Some(3),
            max_tries: Some(3),
            message: "A wild bird appeared".into(),
        })
    }

    async fn fetch_call(&self, _session_id: &str, round: u32) -> Result<WaveformBlob, SessionError> {
        self.fetched.lock().push(round);
        Ok(WaveformBlob::from_samples(&[0.3; 441], 44100))
    }

    async fn submit(&self, _session_id: &str, _waveform: &WaveformBlob) -> Result<Verdict, SessionError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        self.verdicts
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(SessionError::Decode("script exhausted".into())))
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    phases: Mutex<Vec<Phase>>,
    dialogue: Mutex<Vec<String>>,
    errors: Mutex<Vec<BattleError>>,
    finished: Mutex<Vec<MatchOutcome>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn phases(&self) -> Vec<Phase> {
        self.phases.lock().clone()
    }

    pub fn dialogue(&self) -> Vec<String> {
        self.dialogue.lock().clone()
    }

    pub fn errors(&self) -> Vec<BattleError> {
        self.errors.lock().clone()
    }

    pub fn finished(&self) -> Vec<MatchOutcome> {
        self.finished.lock().clone()
    }
}

impl BattleObserver for RecordingObserver {
    fn on_state_changed(&self, snapshot: &MatchSnapshot) {
        self.phases.lock().push(snapshot.phase);
    }

    fn on_dialogue(&self, line: &str) {
        self.dialogue.lock().push(line.to_string());
    }

    fn on_error(&self, error: &BattleError) {
        self.errors.lock().push(error.clone());
    }

    fn on_match_finished(&self, outcome: &MatchOutcome) {
        self.finished.lock().push(outcome.clone());
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::battle::state::{BattleEvent, MatchSnapshot, MatchState};
use crate::capture::engine::CaptureEngine;
use crate::models::config::BattleConfig;
use crate::models::error::{BattleError, CaptureError, SessionError};
use crate::models::outcome::MatchOutcome;
use crate::models::phase::Phase;
use crate::models::verdict::{MatchResult, Verdict};
use crate::playback::service::PlaybackService;
use crate::traits::audio_backend::{AudioContext, MicrophoneStream};
use crate::traits::battle_observer::BattleObserver;
use crate::traits::game_client::GameSessionClient;

/// Audio resources shared by every round of one match.
///
/// The context must exist before the match's first suspension point, so it
/// is built here, synchronously, from inside the user's initiating action.
pub struct MatchResources {
    context: Arc<dyn AudioContext>,
    stream: Option<Arc<dyn MicrophoneStream>>,
    owns_context: bool,
    owns_stream: bool,
}

impl MatchResources {
    /// Create the match's audio context now.
    pub fn prepare(engine: &CaptureEngine) -> Result<Self, CaptureError> {
        let context = engine.create_context()?;
        log::info!("Audio context ready at {} Hz", context.sample_rate());
        Ok(Self {
            context,
            stream: None,
            owns_context: true,
            owns_stream: false,
        })
    }

    /// Use a context (and optionally a stream) owned by the caller. Neither
    /// is stopped or closed when the match ends.
    pub fn borrowed(context: Arc<dyn AudioContext>, stream: Option<Arc<dyn MicrophoneStream>>) -> Self {
        Self {
            context,
            stream,
            owns_context: false,
            owns_stream: false,
        }
    }

    fn release(&mut self) {
        if self.owns_stream {
            if let Some(stream) = self.stream.take() {
                log::debug!("Stopping match microphone stream");
                stream.stop();
            }
            self.owns_stream = false;
        }
        if self.owns_context {
            log::debug!("Closing match audio context");
            self.context.close();
            self.owns_context = false;
        }
    }
}

impl Drop for MatchResources {
    fn drop(&mut self) {
        self.release();
    }
}

/// Drives one match: intro, then rounds of call playback, countdown,
/// capture and judging, until the player wins, loses, or a collaborator
/// fails.
///
/// All authoritative match state lives in this struct; presentation reads
/// it through [`BattleOrchestrator::snapshot`] or a [`BattleObserver`].
pub struct BattleOrchestrator {
    client: Arc<dyn GameSessionClient>,
    engine: CaptureEngine,
    playback: PlaybackService,
    config: BattleConfig,
    resources: Mutex<Option<MatchResources>>,
    state: Mutex<MatchState>,
    observer: Option<Arc<dyn BattleObserver>>,
    started: AtomicBool,
}

impl BattleOrchestrator {
    pub fn new(
        client: Arc<dyn GameSessionClient>,
        engine: CaptureEngine,
        playback: PlaybackService,
        resources: MatchResources,
        config: BattleConfig,
    ) -> Result<Self, BattleError> {
        config.validate().map_err(BattleError::Configuration)?;
        Ok(Self {
            client,
            engine,
            playback,
            state: Mutex::new(MatchState::new(&config)),
            config,
            resources: Mutex::new(Some(resources)),
            observer: None,
            started: AtomicBool::new(false),
        })
    }

    pub fn set_observer(&mut self, observer: Arc<dyn BattleObserver>) {
        self.observer = Some(observer);
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        self.state.lock().snapshot()
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase()
    }

    /// Run the match to its end. Runs at most once per orchestrator.
    pub async fn run(&self) -> Result<MatchOutcome, BattleError> {
        if self.started.swap(true, Ordering::SeqCst) {
            log::warn!("Ignoring duplicate match start");
            return Err(BattleError::AlreadyStarted);
        }
        let mut resources = self.resources.lock().take().ok_or(BattleError::AlreadyStarted)?;

        let result = self.run_match(&mut resources).await;
        resources.release();

        match result {
            Ok(outcome) => {
                log::info!(
                    "Match finished: {:?}, score {}, rounds cleared {}",
                    outcome.result,
                    outcome.score,
                    outcome.rounds_cleared
                );
                if let Some(ref observer) = self.observer {
                    observer.on_match_finished(&outcome);
                }
                Ok(outcome)
            }
            Err(error) => {
                log::error!("Battle error: {}", error);
                self.halt(&error);
                Err(error)
            }
        }
    }

    async fn run_match(&self, resources: &mut MatchResources) -> Result<MatchOutcome, BattleError> {
        let stream = match resources.stream.clone() {
            Some(stream) => stream,
            None => {
                let stream = self.engine.acquire_microphone().await?;
                resources.stream = Some(Arc::clone(&stream));
                resources.owns_stream = true;
                stream
            }
        };
        let context = Arc::clone(&resources.context);

        let start = self.client.start().await?;
        log::info!("Session {} started: {}", start.session_id, start.message);
        let session_id = start.session_id.clone();
        self.state.lock().bind_session(&start);
        self.notify();

        self.play_intro().await;
        self.advance(BattleEvent::IntroComplete)?;

        loop {
            let round = self.state.lock().round();

            // Opponent's call
            self.say(&format!("{} used SCREECH!", self.config.opponent_name));
            let call = self.client.fetch_call(&session_id, round).await?;
            self.playback.play(&call).await?;
            self.pause(self.config.post_call_pause).await;
            self.advance(BattleEvent::PlaybackComplete)?;

            // Player's attempt
            self.countdown().await;
            let attempt = self
                .engine
                .open(self.config.capture_window, Some(Arc::clone(&stream)), Some(Arc::clone(&context)))
                .await?;
            self.advance(BattleEvent::WindowClosed)?;

            // Judging
            self.say("...");
            let verdict = self.client.submit(&session_id, &attempt).await?;
            self.check_agreement(&verdict);
            let passed = verdict.passed;
            if let Some(reason) = verdict.failure_reason.as_deref().filter(|_| !passed) {
                self.say(reason);
                self.pause(self.config.failure_feedback).await;
            }
            self.advance(BattleEvent::VerdictReceived(verdict))?;

            // Round result
            if passed {
                self.say(&format!("Round {} cleared!", round));
                self.pause(self.config.result_pause).await;
            } else if self.state.lock().tries_left() > 0 {
                self.say("Try again!");
                self.pause(self.config.result_pause).await;
            }

            match self.advance(BattleEvent::ResultShown)? {
                Phase::Win => {
                    self.say(&format!("{} fainted!", self.config.opponent_name));
                    self.say("YOU won the battle!");
                    break;
                }
                Phase::Lose => {
                    self.pause(self.config.lose_pause).await;
                    self.say(&format!("{} is victorious!", self.config.opponent_name));
                    self.say("YOU blacked out!");
                    break;
                }
                _ => continue,
            }
        }

        self.state
            .lock()
            .outcome()
            .ok_or(BattleError::Session(SessionError::MissingSession))
    }

    async fn play_intro(&self) {
        self.say(&format!("Wild {} appeared!", self.config.opponent_name));
        self.pause(self.config.intro_appear).await;
        self.say(&format!("GO! {}!", self.config.player_name));
        self.pause(self.config.intro_enter).await;
        self.pause(self.config.intro_settle).await;
    }

    async fn countdown(&self) {
        self.say("YOUR TURN!");
        self.pause(self.config.countdown_lead).await;
        for n in (1..=self.config.countdown_from).rev() {
            self.say(&format!("{}...", n));
            self.pause(self.config.countdown_tick).await;
        }
        self.say("GO!");
    }

    /// Log where the backend's view of the match differs from ours. Local
    /// state stays authoritative either way.
    fn check_agreement(&self, verdict: &Verdict) {
        let state = self.state.lock();
        let (expected_round, expected_tries) = if verdict.passed {
            (state.round() + 1, state.tries_left())
        } else {
            (state.round(), state.tries_left().saturating_sub(1))
        };
        let expected_over = expected_round > self.config.max_rounds || expected_tries == 0;

        if verdict.game_over != expected_over {
            log::warn!(
                "Backend game_over={} disagrees with local state (expected {})",
                verdict.game_over,
                expected_over
            );
        }
        if let Some(result) = verdict.result {
            let expected = if expected_round > self.config.max_rounds {
                Some(MatchResult::Win)
            } else if expected_tries == 0 {
                Some(MatchResult::Lose)
            } else {
                None
            };
            if expected != Some(result) {
                log::warn!("Backend result {:?} disagrees with local state", result);
            }
        }
        if let Some(next) = verdict.next_round {
            if next != expected_round {
                log::warn!("Backend next_round={} but local round will be {}", next, expected_round);
            }
        }
        if let Some(tries) = verdict.tries_left {
            if tries != expected_tries {
                log::warn!("Backend tries_left={} but local tries will be {}", tries, expected_tries);
            }
        }
        if let Some(ref message) = verdict.message {
            log::debug!("Backend says: {}", message);
        }
    }

    fn advance(&self, event: BattleEvent) -> Result<Phase, BattleError> {
        let phase = self.state.lock().apply(event)?;
        log::debug!("Phase -> {}", phase);
        self.notify();
        Ok(phase)
    }

    fn halt(&self, error: &BattleError) {
        let applied = self
            .state
            .lock()
            .apply(BattleEvent::Fault(error.user_message()))
            .is_ok();
        if applied {
            self.notify();
        }
        if let Some(ref observer) = self.observer {
            observer.on_error(error);
            observer.on_dialogue("Error occurred during battle");
        }
    }

    fn notify(&self) {
        let snapshot = self.snapshot();
        if let Some(ref observer) = self.observer {
            observer.on_state_changed(&snapshot);
        }
    }

    fn say(&self, line: &str) {
        log::debug!("[dialogue] {}", line);
        if let Some(ref observer) = self.observer {
            observer.on_dialogue(line);
        }
    }

    async fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::{CaptureConfig, PlaybackConfig};
    use crate::testing::{
        FakeBackend, FakeContextSpec, Journal, RecordingObserver, RecordingSink, ScriptedClient,
    };

    struct Harness {
        backend: Arc<FakeBackend>,
        client: Arc<ScriptedClient>,
        sink: Arc<RecordingSink>,
        observer: Arc<RecordingObserver>,
        orchestrator: BattleOrchestrator,
    }

    fn harness(verdicts: Vec<Result<Verdict, SessionError>>, config: BattleConfig) -> Harness {
        harness_with(verdicts, config, RecordingSink::new(), FakeBackend::new(FakeContextSpec::new(44100).with_blocks(10, 4096, 0.0)))
    }

    fn harness_with(
        verdicts: Vec<Result<Verdict, SessionError>>,
        config: BattleConfig,
        sink: Arc<RecordingSink>,
        backend: Arc<FakeBackend>,
    ) -> Harness {
        let client = ScriptedClient::new(verdicts);
        let observer = RecordingObserver::new();
        let engine = CaptureEngine::new(backend.clone(), CaptureConfig::default()).unwrap();
        let resources = MatchResources::prepare(&engine).unwrap();
        let playback = PlaybackService::new(sink.clone(), PlaybackConfig::default());
        let mut orchestrator =
            BattleOrchestrator::new(client.clone(), engine, playback, resources, config).unwrap();
        orchestrator.set_observer(observer.clone());
        Harness {
            backend,
            client,
            sink,
            observer,
            orchestrator,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn three_passes_win_the_match() {
        let h = harness(
            vec![
                Ok(Verdict::pass().with_total_score(100)),
                Ok(Verdict::pass().with_total_score(250)),
                Ok(Verdict::pass().with_total_score(400).with_score_token("tok")),
            ],
            BattleConfig::default(),
        );

        let outcome = h.orchestrator.run().await.unwrap();

        assert_eq!(outcome.result, MatchResult::Win);
        assert_eq!(outcome.score, 400);
        assert_eq!(outcome.score_token.as_deref(), Some("tok"));
        let snapshot = h.orchestrator.snapshot();
        assert_eq!(snapshot.phase, Phase::Win);
        assert_eq!(snapshot.opponent_health, 0);
        assert_eq!(h.client.fetched_rounds(), vec![1, 2, 3]);
        assert_eq!(h.client.submissions(), 3);
        assert_eq!(h.observer.finished().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn three_failures_lose_without_advancing() {
        let h = harness(
            vec![Ok(Verdict::fail()), Ok(Verdict::fail()), Ok(Verdict::fail())],
            BattleConfig::instant(),
        );

        let outcome = h.orchestrator.run().await.unwrap();

        assert_eq!(outcome.result, MatchResult::Lose);
        let snapshot = h.orchestrator.snapshot();
        assert_eq!(snapshot.phase, Phase::Lose);
        assert_eq!(snapshot.tries_left, 0);
        assert_eq!(snapshot.round, 1);
        assert_eq!(h.client.fetched_rounds(), vec![1, 1, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn submission_failure_halts_in_error_phase() {
        let h = harness(
            vec![
                Ok(Verdict::pass()),
                Err(SessionError::Status {
                    status: 502,
                    body: "bad gateway".into(),
                }),
            ],
            BattleConfig::instant(),
        );

        let err = h.orchestrator.run().await.unwrap_err();

        assert!(matches!(err, BattleError::Session(SessionError::Status { status: 502, .. })));
        let snapshot = h.orchestrator.snapshot();
        assert_eq!(snapshot.phase, Phase::Error);
        assert_eq!(snapshot.tries_left, 3);
        assert_eq!(snapshot.opponent_health, 2);
        assert_eq!(snapshot.round, 2);
        assert!(snapshot.error.is_some());
        assert_eq!(h.observer.errors().len(), 1);
        assert!(h.observer.finished().is_empty());
        assert_eq!(h.observer.phases().last(), Some(&Phase::Error));
    }

    #[tokio::test(start_paused = true)]
    async fn permission_denied_is_terminal_and_distinct() {
        let h = harness_with(
            vec![],
            BattleConfig::instant(),
            RecordingSink::new(),
            FakeBackend::new(FakeContextSpec::new(44100)).denying_permission(),
        );

        let err = h.orchestrator.run().await.unwrap_err();

        assert_eq!(err, BattleError::Capture(CaptureError::PermissionDenied));
        assert_eq!(h.orchestrator.phase(), Phase::Error);
        assert_eq!(h.client.starts(), 0);
        assert!(err.user_message().contains("Microphone"));
    }

    #[tokio::test(start_paused = true)]
    async fn playback_failure_halts_round() {
        let h = harness_with(
            vec![Ok(Verdict::pass())],
            BattleConfig::instant(),
            RecordingSink::new().failing(),
            FakeBackend::new(FakeContextSpec::new(44100)),
        );

        let err = h.orchestrator.run().await.unwrap_err();

        assert!(matches!(err, BattleError::Playback(_)));
        assert_eq!(h.orchestrator.phase(), Phase::Error);
        assert_eq!(h.client.submissions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn interrupted_call_still_opens_the_window() {
        let h = harness_with(
            vec![Ok(Verdict::pass()), Ok(Verdict::pass()), Ok(Verdict::pass())],
            BattleConfig::instant(),
            RecordingSink::new().interrupting(),
            FakeBackend::new(FakeContextSpec::new(44100)),
        );

        let outcome = h.orchestrator.run().await.unwrap();
        assert!(outcome.is_win());
    }

    #[tokio::test(start_paused = true)]
    async fn playback_finishes_before_each_capture_window() {
        let journal = Journal::default();
        let sink = RecordingSink::with_journal(journal.clone());
        let backend = FakeBackend::new(FakeContextSpec::new(44100).with_journal(journal.clone()));
        let h = harness_with(
            vec![Ok(Verdict::fail()), Ok(Verdict::pass()), Ok(Verdict::pass()), Ok(Verdict::pass())],
            BattleConfig::instant(),
            sink,
            backend,
        );

        h.orchestrator.run().await.unwrap();

        let entries: Vec<String> = journal
            .entries()
            .into_iter()
            .filter(|e| e == "play:end" || e == "attach" || e == "detach")
            .collect();
        let expected: Vec<&str> = ["play:end", "attach", "detach"].repeat(4);
        assert_eq!(entries, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn microphone_and_context_are_shared_across_rounds() {
        let h = harness(
            vec![Ok(Verdict::fail()), Ok(Verdict::pass()), Ok(Verdict::pass()), Ok(Verdict::pass())],
            BattleConfig::instant(),
        );

        h.orchestrator.run().await.unwrap();

        assert_eq!(h.backend.microphone_requests(), 1);
        assert_eq!(h.backend.contexts_created(), 1);
        let context = h.backend.last_context().unwrap();
        assert_eq!(context.attached_kinds().len(), 4);
        assert_eq!(context.close_count(), 1);
        assert_eq!(h.backend.last_stream().unwrap().stop_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn context_is_created_before_any_suspension() {
        let backend = FakeBackend::new(FakeContextSpec::new(44100));
        let engine = CaptureEngine::new(backend.clone(), CaptureConfig::default()).unwrap();

        let resources = MatchResources::prepare(&engine).unwrap();

        assert_eq!(backend.contexts_created(), 1);
        assert_eq!(backend.microphone_requests(), 0);
        drop(resources);
        assert_eq!(backend.last_context().unwrap().close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn borrowed_resources_outlive_the_match() {
        let backend = FakeBackend::new(FakeContextSpec::new(44100));
        let context = Arc::new(crate::testing::FakeContext::new(FakeContextSpec::new(44100)));
        let stream = Arc::new(crate::testing::FakeStream::new("external"));
        let engine = CaptureEngine::new(backend.clone(), CaptureConfig::default()).unwrap();
        let resources = MatchResources::borrowed(context.clone(), Some(stream.clone()));
        let client = ScriptedClient::new(vec![Ok(Verdict::fail()), Ok(Verdict::fail()), Ok(Verdict::fail())]);
        let playback = PlaybackService::new(RecordingSink::new(), PlaybackConfig::default());
        let orchestrator =
            BattleOrchestrator::new(client, engine, playback, resources, BattleConfig::instant()).unwrap();

        orchestrator.run().await.unwrap();

        assert_eq!(context.close_count(), 0);
        assert_eq!(stream.stop_count(), 0);
        assert_eq!(backend.microphone_requests(), 0);
        assert_eq!(backend.contexts_created(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn runs_at_most_once() {
        let h = harness(
            vec![Ok(Verdict::fail()), Ok(Verdict::fail()), Ok(Verdict::fail())],
            BattleConfig::instant(),
        );

        let (first, second) = tokio::join!(h.orchestrator.run(), h.orchestrator.run());

        assert!(first.is_ok());
        assert_eq!(second.unwrap_err(), BattleError::AlreadyStarted);
        assert_eq!(h.client.starts(), 1);
        assert_eq!(h.orchestrator.phase(), Phase::Lose);
    }

    #[tokio::test(start_paused = true)]
    async fn phases_follow_the_round_sequence() {
        let h = harness(
            vec![Ok(Verdict::fail()), Ok(Verdict::pass()), Ok(Verdict::pass()), Ok(Verdict::pass())],
            BattleConfig::instant(),
        );

        h.orchestrator.run().await.unwrap();

        let mut phases = h.observer.phases();
        phases.dedup();
        let round = [
            Phase::OpponentCalling,
            Phase::PlayerTurn,
            Phase::Analyzing,
            Phase::RoundResult,
        ];
        let mut expected = vec![Phase::Intro];
        for _ in 0..4 {
            expected.extend_from_slice(&round);
        }
        expected.push(Phase::Win);
        assert_eq!(phases, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_reason_is_shown_with_countdown_dialogue() {
        let h = harness(
            vec![
                Ok(Verdict::fail().with_failure_reason("Pitch too low")),
                Ok(Verdict::fail()),
                Ok(Verdict::fail()),
            ],
            BattleConfig::instant(),
        );

        h.orchestrator.run().await.unwrap();

        let lines = h.observer.dialogue();
        assert!(lines.iter().any(|l| l == "Pitch too low"));
        assert!(lines.iter().any(|l| l == "3..."));
        assert!(lines.iter().any(|l| l == "GO!"));
        assert_eq!(lines.iter().filter(|l| *l == "Try again!").count(), 2);
        assert_eq!(lines.last().map(String::as_str), Some("YOU blacked out!"));
    }

    #[tokio::test(start_paused = true)]
    async fn full_pacing_matches_configured_delays() {
        let h = harness(
            vec![Ok(Verdict::pass()), Ok(Verdict::pass()), Ok(Verdict::pass())],
            BattleConfig::default(),
        );
        let started = tokio::time::Instant::now();

        h.orchestrator.run().await.unwrap();

        // intro 3.7s, then per round: 0.5s post-call, 2.3s countdown,
        // 3.5s capture, 1.5s result pause.
        let expected = Duration::from_millis(3700 + 3 * (500 + 2300 + 3500 + 1500));
        assert!(started.elapsed() >= expected);
        assert_eq!(h.sink.plays(), 3);
    }
}

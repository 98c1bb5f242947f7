use std::time::Duration;

/// Configuration for the capture engine.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Sample rate requested from the platform (default: 44100).
    /// The encoded waveform always uses the context's actual rate.
    pub requested_sample_rate: u32,

    /// Frame size for the block-callback processing path (default: 4096).
    pub block_size: usize,

    /// Ask the platform for echo cancellation (default: true).
    pub echo_cancellation: bool,

    /// Ask the platform for noise suppression (default: false).
    pub noise_suppression: bool,

    /// Log a progress line every N received blocks (default: 10).
    pub progress_log_interval: usize,
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.requested_sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if self.block_size == 0 || !self.block_size.is_power_of_two() {
            return Err(format!("block size must be a power of two: {}", self.block_size));
        }
        Ok(())
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            requested_sample_rate: 44100,
            block_size: 4096,
            echo_cancellation: true,
            noise_suppression: false,
            progress_log_interval: 10,
        }
    }
}

/// Configuration for the playback service.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackConfig {
    /// Delay between playback end and releasing the loaded clip (default: 100ms).
    pub release_grace: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            release_grace: Duration::from_millis(100),
        }
    }
}

/// Match rules and presentation pacing for the battle orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct BattleConfig {
    /// Length of each recording window (default: 3500ms).
    pub capture_window: Duration,

    /// Rounds the player must clear to win (default: 3).
    pub max_rounds: u32,

    /// Failed attempts allowed before losing (default: 3).
    pub max_tries: u32,

    /// Opponent health at match start (default: 3).
    pub opponent_health: u32,

    pub opponent_name: String,
    pub player_name: String,

    /// Intro beats: opponent appears, player enters, settle.
    pub intro_appear: Duration,
    pub intro_enter: Duration,
    pub intro_settle: Duration,

    /// Pause after the opponent's call finishes.
    pub post_call_pause: Duration,

    /// "YOUR TURN!" lead-in, then one tick per countdown number.
    pub countdown_lead: Duration,
    pub countdown_tick: Duration,
    pub countdown_from: u32,

    /// How long a failure reason stays on screen.
    pub failure_feedback: Duration,

    /// Pause after "Round N cleared!" / "Try again!".
    pub result_pause: Duration,

    /// Pause before the defeat line.
    pub lose_pause: Duration,
}

impl BattleConfig {
    /// Same rules with all presentation pauses removed.
    pub fn instant() -> Self {
        Self {
            intro_appear: Duration::ZERO,
            intro_enter: Duration::ZERO,
            intro_settle: Duration::ZERO,
            post_call_pause: Duration::ZERO,
            countdown_lead: Duration::ZERO,
            countdown_tick: Duration::ZERO,
            failure_feedback: Duration::ZERO,
            result_pause: Duration::ZERO,
            lose_pause: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.capture_window.is_zero() {
            return Err("capture window must be positive".into());
        }
        if self.max_rounds == 0 {
            return Err("max rounds must be at least 1".into());
        }
        if self.max_tries == 0 {
            return Err("max tries must be at least 1".into());
        }
        if self.opponent_health < self.max_rounds {
            return Err(format!(
                "opponent health {} cannot absorb {} rounds",
                self.opponent_health, self.max_rounds
            ));
        }
        Ok(())
    }
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            capture_window: Duration::from_millis(3500),
            max_rounds: 3,
            max_tries: 3,
            opponent_health: 3,
            opponent_name: "UWU BIRD".into(),
            player_name: "ANNOYED AUNTIE".into(),
            intro_appear: Duration::from_millis(1600),
            intro_enter: Duration::from_millis(1600),
            intro_settle: Duration::from_millis(500),
            post_call_pause: Duration::from_millis(500),
            countdown_lead: Duration::from_millis(800),
            countdown_tick: Duration::from_millis(500),
            countdown_from: 3,
            failure_feedback: Duration::from_millis(2000),
            result_pause: Duration::from_millis(1500),
            lose_pause: Duration::from_millis(800),
        }
    }
}

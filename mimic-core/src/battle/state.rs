use serde::Serialize;

use crate::models::config::BattleConfig;
use crate::models::error::BattleError;
use crate::models::outcome::MatchOutcome;
use crate::models::phase::Phase;
use crate::models::verdict::{MatchResult, StartResponse, Verdict};

/// Inputs that drive the match from one phase to the next.
#[derive(Debug, Clone, PartialEq)]
pub enum BattleEvent {
    IntroComplete,
    PlaybackComplete,
    WindowClosed,
    VerdictReceived(Verdict),
    ResultShown,
    /// A collaborator failed; the match halts in `Phase::Error`.
    Fault(String),
}

impl BattleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::IntroComplete => "intro_complete",
            Self::PlaybackComplete => "playback_complete",
            Self::WindowClosed => "window_closed",
            Self::VerdictReceived(_) => "verdict_received",
            Self::ResultShown => "result_shown",
            Self::Fault(_) => "fault",
        }
    }
}

/// Read-only view of the match for presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchSnapshot {
    pub phase: Phase,
    pub round: u32,
    pub tries_left: u32,
    pub opponent_health: u32,
    pub score: i64,
    pub error: Option<String>,
}

/// Authoritative state of one match.
///
/// Only [`MatchState::apply`] moves the phase, and only verdicts change
/// health, tries and score.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchState {
    session_id: Option<String>,
    phase: Phase,
    round: u32,
    tries_left: u32,
    opponent_health: u32,
    score: i64,
    score_token: Option<String>,
    max_rounds: u32,
    max_tries: u32,
    error: Option<String>,
}

impl MatchState {
    pub fn new(config: &BattleConfig) -> Self {
        Self {
            session_id: None,
            phase: Phase::Intro,
            round: 1,
            tries_left: config.max_tries,
            opponent_health: config.opponent_health,
            score: 0,
            score_token: None,
            max_rounds: config.max_rounds,
            max_tries: config.max_tries,
            error: None,
        }
    }

    /// Bind the backend session returned by `start`.
    ///
    /// A match always begins locally at round one. The backend's starting
    /// tries are used only when they fall inside the configured limit;
    /// any other disagreement is logged and the local value stands.
    pub fn bind_session(&mut self, start: &StartResponse) {
        self.session_id = Some(start.session_id.clone());
        if start.round != self.round {
            log::warn!(
                "Backend start round {} disagrees with local round {}",
                start.round,
                self.round
            );
        }
        if (1..=self.max_tries).contains(&start.tries_left) {
            self.tries_left = start.tries_left;
        } else {
            log::warn!(
                "Backend start tries {} is outside 1..={}, keeping {}",
                start.tries_left,
                self.max_tries,
                self.tries_left
            );
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn tries_left(&self) -> u32 {
        self.tries_left
    }

    pub fn opponent_health(&self) -> u32 {
        self.opponent_health
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn score_token(&self) -> Option<&str> {
        self.score_token.as_deref()
    }

    pub fn rounds_cleared(&self) -> u32 {
        (self.round - 1).min(self.max_rounds)
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            phase: self.phase,
            round: self.round,
            tries_left: self.tries_left,
            opponent_health: self.opponent_health,
            score: self.score,
            error: self.error.clone(),
        }
    }

    /// Summary for the leaderboard, once the match is won or lost.
    pub fn outcome(&self) -> Option<MatchOutcome> {
        let result = match self.phase {
            Phase::Win => MatchResult::Win,
            Phase::Lose => MatchResult::Lose,
            _ => return None,
        };
        Some(MatchOutcome::new(
            self.session_id.as_deref().unwrap_or_default(),
            result,
            self.score,
            self.score_token.clone(),
            self.rounds_cleared(),
            self.tries_left,
        ))
    }

    /// Apply one event. Exactly one event is valid per non-terminal phase
    /// (plus `Fault`); anything else is rejected without changing state.
    pub fn apply(&mut self, event: BattleEvent) -> Result<Phase, BattleError> {
        let next = match (self.phase, event) {
            (phase, BattleEvent::Fault(reason)) if !phase.is_terminal() => {
                self.error = Some(reason);
                Phase::Error
            }
            (Phase::Intro, BattleEvent::IntroComplete) => Phase::OpponentCalling,
            (Phase::OpponentCalling, BattleEvent::PlaybackComplete) => Phase::PlayerTurn,
            (Phase::PlayerTurn, BattleEvent::WindowClosed) => Phase::Analyzing,
            (Phase::Analyzing, BattleEvent::VerdictReceived(verdict)) => {
                self.apply_verdict(&verdict);
                Phase::RoundResult
            }
            (Phase::RoundResult, BattleEvent::ResultShown) => {
                if self.round > self.max_rounds {
                    Phase::Win
                } else if self.tries_left == 0 {
                    Phase::Lose
                } else {
                    Phase::OpponentCalling
                }
            }
            (phase, event) => {
                return Err(BattleError::InvalidTransition {
                    phase,
                    event: event.name(),
                })
            }
        };
        self.phase = next;
        Ok(next)
    }

    fn apply_verdict(&mut self, verdict: &Verdict) {
        if verdict.passed {
            self.opponent_health = self.opponent_health.saturating_sub(1);
            self.round += 1;
        } else {
            self.tries_left = self.tries_left.saturating_sub(1);
        }

        // The backend's running total wins; the per-attempt score is only a
        // fallback, and only for passing attempts.
        if let Some(total) = verdict.total_score {
            self.score = total;
        } else if verdict.passed {
            self.score += verdict.performance_score.unwrap_or(0);
        }

        if let Some(token) = &verdict.score_token {
            self.score_token = Some(token.clone());
        }
    }
}

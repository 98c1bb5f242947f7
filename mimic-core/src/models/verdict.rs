use serde::{Deserialize, Serialize};

/// Terminal result reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchResult {
    Win,
    Lose,
}

/// Response to `POST /api/game/start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartResponse {
    pub session_id: String,
    pub round: u32,
    pub tries_left: u32,
    #[serde(default)]
    pub max_rounds: Option<u32>,
    #[serde(default)]
    pub max_tries: Option<u32>,
    #[serde(default)]
    pub message: String,
}

/// The backend's judgment on one submitted attempt.
///
/// Only `passed` and `game_over` are required; every other field is
/// optional on the wire.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    #[serde(default)]
    pub performance_score: Option<i64>,
    #[serde(default)]
    pub total_score: Option<i64>,
    #[serde(default)]
    pub score_token: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub game_over: bool,
    #[serde(default)]
    pub result: Option<MatchResult>,
    #[serde(default)]
    pub next_round: Option<u32>,
    #[serde(default)]
    pub tries_left: Option<u32>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Verdict {
    pub fn pass() -> Self {
        Self {
            passed: true,
            ..Self::default()
        }
    }

    pub fn fail() -> Self {
        Self::default()
    }

    pub fn with_performance_score(mut self, score: i64) -> Self {
        self.performance_score = Some(score);
        self
    }

    pub fn with_total_score(mut self, score: i64) -> Self {
        self.total_score = Some(score);
        self
    }

    pub fn with_score_token(mut self, token: impl Into<String>) -> Self {
        self.score_token = Some(token.into());
        self
    }

    pub fn with_failure_reason(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }
}

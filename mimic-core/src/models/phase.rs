use serde::Serialize;

/// Battle phase state machine.
///
/// State transitions:
/// ```text
/// intro → opponent_calling → player_turn → analyzing → round_result
///               ↑                                          │
///               └──────────── (tries left, round ≤ max) ───┤
///                                                          ├→ win
///                                                          └→ lose
/// any non-terminal phase ──(collaborator failure)──→ error
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Intro,
    OpponentCalling,
    PlayerTurn,
    Analyzing,
    RoundResult,
    Win,
    Lose,
    Error,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Win | Self::Lose | Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intro => "intro",
            Self::OpponentCalling => "opponent_calling",
            Self::PlayerTurn => "player_turn",
            Self::Analyzing => "analyzing",
            Self::RoundResult => "round_result",
            Self::Win => "win",
            Self::Lose => "lose",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

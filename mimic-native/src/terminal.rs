//! Plain-text presentation of a match on stdout.

use parking_lot::Mutex;

use mimic_core::battle::state::MatchSnapshot;
use mimic_core::models::error::BattleError;
use mimic_core::models::outcome::MatchOutcome;
use mimic_core::traits::battle_observer::BattleObserver;

/// Prints dialogue and a status line whenever the match changes.
pub struct TerminalObserver {
    opponent: String,
    max_health: u32,
    last: Mutex<Option<MatchSnapshot>>,
}

impl TerminalObserver {
    pub fn new(opponent: &str, max_health: u32) -> Self {
        Self {
            opponent: opponent.to_string(),
            max_health,
            last: Mutex::new(None),
        }
    }

    pub fn status_line(&self, snapshot: &MatchSnapshot) -> String {
        let filled = snapshot.opponent_health.min(self.max_health) as usize;
        let empty = self.max_health as usize - filled;
        format!(
            "[{}] round {} | tries {} | {} HP [{}{}] | score {}",
            snapshot.phase,
            snapshot.round,
            snapshot.tries_left,
            self.opponent,
            "#".repeat(filled),
            "-".repeat(empty),
            snapshot.score
        )
    }
}

impl BattleObserver for TerminalObserver {
    fn on_state_changed(&self, snapshot: &MatchSnapshot) {
        let mut last = self.last.lock();
        if last.as_ref() != Some(snapshot) {
            println!("{}", self.status_line(snapshot));
            *last = Some(snapshot.clone());
        }
    }

    fn on_dialogue(&self, line: &str) {
        println!("  {}", line);
    }

    fn on_error(&self, error: &BattleError) {
        eprintln!("! {}", error.user_message());
    }

    fn on_match_finished(&self, outcome: &MatchOutcome) {
        println!(
            "Match over: {} with {} point(s) after {} round(s)",
            if outcome.is_win() { "victory" } else { "defeat" },
            outcome.score,
            outcome.rounds_cleared
        );
    }
}

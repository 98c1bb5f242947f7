use crate::battle::state::MatchSnapshot;
use crate::models::error::BattleError;
use crate::models::outcome::MatchOutcome;

/// Read-only event feed for the presentation layer.
///
/// All methods are called from the orchestrator's task. Implementations
/// should hand off to their own thread if they do anything slow.
pub trait BattleObserver: Send + Sync {
    /// Called after every change to phase, round, tries, health or score.
    fn on_state_changed(&self, snapshot: &MatchSnapshot);

    /// Called with each line of battle dialogue.
    fn on_dialogue(&self, line: &str);

    /// Called when the match halts on an error.
    fn on_error(&self, error: &BattleError);

    /// Called once when the match reaches Win or Lose.
    fn on_match_finished(&self, outcome: &MatchOutcome);
}

use serde::Serialize;

use super::verdict::MatchResult;

/// Summary of a finished match, handed to the leaderboard collaborator.
///
/// Serializable for JSON export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchOutcome {
    pub id: String,
    pub session_id: String,
    pub result: MatchResult,
    pub score: i64,
    pub score_token: Option<String>,
    pub rounds_cleared: u32,
    pub tries_left: u32,
    pub finished_at: String,
}

impl MatchOutcome {
    pub fn new(
        session_id: &str,
        result: MatchResult,
        score: i64,
        score_token: Option<String>,
        rounds_cleared: u32,
        tries_left: u32,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            result,
            score,
            score_token,
            rounds_cleared,
            tries_left,
            finished_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn is_win(&self) -> bool {
        self.result == MatchResult::Win
    }

    /// Pretty-printed JSON, as submitted to the leaderboard.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_for_leaderboard() {
        let outcome = MatchOutcome::new("s-1", MatchResult::Win, 2400, Some("tok".into()), 3, 2);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["result"], "win");
        assert_eq!(json["score"], 2400);
        assert_eq!(json["score_token"], "tok");
        assert!(uuid::Uuid::parse_str(json["id"].as_str().unwrap()).is_ok());
        assert!(chrono::DateTime::parse_from_rfc3339(json["finished_at"].as_str().unwrap()).is_ok());
    }
}

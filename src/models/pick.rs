use crate::error::SnapshotError;
use crate::models::GameId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickResult {
    Pending,
    Win,
    Loss,
    Push,
    Void,
}

/// A user-entered bet, linked to a game in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    pub pick_id: String,
    pub game_id: GameId,
    pub player: Option<String>,
    pub bet_type: String,
    pub selection: String,
    pub line: Option<f64>,
    pub odds: i32,
    pub stake: f64,
    pub confidence: u8, // 1-10
    pub tags: Vec<String>,
    pub reasoning: String,
    pub placed_at: DateTime<Utc>,
    pub result: PickResult,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Pick {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pick_id: impl Into<String>,
        game_id: GameId,
        bet_type: impl Into<String>,
        selection: impl Into<String>,
        line: Option<f64>,
        odds: i32,
        stake: f64,
        confidence: u8,
        placed_at: DateTime<Utc>,
    ) -> Result<Self, SnapshotError> {
        if !(1..=10).contains(&confidence) {
            return Err(SnapshotError::InvalidPick(format!(
                "confidence must be between 1 and 10, got {}",
                confidence
            )));
        }
        Ok(Self {
            pick_id: pick_id.into(),
            game_id,
            player: None,
            bet_type: bet_type.into(),
            selection: selection.into(),
            line,
            odds,
            stake,
            confidence,
            tags: Vec::new(),
            reasoning: String::new(),
            placed_at,
            result: PickResult::Pending,
            resolved_at: None,
        })
    }

    pub fn with_player(mut self, player: impl Into<String>) -> Self {
        self.player = Some(player.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    /// Record the outcome. Only allowed once, and only after the game has kicked off.
    pub fn resolve(
        &mut self,
        result: PickResult,
        kickoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), SnapshotError> {
        if result == PickResult::Pending {
            return Err(SnapshotError::InvalidPick(
                "cannot resolve a pick back to pending".to_string(),
            ));
        }
        if self.result != PickResult::Pending {
            return Err(SnapshotError::InvalidPick(format!(
                "pick {} is already resolved",
                self.pick_id
            )));
        }
        if now <= kickoff {
            return Err(SnapshotError::InvalidPick(format!(
                "game {} has not started yet",
                self.game_id
            )));
        }
        self.result = result;
        self.resolved_at = Some(now);
        Ok(())
    }
}

//! Score aggregation: turns a completed match into advancement or round-robin points.

use crate::models::{GameMatch, MatchId, PlayerId, Resolution, TournamentError, TournamentKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Accumulated round-robin points per player.
pub type ScoreTable = BTreeMap<PlayerId, u32>;

/// Points awarded per match result.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringRules {
    pub win_points: u32,
    pub draw_points: u32,
    pub loss_points: u32,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            win_points: 3,
            draw_points: 1,
            loss_points: 0,
        }
    }
}

/// What a completed match means for the tournament.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AggregationResult {
    pub match_id: MatchId,
    /// Single elimination: the player who moves on, if any.
    pub advancing: Option<PlayerId>,
    /// Updated point table (unchanged for single elimination).
    pub scores: ScoreTable,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ScoreAggregator {
    rules: ScoringRules,
}

impl ScoreAggregator {
    pub fn new(rules: ScoringRules) -> Self {
        Self { rules }
    }

    /// Points the given player earns from a completed match, or None if they were not in it.
    pub fn points_for(&self, m: &GameMatch, player: PlayerId) -> Option<u32> {
        if !m.has_player(player) || !m.is_completed() {
            return None;
        }
        let points = match (m.resolution, m.winner) {
            (Some(Resolution::Draw), _) => self.rules.draw_points,
            (_, Some(w)) if w == player => self.rules.win_points,
            _ => self.rules.loss_points,
        };
        Some(points)
    }

    /// Pure: never mutates the match, returns the new table instead.
    pub fn record_completion(
        &self,
        kind: TournamentKind,
        m: &GameMatch,
        scores: &ScoreTable,
    ) -> Result<AggregationResult, TournamentError> {
        if !m.is_completed() {
            return Err(TournamentError::InvalidState("match is not completed"));
        }
        let mut table = scores.clone();
        let advancing = match kind {
            TournamentKind::SingleElimination => {
                if m.resolution == Some(Resolution::Draw) {
                    return Err(TournamentError::DrawNotAllowed);
                }
                m.winner
            }
            TournamentKind::RoundRobin => {
                for player in m.participants() {
                    let earned = self.points_for(m, player).unwrap_or(0);
                    *table.entry(player).or_insert(0) += earned;
                }
                None
            }
        };
        Ok(AggregationResult {
            match_id: m.id,
            advancing,
            scores: table,
        })
    }
}

//! Round: an ordered list of matches played in the same stage.

use crate::models::game::{GameMatch, MatchId, Stage, Status};
use crate::models::player::PlayerId;
use crate::models::tournament::TournamentError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    /// 1-based sequence number.
    pub number: u32,
    pub stage: Stage,
    /// Derived from the matches; see [`Round::refresh_status`].
    pub status: Status,
    pub matches: Vec<GameMatch>,
    /// Advancing players in bracket order. Filled when the round completes.
    pub winners: Vec<PlayerId>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Round {
    /// A round must hold at least one match.
    pub fn new(
        number: u32,
        stage: Stage,
        matches: Vec<GameMatch>,
    ) -> Result<Self, TournamentError> {
        if matches.is_empty() {
            return Err(TournamentError::Invariant(format!("round {number} has no matches")));
        }
        Ok(Self {
            number,
            stage,
            status: Status::Pending,
            matches,
            winners: Vec::new(),
            started_at: None,
            ended_at: None,
        })
    }

    /// True iff every match is completed.
    pub fn is_complete(&self) -> bool {
        self.matches.iter().all(GameMatch::is_completed)
    }

    pub fn get_match(&self, id: MatchId) -> Option<&GameMatch> {
        self.matches.iter().find(|m| m.id == id)
    }

    pub fn get_match_mut(&mut self, id: MatchId) -> Option<&mut GameMatch> {
        self.matches.iter_mut().find(|m| m.id == id)
    }

    /// Mark the round ongoing (it is being played).
    pub fn open(&mut self, at: DateTime<Utc>) {
        if self.status == Status::Pending {
            self.status = Status::Ongoing;
            self.started_at = Some(at);
        }
    }

    /// Re-derive the status from the matches. Completion also records winners in match order.
    pub fn refresh_status(&mut self, at: DateTime<Utc>) {
        if self.status == Status::Completed {
            return;
        }
        if self.is_complete() {
            self.winners = self.matches.iter().filter_map(|m| m.winner).collect();
            self.status = Status::Completed;
            self.started_at.get_or_insert(at);
            self.ended_at = Some(at);
        } else if self.matches.iter().any(|m| m.status != Status::Pending) {
            self.open(at);
        }
    }
}

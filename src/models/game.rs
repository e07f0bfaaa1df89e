//! Match (game), Side, Stage and the three-state Status shared by matches, rounds and tournaments.

use crate::models::player::PlayerId;
use crate::models::tournament::TournamentError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a match.
pub type MatchId = Uuid;

/// Which slot of the match a player occupies.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    #[default]
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Lifecycle of a match, round or tournament. Only ever moves forward.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Pending,
    Ongoing,
    Completed,
}

/// Stage label of a round, in bracket order.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Preliminaries,
    Quarterfinals,
    Semifinals,
    Finals,
    RoundRobin,
}

impl Stage {
    /// Elimination stage for a bracket of the given size (players entering the round).
    pub fn for_bracket(size: usize) -> Self {
        match size {
            0..=2 => Stage::Finals,
            3..=4 => Stage::Semifinals,
            5..=8 => Stage::Quarterfinals,
            _ => Stage::Preliminaries,
        }
    }
}

/// Final result handed to a match when it ends.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// Played to a score; equal scores are a draw.
    Scored { left: u32, right: u32 },
    /// A participant failed to show up or reconnect in time.
    Forfeit { winner: PlayerId },
    /// Neither participant showed up, or the match was cancelled.
    NoContest,
}

/// How a completed match was resolved.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Played,
    Draw,
    Bye,
    Forfeit,
    NoContest,
}

/// A single match between two player slots. Either slot may be empty (bye / unassigned).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameMatch {
    pub id: MatchId,
    /// Sequence number of the owning round.
    pub round: u32,
    pub stage: Stage,
    pub left: Option<PlayerId>,
    pub right: Option<PlayerId>,
    pub left_score: u32,
    pub right_score: u32,
    /// None until resolved, and for draws and no-contests.
    pub winner: Option<PlayerId>,
    pub status: Status,
    pub resolution: Option<Resolution>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl GameMatch {
    /// Fails if both slots hold the same player.
    pub fn new(
        round: u32,
        stage: Stage,
        left: Option<PlayerId>,
        right: Option<PlayerId>,
    ) -> Result<Self, TournamentError> {
        if left.is_some() && left == right {
            return Err(TournamentError::Invariant(format!(
                "match in round {round} pairs a player with themselves"
            )));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            round,
            stage,
            left,
            right,
            left_score: 0,
            right_score: 0,
            winner: None,
            status: Status::Pending,
            resolution: None,
            started_at: None,
            ended_at: None,
        })
    }

    /// Non-empty slots, left first.
    pub fn participants(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.left.iter().chain(self.right.iter()).copied()
    }

    pub fn has_player(&self, id: PlayerId) -> bool {
        self.side_of(id).is_some()
    }

    pub fn side_of(&self, id: PlayerId) -> Option<Side> {
        if self.left == Some(id) {
            Some(Side::Left)
        } else if self.right == Some(id) {
            Some(Side::Right)
        } else {
            None
        }
    }

    pub fn player_at(&self, side: Side) -> Option<PlayerId> {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    /// Exactly one slot is filled.
    pub fn is_bye(&self) -> bool {
        self.left.is_some() != self.right.is_some()
    }

    pub fn is_completed(&self) -> bool {
        self.status == Status::Completed
    }

    /// Score of the given player in this match, or None if they did not play in it.
    pub fn score_of(&self, id: PlayerId) -> Option<(u32, u32)> {
        match self.side_of(id)? {
            Side::Left => Some((self.left_score, self.right_score)),
            Side::Right => Some((self.right_score, self.left_score)),
        }
    }

    /// pending -> ongoing.
    pub fn start(&mut self, at: DateTime<Utc>) -> Result<(), TournamentError> {
        if self.status != Status::Pending {
            return Err(TournamentError::AlreadyStarted(self.id));
        }
        self.status = Status::Ongoing;
        self.started_at = Some(at);
        Ok(())
    }

    /// Resolve the match. A pending match may be completed directly (forfeit before start).
    pub fn complete(&mut self, outcome: Outcome, at: DateTime<Utc>) -> Result<(), TournamentError> {
        if self.is_completed() {
            return Err(TournamentError::AlreadyCompleted(self.id));
        }
        match outcome {
            Outcome::Scored { left, right } => {
                self.left_score = left;
                self.right_score = right;
                if left == right {
                    self.winner = None;
                    self.resolution = Some(Resolution::Draw);
                } else {
                    self.winner = if left > right { self.left } else { self.right };
                    self.resolution = Some(Resolution::Played);
                }
            }
            Outcome::Forfeit { winner } => {
                if !self.has_player(winner) {
                    return Err(TournamentError::NotAParticipant(winner, self.id));
                }
                self.winner = Some(winner);
                self.resolution = Some(Resolution::Forfeit);
            }
            Outcome::NoContest => {
                self.winner = None;
                self.resolution = Some(Resolution::NoContest);
            }
        }
        self.status = Status::Completed;
        self.ended_at = Some(at);
        Ok(())
    }

    /// Auto-complete a bye with the present player as winner. No simulation is run.
    pub fn complete_bye(&mut self, at: DateTime<Utc>) -> Result<(), TournamentError> {
        if !self.is_bye() {
            return Err(TournamentError::InvalidState("not a bye"));
        }
        if self.is_completed() {
            return Err(TournamentError::AlreadyCompleted(self.id));
        }
        self.winner = self.left.or(self.right);
        self.resolution = Some(Resolution::Bye);
        self.status = Status::Completed;
        self.started_at.get_or_insert(at);
        self.ended_at = Some(at);
        Ok(())
    }
}

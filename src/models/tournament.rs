//! Tournament, TournamentKind and TournamentError.

use crate::logic::scoring::{ScoreTable, ScoringRules};
use crate::models::game::{GameMatch, MatchId, Status};
use crate::models::player::{Player, PlayerId};
use crate::models::round::Round;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during tournament operations.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum TournamentError {
    /// Need at least two participants.
    #[error("need at least {required} participants, got {actual}")]
    NotEnoughPlayers { required: usize, actual: usize },
    /// The same identity appears twice in the participant list.
    #[error("participant {0} appears more than once")]
    DuplicateParticipant(PlayerId),
    #[error("match {0} not found")]
    MatchNotFound(MatchId),
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),
    #[error("match {0} has already started")]
    AlreadyStarted(MatchId),
    #[error("match {0} is already completed")]
    AlreadyCompleted(MatchId),
    /// Elimination matches need a single winner.
    #[error("draws are not allowed in single elimination")]
    DrawNotAllowed,
    #[error("player {0} is not a participant of match {1}")]
    NotAParticipant(PlayerId, MatchId),
    #[error("{0} participant(s) are not ready")]
    PlayersNotReady(usize),
    /// Tournament is not in a state that allows this action.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    /// Internal invariant broken; the enclosing tournament must be aborted.
    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl TournamentError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, TournamentError::Invariant(_))
    }
}

/// Unique identifier for a tournament; doubles as its room id.
pub type TournamentId = Uuid;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentKind {
    #[default]
    SingleElimination,
    RoundRobin,
}

/// Full tournament state. Owns its rounds, which own their matches.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
    pub room_id: TournamentId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TournamentKind,
    pub status: Status,
    /// Set when the tournament was cancelled instead of played out.
    pub aborted: bool,
    /// Append-only.
    pub rounds: Vec<Round>,
    /// Participants in seed order.
    pub participants: Vec<Player>,
    /// Accumulated round-robin points.
    pub scores: ScoreTable,
    pub scoring: ScoringRules,
    pub final_winner: Option<PlayerId>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Tournament {
    /// Create a pending tournament with no rounds. Bracket generation lives in `logic::setup`.
    pub fn new(
        name: impl Into<String>,
        kind: TournamentKind,
        participants: Vec<Player>,
        scoring: ScoringRules,
    ) -> Self {
        Self {
            room_id: Uuid::new_v4(),
            name: name.into(),
            kind,
            status: Status::Pending,
            aborted: false,
            rounds: Vec::new(),
            participants,
            scores: ScoreTable::new(),
            scoring,
            final_winner: None,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == Status::Completed
    }

    pub fn participant(&self, id: PlayerId) -> Option<&Player> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn username(&self, id: PlayerId) -> Option<&str> {
        self.participant(id).map(|p| p.username.as_str())
    }

    /// Toggle readiness. The only participant field that may change after creation.
    pub fn set_ready(&mut self, id: PlayerId, ready: bool) -> Result<(), TournamentError> {
        self.participants
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(TournamentError::PlayerNotFound(id))?
            .set_ready(ready);
        Ok(())
    }

    /// Index of the round currently being played: the first one not yet completed.
    pub fn current_round_index(&self) -> Option<usize> {
        self.rounds.iter().position(|r| r.status != Status::Completed)
    }

    pub fn current_round(&self) -> Option<&Round> {
        self.current_round_index().map(|i| &self.rounds[i])
    }

    pub fn find_match(&self, id: MatchId) -> Option<&GameMatch> {
        self.rounds.iter().find_map(|r| r.get_match(id))
    }

    pub fn find_match_mut(&mut self, id: MatchId) -> Option<&mut GameMatch> {
        self.rounds.iter_mut().find_map(|r| r.get_match_mut(id))
    }

    /// All matches across all rounds, in round then bracket order.
    pub fn matches(&self) -> impl Iterator<Item = &GameMatch> {
        self.rounds.iter().flat_map(|r| r.matches.iter())
    }

    /// Check the structural invariants. A failure is fatal for the tournament.
    pub fn validate(&self) -> Result<(), TournamentError> {
        let mut seen = HashSet::new();
        for p in &self.participants {
            if !seen.insert(p.id) {
                return Err(TournamentError::Invariant(format!(
                    "duplicate participant {}",
                    p.id
                )));
            }
        }
        for round in &self.rounds {
            if round.matches.is_empty() {
                return Err(TournamentError::Invariant(format!(
                    "round {} has no matches",
                    round.number
                )));
            }
            for m in &round.matches {
                if m.left.is_some() && m.left == m.right {
                    return Err(TournamentError::Invariant(format!(
                        "match {} pairs a player with themselves",
                        m.id
                    )));
                }
            }
        }
        Ok(())
    }
}

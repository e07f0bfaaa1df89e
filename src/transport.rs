//! Wire protocol: the closed set of messages exchanged over a match or room channel.
//!
//! Client messages are tagged by `action`, server messages by `type`; field names are camelCase.

use crate::error::ErrorKind;
use crate::models::{MatchId, PlayerId, Profile, Round, TournamentId};
use crate::session::Snapshot;
use serde::{Deserialize, Serialize};

/// Client -> core.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    JoinMatch {
        match_id: MatchId,
    },
    LeaveMatch {
        match_id: MatchId,
    },
    JoinRoom {
        tournament_id: TournamentId,
    },
    /// Only the match controller (left slot) may start a match.
    StartGame {
        match_id: MatchId,
    },
    Keydown {
        key: String,
        match_id: MatchId,
        user_id: PlayerId,
    },
    Keyup {
        key: String,
        match_id: MatchId,
        user_id: PlayerId,
    },
    Ready {
        tournament_id: TournamentId,
        ready: bool,
    },
}

/// Core -> client.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    InitialState {
        match_id: MatchId,
        player1: Option<Profile>,
        player2: Option<Profile>,
    },
    /// One per tick.
    GameState(Snapshot),
    GameStarted {
        match_id: MatchId,
    },
    GameEnded {
        match_id: MatchId,
        winner: Option<PlayerId>,
        left_score: u32,
        right_score: u32,
    },
    RoundGenerated {
        tournament_id: TournamentId,
        round: Round,
    },
    MatchStarted {
        tournament_id: TournamentId,
        match_id: MatchId,
    },
    MatchCompleted {
        tournament_id: TournamentId,
        match_id: MatchId,
        winner: Option<PlayerId>,
    },
    TournamentCompleted {
        tournament_id: TournamentId,
        final_winner: Option<PlayerId>,
    },
    TournamentAborted {
        tournament_id: TournamentId,
        reason: String,
    },
    /// Typed rejection of a client action.
    Error {
        code: ErrorKind,
        message: String,
    },
}

pub fn decode(text: &str) -> Result<ClientMessage, serde_json::Error> {
    serde_json::from_str(text)
}

pub fn encode(message: &ServerMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}

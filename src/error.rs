//! Engine-level error and its mapping onto the client-facing taxonomy.

use crate::models::{TournamentError, TournamentId};
use crate::session::{RegistryError, SessionError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category reported to clients in `error` messages.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    InvalidState,
    Malformed,
    Internal,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("tournament {0} is no longer running")]
    Closed(TournamentId),
    #[error(transparent)]
    Tournament(#[from] TournamentError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::Unauthorized(_) => ErrorKind::Unauthorized,
            EngineError::InvalidState(_) | EngineError::Closed(_) => ErrorKind::InvalidState,
            EngineError::Malformed(_) => ErrorKind::Malformed,
            EngineError::Tournament(err) => tournament_kind(err),
            EngineError::Session(err) => match err {
                SessionError::UnknownKey(_) => ErrorKind::Malformed,
                SessionError::Tournament(inner) => tournament_kind(inner),
                SessionError::AlreadyStarted(_)
                | SessionError::NotStarted(_)
                | SessionError::InvalidInput { .. } => ErrorKind::InvalidState,
            },
            EngineError::Registry(err) => match err {
                RegistryError::UnknownMatch(_) | RegistryError::UnknownRoom(_) => {
                    ErrorKind::NotFound
                }
                RegistryError::NotAParticipant(..) => ErrorKind::Unauthorized,
            },
        }
    }
}

fn tournament_kind(err: &TournamentError) -> ErrorKind {
    match err {
        TournamentError::MatchNotFound(_) | TournamentError::PlayerNotFound(_) => {
            ErrorKind::NotFound
        }
        TournamentError::NotAParticipant(..) => ErrorKind::Unauthorized,
        TournamentError::Invariant(_) => ErrorKind::Internal,
        _ => ErrorKind::InvalidState,
    }
}

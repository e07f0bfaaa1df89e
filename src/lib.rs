//! Match arena: real-time two-player matches organized into tournaments.
//! Library with models, bracket logic, live match sessions and the orchestration hub.

pub mod archive;
pub mod config;
pub mod error;
pub mod export;
pub mod hub;
pub mod logic;
pub mod models;
pub mod session;
pub mod transport;

pub use archive::{Archive, LogArchive, MemoryArchive};
pub use config::{EngineConfig, SimulationConfig};
pub use error::{EngineError, ErrorKind};
pub use hub::{Connection, Hub};
pub use logic::{
    abort_tournament, create_tournament, record_match_result, standings, start_tournament,
    ScoreAggregator, ScoringRules, Seeding, TournamentConfig, TournamentEvent,
};
pub use models::{
    GameMatch, MatchId, Outcome, Player, PlayerId, Profile, Resolution, Round, Side, Stage,
    Standing, Status, Tournament, TournamentError, TournamentId, TournamentKind,
};
pub use session::{InputEvent, Key, MatchSession, SessionError, SessionRegistry, Snapshot, Topic};
pub use transport::{ClientMessage, ServerMessage};

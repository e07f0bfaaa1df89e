//! Data structures for the tournament core: players, matches, rounds, tournament state.

mod game;
mod player;
mod round;
mod tournament;

pub use game::{GameMatch, MatchId, Outcome, Resolution, Side, Stage, Status};
pub use player::{Player, PlayerId, Profile, Standing};
pub use round::Round;
pub use tournament::{Tournament, TournamentError, TournamentId, TournamentKind};

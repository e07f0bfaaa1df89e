//! Tournament business logic: setup, bracket generation, scoring, standings and progression.

pub mod progression;
pub mod round_robin;
pub mod scoring;
pub mod setup;
pub mod single_elimination;
pub mod standings;

pub use progression::{
    abort_tournament, advance, mark_match_started, open_current_round, record_match_result,
    TournamentEvent,
};
pub use scoring::{AggregationResult, ScoreAggregator, ScoreTable, ScoringRules};
pub use setup::{create_tournament, start_tournament, Seeding, TournamentConfig};
pub use standings::{leader, standings};

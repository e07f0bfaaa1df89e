//! Setup phase: build the tournament and its opening bracket, then start it.

use crate::logic::progression::{open_current_round, TournamentEvent};
use crate::logic::scoring::ScoringRules;
use crate::logic::{round_robin, single_elimination};
use crate::models::{Player, PlayerId, Status, Tournament, TournamentError, TournamentKind};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How participants are ordered before pairing.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seeding {
    /// Seed order is the order given.
    #[default]
    AsListed,
    /// Deterministic shuffle from the given seed.
    Shuffled(u64),
}

/// Everything needed to create a tournament.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TournamentKind,
    pub participants: Vec<Player>,
    #[serde(default)]
    pub seed: Seeding,
    #[serde(default)]
    pub scoring: ScoringRules,
}

/// Create a pending tournament.
///
/// Single elimination gets round 1 (with byes when the field is not a power of two);
/// round robin gets its full fixed schedule.
pub fn create_tournament(config: TournamentConfig) -> Result<Tournament, TournamentError> {
    let TournamentConfig {
        name,
        kind,
        mut participants,
        seed,
        scoring,
    } = config;

    if participants.len() < 2 {
        return Err(TournamentError::NotEnoughPlayers {
            required: 2,
            actual: participants.len(),
        });
    }
    let mut seen = HashSet::new();
    for p in &mut participants {
        if !seen.insert(p.id) {
            return Err(TournamentError::DuplicateParticipant(p.id));
        }
        p.username = p.username.trim().to_string();
        if p.username.is_empty() {
            return Err(TournamentError::InvalidState("participant without a username"));
        }
        p.ready = false;
    }

    if let Seeding::Shuffled(seed) = seed {
        participants.shuffle(&mut StdRng::seed_from_u64(seed));
    }
    let seeded: Vec<PlayerId> = participants.iter().map(|p| p.id).collect();

    let mut tournament = Tournament::new(name.trim(), kind, participants, scoring);
    tournament.rounds = match kind {
        TournamentKind::SingleElimination => vec![single_elimination::first_round(&seeded)?],
        TournamentKind::RoundRobin => round_robin::schedule(&seeded)?,
    };
    tournament.validate()?;
    log::info!(
        "Created {:?} tournament {} with {} participants and {} round(s)",
        kind,
        tournament.room_id,
        seeded.len(),
        tournament.rounds.len()
    );
    Ok(tournament)
}

/// Start the tournament: pending -> ongoing, round 1 opens and its byes resolve.
/// Every participant must be ready unless `force` is set.
pub fn start_tournament(
    tournament: &mut Tournament,
    force: bool,
    now: DateTime<Utc>,
) -> Result<Vec<TournamentEvent>, TournamentError> {
    if tournament.status != Status::Pending {
        return Err(TournamentError::InvalidState("tournament already started"));
    }
    let not_ready = tournament.participants.iter().filter(|p| !p.ready).count();
    if !force && not_ready > 0 {
        return Err(TournamentError::PlayersNotReady(not_ready));
    }
    tournament.status = Status::Ongoing;
    tournament.started_at = Some(now);
    log::info!("Tournament {} started", tournament.room_id);
    open_current_round(tournament, now)
}

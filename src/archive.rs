//! Hand-off of finished tournaments to durable storage, which lives outside the core.

use crate::models::Tournament;
use std::sync::{Mutex, PoisonError};

pub trait Archive: Send + Sync {
    /// Called once per tournament, after it completed or was aborted.
    fn store(&self, tournament: &Tournament);
}

/// Logs a one-line summary instead of storing anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogArchive;

impl Archive for LogArchive {
    fn store(&self, tournament: &Tournament) {
        let winner = tournament
            .final_winner
            .and_then(|id| tournament.username(id))
            .unwrap_or("-");
        log::info!(
            "Archived tournament {} ({}): {} round(s), aborted={}, winner={}",
            tournament.room_id,
            tournament.name,
            tournament.rounds.len(),
            tournament.aborted,
            winner
        );
    }
}

/// Keeps finished tournaments in memory.
#[derive(Debug, Default)]
pub struct MemoryArchive {
    records: Mutex<Vec<Tournament>>,
}

impl MemoryArchive {
    pub fn records(&self) -> Vec<Tournament> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Archive for MemoryArchive {
    fn store(&self, tournament: &Tournament) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tournament.clone());
    }
}

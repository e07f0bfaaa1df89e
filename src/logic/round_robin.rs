//! Round-robin schedule by the circle method: every pair meets exactly once.

use crate::models::{GameMatch, PlayerId, Round, Stage, TournamentError};

/// Generate every round up front.
///
/// With an odd field a phantom slot is added; whoever draws it sits the round out
/// (no match is created), so the schedule holds exactly n*(n-1)/2 matches.
pub fn schedule(players: &[PlayerId]) -> Result<Vec<Round>, TournamentError> {
    if players.len() < 2 {
        return Err(TournamentError::NotEnoughPlayers {
            required: 2,
            actual: players.len(),
        });
    }
    let mut slots: Vec<Option<PlayerId>> = players.iter().copied().map(Some).collect();
    if slots.len() % 2 == 1 {
        slots.push(None);
    }
    let n = slots.len();

    let mut rounds = Vec::with_capacity(n - 1);
    for r in 0..n - 1 {
        let number = r as u32 + 1;
        let mut matches = Vec::with_capacity(n / 2);
        for i in 0..n / 2 {
            let (mut left, mut right) = (slots[i], slots[n - 1 - i]);
            // The fixed slot alternates sides between rounds.
            if i == 0 && r % 2 == 1 {
                std::mem::swap(&mut left, &mut right);
            }
            if let (Some(a), Some(b)) = (left, right) {
                matches.push(GameMatch::new(number, Stage::RoundRobin, Some(a), Some(b))?);
            }
        }
        rounds.push(Round::new(number, Stage::RoundRobin, matches)?);
        slots[1..].rotate_right(1);
    }
    Ok(rounds)
}

//! Single-elimination bracket: first round with byes, then adjacent winners pair up.

use crate::models::{GameMatch, PlayerId, Round, Stage, TournamentError};

/// Rounds needed to reduce `n` players to one: ceil(log2(n)).
pub fn round_count(n: usize) -> u32 {
    if n <= 1 {
        0
    } else {
        n.next_power_of_two().trailing_zeros()
    }
}

/// Build round 1 from players in seed order.
///
/// The bracket is padded to the next power of two. The top seeds receive the byes;
/// the remaining seeds are paired adjacently, so `[A, B, C, D]` gives `(A, B)` and `(C, D)`.
pub fn first_round(seeded: &[PlayerId]) -> Result<Round, TournamentError> {
    if seeded.len() < 2 {
        return Err(TournamentError::NotEnoughPlayers {
            required: 2,
            actual: seeded.len(),
        });
    }
    let bracket = seeded.len().next_power_of_two();
    let byes = bracket - seeded.len();
    let stage = Stage::for_bracket(bracket);

    let mut matches = Vec::with_capacity(bracket / 2);
    for &player in &seeded[..byes] {
        matches.push(GameMatch::new(1, stage, Some(player), None)?);
    }
    for pair in seeded[byes..].chunks_exact(2) {
        matches.push(GameMatch::new(1, stage, Some(pair[0]), Some(pair[1]))?);
    }
    Round::new(1, stage, matches)
}

/// Pair the previous round's winners in bracket order. An odd player out gets a bye.
pub fn next_round(number: u32, winners: &[PlayerId]) -> Result<Round, TournamentError> {
    if winners.len() < 2 {
        return Err(TournamentError::InvalidState("fewer than two players left to pair"));
    }
    let stage = Stage::for_bracket(winners.len().next_power_of_two());
    let matches = winners
        .chunks(2)
        .map(|pair| GameMatch::new(number, stage, Some(pair[0]), pair.get(1).copied()))
        .collect::<Result<Vec<_>, _>>()?;
    Round::new(number, stage, matches)
}

//! Bracket progression: match results flow in, rounds close, the next round opens,
//! and the tournament completes once the terminal round is done.
//!
//! Every function here mutates a single `Tournament` and is expected to be called from
//! exactly one writer per tournament.

use crate::logic::scoring::ScoreAggregator;
use crate::logic::{single_elimination, standings};
use crate::models::{
    GameMatch, MatchId, Outcome, PlayerId, Round, Status, Tournament, TournamentError,
    TournamentKind,
};
use chrono::{DateTime, Utc};

/// A state transition the rendering layer needs to hear about.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TournamentEvent {
    RoundGenerated {
        round: Round,
    },
    MatchStarted {
        match_id: MatchId,
    },
    MatchCompleted {
        match_id: MatchId,
        winner: Option<PlayerId>,
        left_score: u32,
        right_score: u32,
    },
    TournamentCompleted {
        final_winner: Option<PlayerId>,
    },
    TournamentAborted {
        reason: String,
    },
}

impl TournamentEvent {
    fn completed(m: &GameMatch) -> Self {
        TournamentEvent::MatchCompleted {
            match_id: m.id,
            winner: m.winner,
            left_score: m.left_score,
            right_score: m.right_score,
        }
    }
}

/// Open the first unfinished round: mark it ongoing and resolve its byes.
/// If that already completes the round, advance immediately.
pub fn open_current_round(
    tournament: &mut Tournament,
    now: DateTime<Utc>,
) -> Result<Vec<TournamentEvent>, TournamentError> {
    let idx = tournament
        .current_round_index()
        .ok_or_else(|| TournamentError::Invariant("no round left to open".to_string()))?;
    let round = &mut tournament.rounds[idx];
    round.open(now);

    let mut byes = Vec::new();
    for m in round.matches.iter_mut().filter(|m| m.is_bye() && !m.is_completed()) {
        m.complete_bye(now)?;
        byes.push(TournamentEvent::completed(m));
    }
    log::info!(
        "Round {} ({:?}) of tournament {} opened with {} match(es), {} bye(s)",
        round.number,
        round.stage,
        tournament.room_id,
        round.matches.len(),
        byes.len()
    );

    let mut events = vec![TournamentEvent::RoundGenerated {
        round: round.clone(),
    }];
    events.extend(byes);
    if round.is_complete() {
        events.extend(advance(tournament, now)?);
    }
    Ok(events)
}

/// Record that a match of the current round went live.
pub fn mark_match_started(
    tournament: &mut Tournament,
    match_id: MatchId,
    now: DateTime<Utc>,
) -> Result<TournamentEvent, TournamentError> {
    let m = current_match_mut(tournament, match_id)?;
    m.start(now)?;
    Ok(TournamentEvent::MatchStarted { match_id })
}

/// Fold a completed match into the tournament, advancing when it was the last one outstanding.
pub fn record_match_result(
    tournament: &mut Tournament,
    completed: &GameMatch,
    now: DateTime<Utc>,
) -> Result<Vec<TournamentEvent>, TournamentError> {
    let aggregator = ScoreAggregator::new(tournament.scoring);
    let kind = tournament.kind;
    let scores = tournament.scores.clone();

    let stored = current_match_mut(tournament, completed.id)?;
    if stored.is_completed() {
        return Err(TournamentError::AlreadyCompleted(completed.id));
    }
    if stored.left != completed.left || stored.right != completed.right {
        return Err(TournamentError::Invariant(format!(
            "slots of match {} changed during play",
            completed.id
        )));
    }
    let result = aggregator.record_completion(kind, completed, &scores)?;
    *stored = completed.clone();
    tournament.scores = result.scores;

    let mut events = vec![TournamentEvent::completed(completed)];
    let round_done = tournament
        .current_round()
        .is_some_and(Round::is_complete);
    if round_done {
        events.extend(advance(tournament, now)?);
    }
    Ok(events)
}

/// Close the current round once every match in it is completed, then either open the
/// next round or decide the tournament.
pub fn advance(
    tournament: &mut Tournament,
    now: DateTime<Utc>,
) -> Result<Vec<TournamentEvent>, TournamentError> {
    if tournament.status != Status::Ongoing {
        return Err(TournamentError::InvalidState("tournament is not ongoing"));
    }
    let idx = tournament
        .current_round_index()
        .ok_or(TournamentError::InvalidState("no round in progress"))?;
    if !tournament.rounds[idx].is_complete() {
        return Err(TournamentError::InvalidState("round still has matches outstanding"));
    }
    let round = &mut tournament.rounds[idx];
    round.refresh_status(now);
    log::info!(
        "Round {} of tournament {} completed, {} advancing",
        round.number,
        tournament.room_id,
        round.winners.len()
    );
    let number = round.number;
    let winners = round.winners.clone();

    match tournament.kind {
        TournamentKind::SingleElimination => match winners.as_slice() {
            [] => complete_tournament(tournament, None, now),
            [winner] => complete_tournament(tournament, Some(*winner), now),
            _ => {
                let next = single_elimination::next_round(number + 1, &winners)?;
                tournament.rounds.push(next);
                open_current_round(tournament, now)
            }
        },
        TournamentKind::RoundRobin => {
            if idx + 1 < tournament.rounds.len() {
                open_current_round(tournament, now)
            } else {
                let leader = standings::leader(tournament);
                complete_tournament(tournament, leader, now)
            }
        }
    }
}

/// Cancel the tournament: every unfinished match becomes a no-contest and no winner is set.
pub fn abort_tournament(
    tournament: &mut Tournament,
    reason: impl Into<String>,
    now: DateTime<Utc>,
) -> Result<Vec<TournamentEvent>, TournamentError> {
    if tournament.is_completed() {
        return Err(TournamentError::InvalidState("tournament already completed"));
    }
    let reason = reason.into();
    for round in &mut tournament.rounds {
        for m in round.matches.iter_mut().filter(|m| !m.is_completed()) {
            m.complete(Outcome::NoContest, now)?;
        }
        round.refresh_status(now);
    }
    tournament.aborted = true;
    tournament.status = Status::Completed;
    tournament.ended_at = Some(now);
    log::warn!("Tournament {} aborted: {}", tournament.room_id, reason);
    Ok(vec![TournamentEvent::TournamentAborted { reason }])
}

fn complete_tournament(
    tournament: &mut Tournament,
    final_winner: Option<PlayerId>,
    now: DateTime<Utc>,
) -> Result<Vec<TournamentEvent>, TournamentError> {
    if tournament.is_completed() || tournament.final_winner.is_some() {
        return Err(TournamentError::Invariant(format!(
            "final winner of tournament {} decided twice",
            tournament.room_id
        )));
    }
    tournament.final_winner = final_winner;
    tournament.status = Status::Completed;
    tournament.ended_at = Some(now);
    match final_winner.and_then(|id| tournament.username(id)) {
        Some(name) => log::info!("Tournament {} completed, winner {}", tournament.room_id, name),
        None => log::warn!("Tournament {} completed without a winner", tournament.room_id),
    }
    Ok(vec![TournamentEvent::TournamentCompleted { final_winner }])
}

fn current_match_mut(
    tournament: &mut Tournament,
    match_id: MatchId,
) -> Result<&mut GameMatch, TournamentError> {
    if tournament.status != Status::Ongoing {
        return Err(TournamentError::InvalidState("tournament is not ongoing"));
    }
    if tournament.find_match(match_id).is_none() {
        return Err(TournamentError::MatchNotFound(match_id));
    }
    let idx = tournament
        .current_round_index()
        .ok_or(TournamentError::InvalidState("no round in progress"))?;
    tournament.rounds[idx]
        .get_match_mut(match_id)
        .ok_or(TournamentError::InvalidState("match is not part of the current round"))
}

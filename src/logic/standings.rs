//! Standings table and the round-robin winner.
//!
//! Ordering, most significant first:
//! 1. points (descending)
//! 2. head-to-head points among the players level on points (descending)
//! 3. score difference over all matches (descending)
//! 4. username (ascending)
//! 5. player id (ascending)

use crate::logic::scoring::ScoreAggregator;
use crate::models::{GameMatch, PlayerId, Resolution, Standing, Tournament};
use std::cmp::{Ordering, Reverse};
use std::collections::{HashMap, HashSet};

/// Compute the ordered standings from the completed matches of a tournament.
pub fn standings(tournament: &Tournament) -> Vec<Standing> {
    let aggregator = ScoreAggregator::new(tournament.scoring);
    let mut rows: HashMap<PlayerId, Standing> = tournament
        .participants
        .iter()
        .map(|p| (p.id, Standing::for_player(p)))
        .collect();

    let completed: Vec<&GameMatch> = tournament
        .matches()
        .filter(|m| m.is_completed() && m.resolution != Some(Resolution::Bye))
        .collect();

    for m in &completed {
        for player in m.participants() {
            let Some(row) = rows.get_mut(&player) else {
                continue;
            };
            let (own, other) = m.score_of(player).unwrap_or_default();
            row.played += 1;
            row.score_for += own;
            row.score_against += other;
            row.points += aggregator.points_for(m, player).unwrap_or(0);
            match (m.resolution, m.winner) {
                (Some(Resolution::Draw), _) => row.draws += 1,
                (_, Some(w)) if w == player => row.wins += 1,
                _ => row.losses += 1,
            }
        }
    }

    let mut table: Vec<Standing> = rows.into_values().collect();
    table.sort_by_key(|s| Reverse(s.points));

    let mut start = 0;
    while start < table.len() {
        let points = table[start].points;
        let end = table[start..]
            .iter()
            .position(|s| s.points != points)
            .map_or(table.len(), |offset| start + offset);
        if end - start > 1 {
            let group: HashSet<PlayerId> = table[start..end].iter().map(|s| s.player_id).collect();
            let h2h = head_to_head(&aggregator, &completed, &group);
            table[start..end].sort_by(|a, b| tie_break(a, b, &h2h));
        }
        start = end;
    }
    table
}

/// Player with the best standing, if anyone is entered at all.
pub fn leader(tournament: &Tournament) -> Option<PlayerId> {
    standings(tournament).first().map(|s| s.player_id)
}

/// Points each player in `group` earned in matches against other members of `group`.
fn head_to_head(
    aggregator: &ScoreAggregator,
    completed: &[&GameMatch],
    group: &HashSet<PlayerId>,
) -> HashMap<PlayerId, u32> {
    let mut points = HashMap::new();
    for m in completed {
        let inside = m.participants().filter(|p| group.contains(p)).count();
        if inside != 2 {
            continue;
        }
        for player in m.participants() {
            *points.entry(player).or_insert(0) += aggregator.points_for(m, player).unwrap_or(0);
        }
    }
    points
}

fn tie_break(a: &Standing, b: &Standing, h2h: &HashMap<PlayerId, u32>) -> Ordering {
    let h2h_of = |s: &Standing| h2h.get(&s.player_id).copied().unwrap_or(0);
    h2h_of(b)
        .cmp(&h2h_of(a))
        .then_with(|| b.score_difference().cmp(&a.score_difference()))
        .then_with(|| a.username.cmp(&b.username))
        .then_with(|| a.player_id.cmp(&b.player_id))
}

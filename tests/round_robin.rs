//! Integration tests for round-robin schedules, standings and the final winner.

use chrono::Utc;
use match_arena::logic::round_robin;
use match_arena::{
    create_tournament, record_match_result, standings, start_tournament, Outcome, Player, PlayerId,
    Resolution, ScoringRules, Seeding, Status, Tournament, TournamentConfig, TournamentKind,
};
use std::collections::HashSet;

fn config(names: &[&str]) -> TournamentConfig {
    TournamentConfig {
        name: "League".to_string(),
        kind: TournamentKind::RoundRobin,
        participants: names.iter().map(|n| Player::new(*n)).collect(),
        seed: Seeding::AsListed,
        scoring: ScoringRules {
            win_points: 3,
            draw_points: 1,
            loss_points: 0,
        },
    }
}

fn name_of(t: &Tournament, id: PlayerId) -> &str {
    t.username(id).unwrap()
}

/// Play every round in order, deciding each match with `result(left_name, right_name)`.
fn play_out(t: &mut Tournament, result: impl Fn(&str, &str) -> Outcome) {
    start_tournament(t, true, Utc::now()).unwrap();
    while !t.is_completed() {
        let open: Vec<_> = t
            .current_round()
            .unwrap()
            .matches
            .iter()
            .filter(|m| !m.is_completed())
            .cloned()
            .collect();
        for mut m in open {
            let outcome = result(
                name_of(t, m.left.unwrap()),
                name_of(t, m.right.unwrap()),
            );
            m.complete(outcome, Utc::now()).unwrap();
            record_match_result(t, &m, Utc::now()).unwrap();
        }
    }
}

#[test]
fn every_pair_meets_exactly_once() {
    for n in 2..=9usize {
        let ids: Vec<PlayerId> = (0..n).map(|_| uuid::Uuid::new_v4()).collect();
        let rounds = round_robin::schedule(&ids).unwrap();
        let mut pairs = HashSet::new();
        let mut total = 0;
        for round in &rounds {
            let mut busy = HashSet::new();
            for m in &round.matches {
                let (a, b) = (m.left.unwrap(), m.right.unwrap());
                assert_ne!(a, b);
                assert!(busy.insert(a) && busy.insert(b), "player twice in one round");
                assert!(pairs.insert(if a < b { (a, b) } else { (b, a) }), "pair repeated");
                total += 1;
            }
        }
        assert_eq!(total, n * (n - 1) / 2, "n = {n}");
        assert_eq!(pairs.len(), n * (n - 1) / 2);
    }
}

#[test]
fn schedule_is_generated_up_front() {
    let t = create_tournament(config(&["A", "B", "C", "D"])).unwrap();
    assert_eq!(t.rounds.len(), 3);
    assert!(t.rounds.iter().all(|r| r.matches.len() == 2));
    assert_eq!(t.matches().count(), 6);
}

#[test]
fn three_way_cycle_is_broken_by_username() {
    // A beats B, B beats C, C beats A, all 1-0: level on points, head-to-head and difference.
    let beats = |x: &str, y: &str| matches!((x, y), ("A", "B") | ("B", "C") | ("C", "A"));
    let mut t = create_tournament(config(&["B", "C", "A"])).unwrap();
    play_out(&mut t, |l, r| {
        if beats(l, r) {
            Outcome::Scored { left: 1, right: 0 }
        } else {
            Outcome::Scored { left: 0, right: 1 }
        }
    });

    assert_eq!(t.status, Status::Completed);
    let table = standings(&t);
    let order: Vec<&str> = table.iter().map(|s| s.username.as_str()).collect();
    assert_eq!(order, ["A", "B", "C"]);
    assert!(table.iter().all(|s| s.points == 3 && s.wins == 1 && s.losses == 1));
    assert_eq!(t.final_winner.map(|id| name_of(&t, id)), Some("A"));
    assert!(t.scores.values().all(|&p| p == 3));
}

#[test]
fn head_to_head_beats_score_difference() {
    // A beats B and C, loses to D. B loses to A, thrashes C and D. C and D draw.
    // A and B finish on 6 points; B has the better difference but lost to A.
    let mut t = create_tournament(config(&["A", "B", "C", "D"])).unwrap();
    play_out(&mut t, |l, r| {
        let (left, right) = match (l, r) {
            ("A", "B") | ("A", "C") | ("D", "A") => (1, 0),
            ("B", "A") | ("C", "A") | ("A", "D") => (0, 1),
            ("B", _) => (9, 0),
            (_, "B") => (0, 9),
            _ => (1, 1),
        };
        Outcome::Scored { left, right }
    });
    let table = standings(&t);
    let a = table.iter().find(|s| s.username == "A").unwrap();
    let b = table.iter().find(|s| s.username == "B").unwrap();
    assert_eq!(a.points, b.points);
    assert!(b.score_difference() > a.score_difference());
    let pos = |name: &str| table.iter().position(|s| s.username == name).unwrap();
    assert!(pos("A") < pos("B"));
}

#[test]
fn draws_earn_draw_points() {
    let mut t = create_tournament(config(&["A", "B"])).unwrap();
    play_out(&mut t, |_, _| Outcome::Scored { left: 2, right: 2 });
    let m = t.matches().next().unwrap();
    assert_eq!(m.resolution, Some(Resolution::Draw));
    assert_eq!(m.winner, None);
    let table = standings(&t);
    assert!(table.iter().all(|s| s.points == 1 && s.draws == 1));
    // Level on everything: username decides.
    assert_eq!(t.final_winner.map(|id| name_of(&t, id)), Some("A"));
}

#[test]
fn odd_field_sits_one_player_out_per_round() {
    let t = create_tournament(config(&["A", "B", "C", "D", "E"])).unwrap();
    assert_eq!(t.rounds.len(), 5);
    assert_eq!(t.matches().count(), 10);
    assert!(t.rounds.iter().all(|r| r.matches.len() == 2));
}

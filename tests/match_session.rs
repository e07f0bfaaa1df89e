//! Integration tests for a single match session: lifecycle, input and the simulation.

use chrono::Utc;
use match_arena::session::PADDLE_HEIGHT;
use match_arena::{
    GameMatch, InputEvent, Key, MatchSession, Outcome, SessionError, SimulationConfig, Stage,
    Status, TournamentError,
};
use uuid::Uuid;

fn game() -> GameMatch {
    GameMatch::new(1, Stage::Finals, Some(Uuid::new_v4()), Some(Uuid::new_v4())).unwrap()
}

fn sim(points_to_win: u32, max_ticks: Option<u64>) -> SimulationConfig {
    SimulationConfig {
        points_to_win,
        max_ticks,
        tick_ms: 50,
    }
}

fn started(allow_draw: bool, config: SimulationConfig) -> MatchSession {
    let mut session = MatchSession::new(game(), config, allow_draw);
    session.start(Utc::now()).unwrap();
    session
}

#[test]
fn key_names_map_to_directions() {
    assert_eq!(Key::parse("ArrowUp").unwrap(), Key::Up);
    assert_eq!(Key::parse("w").unwrap(), Key::Up);
    assert_eq!(Key::parse("S").unwrap(), Key::Down);
    assert_eq!(
        Key::parse("Space").unwrap_err(),
        SessionError::UnknownKey("Space".to_string())
    );
}

#[test]
fn start_is_only_allowed_once() {
    let mut session = started(false, SimulationConfig::default());
    let id = session.id();
    assert_eq!(session.start(Utc::now()).unwrap_err(), SessionError::AlreadyStarted(id));
}

#[test]
fn tick_requires_a_started_match() {
    let mut session = MatchSession::new(game(), SimulationConfig::default(), false);
    let id = session.id();
    assert_eq!(session.tick().unwrap_err(), SessionError::NotStarted(id));
}

#[test]
fn input_is_rejected_from_outsiders_and_before_start() {
    let g = game();
    let player = g.left.unwrap();
    let mut session = MatchSession::new(g, SimulationConfig::default(), false);
    assert!(matches!(
        session.apply_input(player, InputEvent::KeyDown(Key::Up)),
        Err(SessionError::InvalidInput { .. })
    ));
    session.start(Utc::now()).unwrap();
    assert!(matches!(
        session.apply_input(Uuid::new_v4(), InputEvent::KeyDown(Key::Up)),
        Err(SessionError::InvalidInput { .. })
    ));
    session.apply_input(player, InputEvent::KeyDown(Key::Up)).unwrap();
}

#[test]
fn held_key_moves_the_paddle_until_released() {
    let mut session = started(false, SimulationConfig::default());
    let left = session.game().left.unwrap();
    let before = session.snapshot().left_paddle;

    session.apply_input(left, InputEvent::KeyDown(Key::Up)).unwrap();
    let one = session.tick().unwrap();
    let two = session.tick().unwrap();
    assert!(one.left_paddle < before);
    assert!(two.left_paddle < one.left_paddle);
    assert_eq!(two.right_paddle, before);

    session.apply_input(left, InputEvent::KeyUp(Key::Up)).unwrap();
    let three = session.tick().unwrap();
    assert_eq!(three.left_paddle, two.left_paddle);

    // Paddles stop at the wall.
    session.apply_input(left, InputEvent::KeyDown(Key::Up)).unwrap();
    for _ in 0..100 {
        session.tick().unwrap();
    }
    assert_eq!(session.snapshot().left_paddle, PADDLE_HEIGHT / 2);
}

#[test]
fn inputs_from_both_players_apply_on_the_same_tick() {
    let mut session = started(false, SimulationConfig::default());
    let (left, right) = (session.game().left.unwrap(), session.game().right.unwrap());
    let before = session.snapshot();

    session.apply_input(left, InputEvent::KeyDown(Key::Up)).unwrap();
    session.apply_input(right, InputEvent::KeyDown(Key::Down)).unwrap();
    let after = session.tick().unwrap();
    assert_eq!(after.tick, before.tick + 1);
    assert!(after.left_paddle < before.left_paddle);
    assert!(after.right_paddle > before.right_paddle);
}

#[test]
fn ticks_are_deterministic() {
    let g = game();
    let (left, right) = (g.left.unwrap(), g.right.unwrap());
    let mut a = MatchSession::new(g.clone(), SimulationConfig::default(), false);
    let mut b = MatchSession::new(g, SimulationConfig::default(), false);
    let now = Utc::now();
    a.start(now).unwrap();
    b.start(now).unwrap();

    let script = |tick: u64| match tick % 90 {
        0 => Some((left, InputEvent::KeyDown(Key::Down))),
        20 => Some((right, InputEvent::KeyDown(Key::Up))),
        45 => Some((left, InputEvent::KeyUp(Key::Down))),
        60 => Some((right, InputEvent::KeyDown(Key::Down))),
        _ => None,
    };
    for tick in 0..600 {
        if let Some((player, event)) = script(tick) {
            a.apply_input(player, event).unwrap();
            b.apply_input(player, event).unwrap();
        }
        assert_eq!(a.tick().unwrap(), b.tick().unwrap());
    }
}

#[test]
fn snapshots_count_ticks_and_time() {
    let mut session = started(false, sim(5, None));
    for _ in 0..10 {
        session.tick().unwrap();
    }
    let snapshot = session.snapshot();
    assert_eq!(snapshot.tick, 10);
    assert_eq!(snapshot.elapsed_ms, 500);
    assert_eq!(snapshot.status, Status::Ongoing);
}

#[test]
fn unattended_rally_is_won_by_the_server_side() {
    let mut session = started(false, sim(1, None));
    let mut decided = None;
    for _ in 0..1_000 {
        session.tick().unwrap();
        decided = session.decided();
        if decided.is_some() {
            break;
        }
    }
    assert_eq!(decided, Some(Outcome::Scored { left: 1, right: 0 }));
}

#[test]
fn time_limit_draw_only_when_allowed() {
    let mut league = started(true, sim(5, Some(1)));
    assert_eq!(league.decided(), None);
    league.tick().unwrap();
    assert_eq!(league.decided(), Some(Outcome::Scored { left: 0, right: 0 }));

    // Elimination plays on to a golden point.
    let mut cup = started(false, sim(5, Some(1)));
    cup.tick().unwrap();
    assert_eq!(cup.decided(), None);
}

#[test]
fn end_is_idempotent() {
    let mut session = started(false, SimulationConfig::default());
    let left = session.game().left.unwrap();
    let terminal = session
        .end(Outcome::Forfeit { winner: left }, Utc::now())
        .unwrap()
        .unwrap();
    assert_eq!(terminal.status, Status::Completed);
    assert_eq!(terminal.winner, Some(left));
    assert_eq!(session.end(Outcome::NoContest, Utc::now()).unwrap(), None);
    assert_eq!(session.game().winner, Some(left));
    assert!(matches!(
        session.apply_input(left, InputEvent::KeyDown(Key::Up)),
        Err(SessionError::InvalidInput { .. })
    ));
}

#[test]
fn end_with_tie_requires_draws() {
    let mut session = started(false, SimulationConfig::default());
    assert_eq!(
        session.end(Outcome::Scored { left: 2, right: 2 }, Utc::now()).unwrap_err(),
        SessionError::Tournament(TournamentError::DrawNotAllowed)
    );
    assert!(!session.is_completed());
    let terminal = session
        .end(Outcome::Scored { left: 3, right: 2 }, Utc::now())
        .unwrap()
        .unwrap();
    assert_eq!((terminal.left_score, terminal.right_score), (3, 2));
    assert_eq!(terminal.winner, session.game().left);
}

#[test]
fn pending_match_can_end_without_playing() {
    let mut session = MatchSession::new(game(), SimulationConfig::default(), false);
    let terminal = session.end(Outcome::NoContest, Utc::now()).unwrap().unwrap();
    assert_eq!(terminal.tick, 0);
    assert_eq!(terminal.winner, None);
    assert!(session.is_completed());
}

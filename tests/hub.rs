//! End-to-end tests for the orchestration hub on virtual time: lobby timeouts, forfeits,
//! played matches, operator results, aborts and typed rejections.

use match_arena::{
    ClientMessage, EngineConfig, EngineError, ErrorKind, Hub, MatchId, MemoryArchive, Outcome,
    Player, PlayerId, Profile, Resolution, Seeding, ServerMessage, SimulationConfig, Status,
    Tournament, TournamentConfig, TournamentError, TournamentId, TournamentKind,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn engine(points_to_win: u32) -> EngineConfig {
    EngineConfig {
        simulation: SimulationConfig {
            points_to_win,
            max_ticks: None,
            tick_ms: 50,
        },
        grace_period: Duration::from_secs(10),
        join_timeout: Duration::from_secs(30),
        outbound_capacity: 64,
    }
}

fn config(kind: TournamentKind, names: &[&str]) -> TournamentConfig {
    TournamentConfig {
        name: "Arena night".to_string(),
        kind,
        participants: names.iter().map(|n| Player::new(*n)).collect(),
        seed: Seeding::AsListed,
        scoring: Default::default(),
    }
}

fn profile(t: &Tournament, name: &str) -> Profile {
    t.participants
        .iter()
        .find(|p| p.username == name)
        .unwrap()
        .profile()
}

fn first_match(hub: &Hub, id: TournamentId) -> MatchId {
    hub.tournament(id).unwrap().rounds[0].matches[0].id
}

/// Keep a client's queue empty so it is never dropped as a slow consumer.
fn drain(mut rx: mpsc::Receiver<ServerMessage>) {
    tokio::spawn(async move { while rx.recv().await.is_some() {} });
}

async fn until(hub: &Hub, id: TournamentId, done: impl FnMut(&Tournament) -> bool) -> Tournament {
    let mut rx = hub.watch(id).unwrap();
    let snapshot = tokio::time::timeout(Duration::from_secs(600), rx.wait_for(done))
        .await
        .expect("tournament did not reach the expected state")
        .unwrap()
        .clone();
    snapshot
}

async fn next_matching(
    rx: &mut mpsc::Receiver<ServerMessage>,
    want: impl Fn(&ServerMessage) -> bool,
) -> ServerMessage {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(600), rx.recv())
            .await
            .expect("message did not arrive")
            .unwrap();
        if want(&message) {
            return message;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn start_requires_readiness_unless_forced() {
    let hub = Hub::new(engine(1000));
    let t = hub
        .create_tournament(config(TournamentKind::SingleElimination, &["A", "B"]))
        .unwrap();
    let err = hub.start_tournament(t.room_id, false).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Tournament(TournamentError::PlayersNotReady(2))
    ));
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    for p in &t.participants {
        hub.set_ready(t.room_id, p.id, true).await.unwrap();
    }
    hub.start_tournament(t.room_id, false).await.unwrap();
    assert_eq!(hub.tournament(t.room_id).unwrap().status, Status::Ongoing);
}

#[tokio::test(start_paused = true)]
async fn absent_player_forfeits_after_grace_period() {
    let archive = Arc::new(MemoryArchive::default());
    let hub = Hub::with_archive(engine(1000), archive.clone());
    let t = hub
        .create_tournament(config(TournamentKind::SingleElimination, &["A", "B"]))
        .unwrap();
    hub.start_tournament(t.room_id, true).await.unwrap();
    let match_id = first_match(&hub, t.room_id);

    let (mut a, rx_a) = hub.connect(profile(&t, "A"));
    let (mut b, rx_b) = hub.connect(profile(&t, "B"));
    drain(rx_a);
    drain(rx_b);
    a.handle(ClientMessage::JoinMatch { match_id }).await;
    b.handle(ClientMessage::JoinMatch { match_id }).await;
    a.handle(ClientMessage::StartGame { match_id }).await;
    assert_eq!(
        until(&hub, t.room_id, |t| t.rounds[0].matches[0].status == Status::Ongoing)
            .await
            .status,
        Status::Ongoing
    );

    // B drops out and never comes back.
    drop(b);
    let finished = until(&hub, t.room_id, Tournament::is_completed).await;
    let m = &finished.rounds[0].matches[0];
    assert_eq!(m.resolution, Some(Resolution::Forfeit));
    assert_eq!(m.winner, Some(profile(&t, "A").id));
    assert_eq!(finished.final_winner, Some(profile(&t, "A").id));

    tokio::time::sleep(Duration::from_millis(10)).await;
    let records = archive.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].room_id, t.room_id);
    drop(a);
}

#[tokio::test(start_paused = true)]
async fn reconnect_within_grace_period_keeps_the_match_alive() {
    let hub = Hub::new(engine(1000));
    let t = hub
        .create_tournament(config(TournamentKind::SingleElimination, &["A", "B"]))
        .unwrap();
    hub.start_tournament(t.room_id, true).await.unwrap();
    let match_id = first_match(&hub, t.room_id);

    let (mut a, rx_a) = hub.connect(profile(&t, "A"));
    let (mut b, rx_b) = hub.connect(profile(&t, "B"));
    drain(rx_a);
    drain(rx_b);
    a.handle(ClientMessage::JoinMatch { match_id }).await;
    b.handle(ClientMessage::JoinMatch { match_id }).await;
    a.handle(ClientMessage::StartGame { match_id }).await;

    drop(b);
    tokio::time::sleep(Duration::from_secs(5)).await;
    let (mut b, rx_b) = hub.connect(profile(&t, "B"));
    drain(rx_b);
    b.handle(ClientMessage::JoinMatch { match_id }).await;
    tokio::time::sleep(Duration::from_secs(20)).await;

    let snapshot = hub.tournament(t.room_id).unwrap();
    assert_eq!(snapshot.rounds[0].matches[0].status, Status::Ongoing);
    assert_eq!(snapshot.status, Status::Ongoing);
    drop((a, b));
}

#[tokio::test(start_paused = true)]
async fn lobby_timeout_forfeits_to_the_only_player_present() {
    let hub = Hub::new(engine(1000));
    let t = hub
        .create_tournament(config(TournamentKind::SingleElimination, &["A", "B"]))
        .unwrap();
    hub.start_tournament(t.room_id, true).await.unwrap();
    let match_id = first_match(&hub, t.room_id);

    let (mut b, rx_b) = hub.connect(profile(&t, "B"));
    drain(rx_b);
    b.handle(ClientMessage::JoinMatch { match_id }).await;

    let finished = until(&hub, t.room_id, Tournament::is_completed).await;
    assert_eq!(finished.final_winner, Some(profile(&t, "B").id));
    assert_eq!(
        finished.rounds[0].matches[0].resolution,
        Some(Resolution::Forfeit)
    );
    drop(b);
}

#[tokio::test(start_paused = true)]
async fn lobby_timeout_with_nobody_is_a_no_contest() {
    let hub = Hub::new(engine(1000));
    let t = hub
        .create_tournament(config(TournamentKind::SingleElimination, &["A", "B"]))
        .unwrap();
    hub.start_tournament(t.room_id, true).await.unwrap();

    let finished = until(&hub, t.room_id, Tournament::is_completed).await;
    assert_eq!(finished.rounds[0].matches[0].resolution, Some(Resolution::NoContest));
    assert_eq!(finished.final_winner, None);
    assert!(!finished.aborted);
}

#[tokio::test(start_paused = true)]
async fn forfeit_winner_advances_to_the_next_round() {
    let hub = Hub::new(engine(1000));
    let t = hub
        .create_tournament(config(
            TournamentKind::SingleElimination,
            &["A", "B", "C", "D"],
        ))
        .unwrap();
    hub.start_tournament(t.room_id, true).await.unwrap();
    let round1: Vec<MatchId> = hub.tournament(t.room_id).unwrap().rounds[0]
        .matches
        .iter()
        .map(|m| m.id)
        .collect();

    let (mut a, rx_a) = hub.connect(profile(&t, "A"));
    let (mut b, rx_b) = hub.connect(profile(&t, "B"));
    drain(rx_a);
    drain(rx_b);
    a.handle(ClientMessage::JoinMatch { match_id: round1[0] }).await;
    b.handle(ClientMessage::JoinMatch { match_id: round1[0] }).await;
    a.handle(ClientMessage::StartGame { match_id: round1[0] }).await;
    hub.report_result(t.room_id, round1[1], Outcome::Scored { left: 1, right: 2 })
        .await
        .unwrap();

    drop(b);
    let snapshot = until(&hub, t.room_id, |t| t.rounds.len() == 2).await;
    let forfeited = &snapshot.rounds[0].matches[0];
    assert_eq!(forfeited.resolution, Some(Resolution::Forfeit));
    assert_eq!(forfeited.winner, Some(profile(&t, "A").id));
    let final_match = &snapshot.rounds[1].matches[0];
    assert_eq!(final_match.left, Some(profile(&t, "A").id));
    assert_eq!(final_match.right, Some(profile(&t, "D").id));
    assert_eq!(snapshot.status, Status::Ongoing);
    drop(a);
}

#[tokio::test(start_paused = true)]
async fn input_before_the_match_starts_is_rejected() {
    let hub = Hub::new(engine(1000));
    let t = hub
        .create_tournament(config(TournamentKind::SingleElimination, &["A", "B"]))
        .unwrap();
    hub.start_tournament(t.room_id, true).await.unwrap();
    let match_id = first_match(&hub, t.room_id);
    let me = profile(&t, "B");
    let (mut b, mut rx) = hub.connect(me.clone());
    b.handle(ClientMessage::JoinMatch { match_id }).await;
    assert!(matches!(
        rx.try_recv().unwrap(),
        ServerMessage::InitialState { .. }
    ));

    b.handle(ClientMessage::Keydown {
        key: "ArrowUp".to_string(),
        match_id,
        user_id: me.id,
    })
    .await;
    assert!(matches!(
        rx.try_recv().unwrap(),
        ServerMessage::Error {
            code: ErrorKind::InvalidState,
            ..
        }
    ));
    assert_eq!(
        hub.tournament(t.room_id).unwrap().rounds[0].matches[0].status,
        Status::Pending
    );
}

#[tokio::test(start_paused = true)]
async fn scheduled_round_robin_matches_can_be_joined_early() {
    let hub = Hub::new(engine(1000));
    let t = hub
        .create_tournament(config(TournamentKind::RoundRobin, &["A", "B", "C", "D"]))
        .unwrap();
    let later = t.rounds.last().unwrap().matches[0].clone();
    let player = t
        .participants
        .iter()
        .find(|p| Some(p.id) == later.left)
        .unwrap()
        .profile();

    let (mut conn, mut rx) = hub.connect(player);
    conn.handle(ClientMessage::JoinMatch { match_id: later.id }).await;
    match rx.try_recv().unwrap() {
        ServerMessage::InitialState {
            match_id,
            player1,
            player2,
        } => {
            assert_eq!(match_id, later.id);
            assert_eq!(player1.map(|p| p.id), later.left);
            assert_eq!(player2.map(|p| p.id), later.right);
        }
        other => panic!("expected the initial state, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn played_match_ends_at_points_to_win() {
    let hub = Hub::new(engine(2));
    let t = hub
        .create_tournament(config(TournamentKind::SingleElimination, &["A", "B"]))
        .unwrap();
    let (mut a, mut rx_a) = hub.connect(profile(&t, "A"));
    a.handle(ClientMessage::JoinRoom {
        tournament_id: t.room_id,
    })
    .await;
    hub.start_tournament(t.room_id, true).await.unwrap();
    let match_id = first_match(&hub, t.room_id);
    let (mut b, rx_b) = hub.connect(profile(&t, "B"));
    drain(rx_b);

    a.handle(ClientMessage::JoinMatch { match_id }).await;
    b.handle(ClientMessage::JoinMatch { match_id }).await;
    let initial =
        next_matching(&mut rx_a, |m| matches!(m, ServerMessage::InitialState { .. })).await;
    assert_eq!(
        initial,
        ServerMessage::InitialState {
            match_id,
            player1: Some(profile(&t, "A")),
            player2: Some(profile(&t, "B")),
        }
    );
    a.handle(ClientMessage::StartGame { match_id }).await;

    let ended = next_matching(&mut rx_a, |m| matches!(m, ServerMessage::GameEnded { .. })).await;
    assert_eq!(
        ended,
        ServerMessage::GameEnded {
            match_id,
            winner: Some(profile(&t, "A").id),
            left_score: 2,
            right_score: 0,
        }
    );
    let completed =
        next_matching(&mut rx_a, |m| matches!(m, ServerMessage::TournamentCompleted { .. })).await;
    assert_eq!(
        completed,
        ServerMessage::TournamentCompleted {
            tournament_id: t.room_id,
            final_winner: Some(profile(&t, "A").id),
        }
    );
    drop((a, b));
}

#[tokio::test(start_paused = true)]
async fn operator_results_drive_a_four_player_bracket() {
    let hub = Hub::new(engine(1000));
    let t = hub
        .create_tournament(config(
            TournamentKind::SingleElimination,
            &["A", "B", "C", "D"],
        ))
        .unwrap();
    hub.start_tournament(t.room_id, true).await.unwrap();
    let round1: Vec<MatchId> = hub.tournament(t.room_id).unwrap().rounds[0]
        .matches
        .iter()
        .map(|m| m.id)
        .collect();

    let tie = hub
        .report_result(t.room_id, round1[0], Outcome::Scored { left: 1, right: 1 })
        .await
        .unwrap_err();
    assert_eq!(tie.kind(), ErrorKind::InvalidState);

    hub.report_result(t.room_id, round1[0], Outcome::Scored { left: 3, right: 1 })
        .await
        .unwrap();
    hub.report_result(t.room_id, round1[1], Outcome::Scored { left: 1, right: 2 })
        .await
        .unwrap();
    let snapshot = until(&hub, t.room_id, |t| t.rounds.len() == 2).await;
    let final_match = snapshot.rounds[1].matches[0].clone();
    assert_eq!(final_match.left, Some(profile(&t, "A").id));
    assert_eq!(final_match.right, Some(profile(&t, "D").id));

    hub.report_result(t.room_id, final_match.id, Outcome::Scored { left: 5, right: 2 })
        .await
        .unwrap();
    let finished = until(&hub, t.room_id, Tournament::is_completed).await;
    assert_eq!(finished.final_winner, Some(profile(&t, "A").id));
    assert_eq!(finished.rounds.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn abort_cancels_matches_and_notifies_the_room() {
    let archive = Arc::new(MemoryArchive::default());
    let hub = Hub::with_archive(engine(1000), archive.clone());
    let t = hub
        .create_tournament(config(TournamentKind::RoundRobin, &["A", "B", "C", "D"]))
        .unwrap();
    let (mut watcher, mut rx) = hub.connect(Profile::new(uuid::Uuid::new_v4(), "observer"));
    watcher
        .handle(ClientMessage::JoinRoom {
            tournament_id: t.room_id,
        })
        .await;
    hub.start_tournament(t.room_id, true).await.unwrap();
    next_matching(&mut rx, |m| matches!(m, ServerMessage::RoundGenerated { .. })).await;

    hub.abort_tournament(t.room_id, "venue closed").await.unwrap();
    let aborted =
        next_matching(&mut rx, |m| matches!(m, ServerMessage::TournamentAborted { .. })).await;
    assert_eq!(
        aborted,
        ServerMessage::TournamentAborted {
            tournament_id: t.room_id,
            reason: "venue closed".to_string(),
        }
    );

    let finished = hub.tournament(t.room_id).unwrap();
    assert!(finished.aborted);
    assert_eq!(finished.status, Status::Completed);
    assert_eq!(finished.final_winner, None);
    assert!(finished
        .matches()
        .all(|m| m.resolution == Some(Resolution::NoContest)));

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(archive.records().len(), 1);
    assert_eq!(hub.registry().subscriber_count(match_arena::Topic::Room(t.room_id)), 0);
    assert!(matches!(
        hub.abort_tournament(t.room_id, "again").await,
        Err(EngineError::Closed(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn client_errors_come_back_typed() {
    let hub = Hub::new(engine(1000));
    let t = hub
        .create_tournament(config(TournamentKind::SingleElimination, &["A", "B", "C", "D"]))
        .unwrap();
    hub.start_tournament(t.room_id, true).await.unwrap();
    let match_id = first_match(&hub, t.room_id);
    let (mut b, mut rx) = hub.connect(profile(&t, "B"));
    let c: PlayerId = profile(&t, "C").id;

    let code_of = |rx: &mut mpsc::Receiver<ServerMessage>| match rx.try_recv().unwrap() {
        ServerMessage::Error { code, .. } => code,
        other => panic!("expected an error, got {other:?}"),
    };

    b.handle_text("{\"action\":\"fly\"}").await;
    assert_eq!(code_of(&mut rx), ErrorKind::Malformed);

    b.handle_text("not json").await;
    assert_eq!(code_of(&mut rx), ErrorKind::Malformed);

    b.handle(ClientMessage::JoinMatch {
        match_id: uuid::Uuid::new_v4(),
    })
    .await;
    assert_eq!(code_of(&mut rx), ErrorKind::NotFound);

    // B is the right slot, so not the controller.
    b.handle(ClientMessage::StartGame { match_id }).await;
    assert_eq!(code_of(&mut rx), ErrorKind::Unauthorized);

    b.handle(ClientMessage::Keydown {
        key: "ArrowUp".to_string(),
        match_id,
        user_id: c,
    })
    .await;
    assert_eq!(code_of(&mut rx), ErrorKind::Unauthorized);

    b.handle(ClientMessage::Keydown {
        key: "Enter".to_string(),
        match_id,
        user_id: profile(&t, "B").id,
    })
    .await;
    assert_eq!(code_of(&mut rx), ErrorKind::Malformed);

    // C is not in the first match.
    let (mut c_conn, mut c_rx) = hub.connect(profile(&t, "C"));
    c_conn.handle(ClientMessage::JoinMatch { match_id }).await;
    assert_eq!(code_of(&mut c_rx), ErrorKind::Unauthorized);

    b.handle(ClientMessage::JoinMatch { match_id }).await;
    assert!(matches!(
        rx.try_recv().unwrap(),
        ServerMessage::InitialState { .. }
    ));
}

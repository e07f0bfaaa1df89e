//! Orchestration: one coordinator task per tournament, one runner task per match,
//! and a `Connection` per client channel.
//!
//! The coordinator is the single writer of its tournament. Runners own their
//! `MatchSession` outright and report back to the coordinator over a channel, so sessions
//! never share mutable state. Readers get the latest tournament through a `watch` channel.

use crate::archive::{Archive, LogArchive};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::logic::{
    abort_tournament, create_tournament, mark_match_started, record_match_result, standings,
    start_tournament, TournamentConfig, TournamentEvent,
};
use crate::models::{
    GameMatch, MatchId, Outcome, PlayerId, Profile, Round, Side, Standing, Status, Tournament,
    TournamentId, TournamentKind,
};
use crate::session::{
    InputEvent, Key, MatchSession, SessionError, SessionRegistry, SubscriptionHandle, Topic,
};
use crate::transport::{self, ClientMessage, ServerMessage};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};

type Reply = oneshot::Sender<Result<(), EngineError>>;

enum CoordinatorCommand {
    Start { force: bool, reply: Reply },
    SetReady { player: PlayerId, ready: bool, reply: Reply },
    MatchStarted { match_id: MatchId, at: DateTime<Utc> },
    MatchCompleted { game: GameMatch },
    Abort { reason: String, reply: Reply },
}

enum SessionCommand {
    Start { reply: Reply },
    Input { player: PlayerId, event: InputEvent },
    Report { outcome: Outcome, reply: Reply },
    Cancel,
}

struct TournamentHandle {
    commands: mpsc::UnboundedSender<CoordinatorCommand>,
    snapshot: watch::Receiver<Tournament>,
}

struct MatchHandle {
    tournament_id: TournamentId,
    left: Option<PlayerId>,
    /// Set by the runner once the lobby is over and ticking has begun.
    started: bool,
    commands: mpsc::UnboundedSender<SessionCommand>,
}

struct HubInner {
    config: EngineConfig,
    registry: SessionRegistry,
    archive: Arc<dyn Archive>,
    tournaments: RwLock<HashMap<TournamentId, TournamentHandle>>,
    /// Matches with a live runner.
    matches: RwLock<HashMap<MatchId, MatchHandle>>,
}

/// Entry point for everything outside the core. Cheap to clone.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl Hub {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_archive(config, Arc::new(LogArchive))
    }

    pub fn with_archive(config: EngineConfig, archive: Arc<dyn Archive>) -> Self {
        Self {
            inner: Arc::new(HubInner {
                config,
                registry: SessionRegistry::new(),
                archive,
                tournaments: RwLock::new(HashMap::new()),
                matches: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.inner.registry
    }

    /// Build the bracket and spawn the tournament's coordinator. Must run inside a Tokio runtime.
    pub fn create_tournament(&self, config: TournamentConfig) -> Result<Tournament, EngineError> {
        let tournament = create_tournament(config)?;
        let id = tournament.room_id;
        let (commands, rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot) = watch::channel(tournament.clone());
        self.registry().register_room(id);
        // Scheduled pairings can be joined before their round opens.
        for game in tournament.matches().filter(|m| m.left.is_some() && m.right.is_some()) {
            self.registry().register_match(id, game);
        }
        write(&self.inner.tournaments).insert(id, TournamentHandle { commands, snapshot });
        tokio::spawn(coordinate(self.clone(), tournament.clone(), rx, snapshot_tx));
        Ok(tournament)
    }

    /// Latest snapshot of a tournament.
    pub fn tournament(&self, id: TournamentId) -> Option<Tournament> {
        read(&self.inner.tournaments)
            .get(&id)
            .map(|h| h.snapshot.borrow().clone())
    }

    /// Receiver that observes every change to the tournament.
    pub fn watch(&self, id: TournamentId) -> Option<watch::Receiver<Tournament>> {
        read(&self.inner.tournaments)
            .get(&id)
            .map(|h| h.snapshot.clone())
    }

    pub fn standings(&self, id: TournamentId) -> Option<Vec<Standing>> {
        self.tournament(id).map(|t| standings(&t))
    }

    pub async fn start_tournament(&self, id: TournamentId, force: bool) -> Result<(), EngineError> {
        self.request(id, |reply| CoordinatorCommand::Start { force, reply })
            .await
    }

    pub async fn set_ready(
        &self,
        id: TournamentId,
        player: PlayerId,
        ready: bool,
    ) -> Result<(), EngineError> {
        self.request(id, |reply| CoordinatorCommand::SetReady {
            player,
            ready,
            reply,
        })
        .await
    }

    /// Cancel the tournament and every match still running in it.
    pub async fn abort_tournament(
        &self,
        id: TournamentId,
        reason: impl Into<String>,
    ) -> Result<(), EngineError> {
        let reason = reason.into();
        self.request(id, |reply| CoordinatorCommand::Abort { reason, reply })
            .await
    }

    /// Start a match. `by` is the acting player; None means an operator.
    pub async fn start_match(
        &self,
        by: Option<PlayerId>,
        match_id: MatchId,
    ) -> Result<(), EngineError> {
        let commands = {
            let matches = read(&self.inner.matches);
            let handle = matches
                .get(&match_id)
                .ok_or_else(|| EngineError::NotFound(format!("running match {match_id}")))?;
            if let Some(player) = by {
                if handle.left != Some(player) {
                    log::warn!(
                        "Player {player} tried to start match {match_id} without controlling it"
                    );
                    return Err(EngineError::Unauthorized(
                        "only the match controller may start the match".to_string(),
                    ));
                }
            }
            handle.commands.clone()
        };
        let (reply, rx) = oneshot::channel();
        commands
            .send(SessionCommand::Start { reply })
            .map_err(|_| not_running(match_id))?;
        rx.await.map_err(|_| not_running(match_id))?
    }

    /// Queue input for the next tick of a running match.
    pub fn send_input(
        &self,
        player: PlayerId,
        match_id: MatchId,
        event: InputEvent,
    ) -> Result<(), EngineError> {
        let matches = read(&self.inner.matches);
        let handle = matches
            .get(&match_id)
            .ok_or_else(|| EngineError::NotFound(format!("running match {match_id}")))?;
        let entry = self.registry().match_entry(match_id);
        if !entry.is_some_and(|e| e.has_player(player)) {
            return Err(SessionError::InvalidInput {
                player,
                reason: "not a participant",
            }
            .into());
        }
        if !handle.started {
            return Err(SessionError::InvalidInput {
                player,
                reason: "match is not in progress",
            }
            .into());
        }
        handle
            .commands
            .send(SessionCommand::Input { player, event })
            .map_err(|_| not_running(match_id))
    }

    /// Operator-reported final result for a running match.
    pub async fn report_result(
        &self,
        tournament_id: TournamentId,
        match_id: MatchId,
        outcome: Outcome,
    ) -> Result<(), EngineError> {
        let commands = {
            let matches = read(&self.inner.matches);
            match matches.get(&match_id) {
                Some(handle) if handle.tournament_id == tournament_id => handle.commands.clone(),
                _ => return Err(EngineError::NotFound(format!("running match {match_id}"))),
            }
        };
        let (reply, rx) = oneshot::channel();
        commands
            .send(SessionCommand::Report { outcome, reply })
            .map_err(|_| not_running(match_id))?;
        rx.await.map_err(|_| not_running(match_id))?
    }

    /// Open a client channel for the given identity.
    pub fn connect(&self, profile: Profile) -> (Connection, mpsc::Receiver<ServerMessage>) {
        let (outbound, rx) = mpsc::channel(self.config().outbound_capacity);
        log::info!("{} ({}) connected", profile.username, profile.id);
        let connection = Connection {
            hub: self.clone(),
            profile,
            outbound,
            subscriptions: HashMap::new(),
        };
        (connection, rx)
    }

    /// Drop finished tournaments that ended longer than `max_age` ago.
    pub fn prune_finished(&self, max_age: Duration) -> usize {
        let now = Utc::now();
        let mut tournaments = write(&self.inner.tournaments);
        let expired: Vec<TournamentId> = tournaments
            .iter()
            .filter(|(_, h)| {
                let t = h.snapshot.borrow();
                t.is_completed()
                    && t.ended_at
                        .and_then(|end| (now - end).to_std().ok())
                        .is_some_and(|age| age >= max_age)
            })
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            tournaments.remove(id);
            self.registry().release_tournament(*id);
        }
        expired.len()
    }

    async fn request(
        &self,
        id: TournamentId,
        build: impl FnOnce(Reply) -> CoordinatorCommand,
    ) -> Result<(), EngineError> {
        let commands = self
            .coordinator(id)
            .ok_or_else(|| EngineError::NotFound(format!("tournament {id}")))?;
        let (reply, rx) = oneshot::channel();
        commands
            .send(build(reply))
            .map_err(|_| EngineError::Closed(id))?;
        rx.await.map_err(|_| EngineError::Closed(id))?
    }

    fn coordinator(&self, id: TournamentId) -> Option<mpsc::UnboundedSender<CoordinatorCommand>> {
        read(&self.inner.tournaments)
            .get(&id)
            .map(|h| h.commands.clone())
    }

    fn initial_state(&self, match_id: MatchId) -> Result<ServerMessage, EngineError> {
        let entry = self
            .registry()
            .match_entry(match_id)
            .ok_or_else(|| EngineError::NotFound(format!("match {match_id}")))?;
        let tournament = self.tournament(entry.tournament_id);
        let profile = |slot: Option<PlayerId>| {
            let id = slot?;
            let username = tournament.as_ref()?.username(id)?.to_string();
            Some(Profile::new(id, username))
        };
        Ok(ServerMessage::InitialState {
            match_id,
            player1: profile(entry.left),
            player2: profile(entry.right),
        })
    }

    /// Turn engine events into room broadcasts, spawning runners for freshly opened rounds.
    fn publish(&self, tournament: &Tournament, events: Vec<TournamentEvent>) {
        let tournament_id = tournament.room_id;
        for event in events {
            let message = match event {
                TournamentEvent::RoundGenerated { round } => {
                    self.spawn_round(tournament, &round);
                    ServerMessage::RoundGenerated {
                        tournament_id,
                        round,
                    }
                }
                TournamentEvent::MatchStarted { match_id } => ServerMessage::MatchStarted {
                    tournament_id,
                    match_id,
                },
                TournamentEvent::MatchCompleted {
                    match_id, winner, ..
                } => ServerMessage::MatchCompleted {
                    tournament_id,
                    match_id,
                    winner,
                },
                TournamentEvent::TournamentCompleted { final_winner } => {
                    ServerMessage::TournamentCompleted {
                        tournament_id,
                        final_winner,
                    }
                }
                TournamentEvent::TournamentAborted { reason } => ServerMessage::TournamentAborted {
                    tournament_id,
                    reason,
                },
            };
            self.registry().broadcast(Topic::Room(tournament_id), &message);
        }
    }

    fn spawn_round(&self, tournament: &Tournament, round: &Round) {
        let Some(coordinator) = self.coordinator(tournament.room_id) else {
            return;
        };
        let allow_draw = tournament.kind == TournamentKind::RoundRobin;
        for game in round
            .matches
            .iter()
            .filter(|m| m.status == Status::Pending && m.left.is_some() && m.right.is_some())
        {
            self.registry().register_match(tournament.room_id, game);
            let (commands, rx) = mpsc::unbounded_channel();
            write(&self.inner.matches).insert(
                game.id,
                MatchHandle {
                    tournament_id: tournament.room_id,
                    left: game.left,
                    started: false,
                    commands,
                },
            );
            let runner = MatchRunner {
                hub: self.clone(),
                session: MatchSession::new(game.clone(), self.config().simulation, allow_draw),
                commands: rx,
                coordinator: coordinator.clone(),
            };
            tokio::spawn(runner.run());
        }
    }

    /// Wind down after the coordinator stops: cancel runners, release an aborted room, archive.
    fn finish_tournament(&self, tournament: &Tournament) {
        let id = tournament.room_id;
        let running: Vec<(MatchId, mpsc::UnboundedSender<SessionCommand>)> =
            read(&self.inner.matches)
                .iter()
                .filter(|(_, h)| h.tournament_id == id)
                .map(|(match_id, h)| (*match_id, h.commands.clone()))
                .collect();
        for (match_id, commands) in running {
            let _ = commands.send(SessionCommand::Cancel);
            if !tournament.aborted {
                continue;
            }
            if let Some(game) = tournament.find_match(match_id) {
                self.registry().broadcast(
                    Topic::Match(match_id),
                    &ServerMessage::GameEnded {
                        match_id,
                        winner: game.winner,
                        left_score: game.left_score,
                        right_score: game.right_score,
                    },
                );
            }
        }
        if tournament.aborted {
            self.registry().release_tournament(id);
        }
        self.inner.archive.store(tournament);
    }

    fn mark_started(&self, match_id: MatchId) {
        if let Some(handle) = write(&self.inner.matches).get_mut(&match_id) {
            handle.started = true;
        }
    }

    fn forget_match(&self, match_id: MatchId) {
        write(&self.inner.matches).remove(&match_id);
    }
}

fn not_running(match_id: MatchId) -> EngineError {
    EngineError::InvalidState(format!("match {match_id} is no longer running"))
}

/// Single writer of one tournament.
async fn coordinate(
    hub: Hub,
    mut tournament: Tournament,
    mut commands: mpsc::UnboundedReceiver<CoordinatorCommand>,
    snapshot: watch::Sender<Tournament>,
) {
    let id = tournament.room_id;
    while let Some(command) = commands.recv().await {
        let now = Utc::now();
        let (result, reply) = match command {
            CoordinatorCommand::Start { force, reply } => {
                (start_tournament(&mut tournament, force, now), Some(reply))
            }
            CoordinatorCommand::SetReady {
                player,
                ready,
                reply,
            } => (
                tournament.set_ready(player, ready).map(|()| Vec::new()),
                Some(reply),
            ),
            CoordinatorCommand::MatchStarted { match_id, at } => (
                mark_match_started(&mut tournament, match_id, at).map(|e| vec![e]),
                None,
            ),
            CoordinatorCommand::MatchCompleted { game } => {
                (record_match_result(&mut tournament, &game, now), None)
            }
            CoordinatorCommand::Abort { reason, reply } => {
                (abort_tournament(&mut tournament, reason, now), Some(reply))
            }
        };
        let result: Result<(), EngineError> = match result {
            Ok(events) => {
                hub.publish(&tournament, events);
                Ok(())
            }
            Err(err) if err.is_fatal() => {
                log::error!("Tournament {id} hit an internal error and is aborted: {err}");
                if let Ok(events) = abort_tournament(&mut tournament, err.to_string(), now) {
                    hub.publish(&tournament, events);
                }
                Err(err.into())
            }
            Err(err) => {
                log::warn!("Tournament {id} rejected a command: {err}");
                Err(err.into())
            }
        };
        snapshot.send_replace(tournament.clone());
        if let Some(reply) = reply {
            let _ = reply.send(result);
        }
        if tournament.is_completed() {
            break;
        }
    }
    hub.finish_tournament(&tournament);
}

/// Owns one `MatchSession` for its whole life.
struct MatchRunner {
    hub: Hub,
    session: MatchSession,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    coordinator: mpsc::UnboundedSender<CoordinatorCommand>,
}

enum Lobby {
    Started,
    Concluded,
    Cancelled,
}

impl MatchRunner {
    async fn run(mut self) {
        let match_id = self.session.id();
        match self.lobby().await {
            Lobby::Started => self.play().await,
            Lobby::Concluded | Lobby::Cancelled => {}
        }
        self.hub.forget_match(match_id);
    }

    /// Wait, bounded by the join timeout, for the match to be started.
    async fn lobby(&mut self) -> Lobby {
        let deadline = Instant::now() + self.hub.config().join_timeout;
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    None | Some(SessionCommand::Cancel) => return Lobby::Cancelled,
                    Some(SessionCommand::Start { reply }) => {
                        let result = self.begin();
                        let started = result.is_ok();
                        let _ = reply.send(result);
                        if started {
                            return Lobby::Started;
                        }
                    }
                    Some(SessionCommand::Input { player, .. }) => {
                        let match_id = self.session.id();
                        log::debug!("Input from {player} raced the start of match {match_id}");
                    }
                    Some(SessionCommand::Report { outcome, reply }) => {
                        let result = self.conclude(outcome);
                        let done = result.is_ok();
                        let _ = reply.send(result);
                        if done {
                            return Lobby::Concluded;
                        }
                    }
                },
                () = tokio::time::sleep_until(deadline) => {
                    return self.resolve_lobby_timeout();
                }
            }
        }
    }

    fn resolve_lobby_timeout(&mut self) -> Lobby {
        let [left, right] = self.presence();
        let match_id = self.session.id();
        let (left_id, right_id) = (self.session.game().left, self.session.game().right);
        let outcome = match (left, right) {
            (true, true) => {
                log::info!("Match {match_id} not started in time, starting it");
                return match self.begin() {
                    Ok(()) => Lobby::Started,
                    Err(err) => {
                        log::error!("Could not start match {match_id}: {err}");
                        Lobby::Cancelled
                    }
                };
            }
            (true, false) => left_id.map(|winner| Outcome::Forfeit { winner }),
            (false, true) => right_id.map(|winner| Outcome::Forfeit { winner }),
            (false, false) => None,
        };
        let outcome = outcome.unwrap_or(Outcome::NoContest);
        log::info!("Match {match_id} timed out waiting for players: {outcome:?}");
        if let Err(err) = self.conclude(outcome) {
            log::error!("Could not resolve match {match_id}: {err}");
        }
        Lobby::Concluded
    }

    /// Tick until the match is decided, forfeited, reported or cancelled.
    async fn play(&mut self) {
        let mut ticker = tokio::time::interval(self.hub.config().tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut absent_since: [Option<Instant>; 2] = [None; 2];
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.session.tick() {
                        Ok(snapshot) => {
                            self.hub.registry().broadcast(
                                Topic::Match(snapshot.match_id),
                                &ServerMessage::GameState(snapshot),
                            );
                        }
                        Err(err) => {
                            log::error!("Match {} stopped ticking: {err}", self.session.id());
                            return;
                        }
                    }
                    let outcome = self
                        .session
                        .decided()
                        .or_else(|| self.check_presence(&mut absent_since));
                    if let Some(outcome) = outcome {
                        if let Err(err) = self.conclude(outcome) {
                            log::error!("Could not end match {}: {err}", self.session.id());
                        }
                        return;
                    }
                }
                command = self.commands.recv() => match command {
                    None | Some(SessionCommand::Cancel) => return,
                    Some(SessionCommand::Start { reply }) => {
                        let err = SessionError::AlreadyStarted(self.session.id());
                        let _ = reply.send(Err(err.into()));
                    }
                    Some(SessionCommand::Input { player, event }) => {
                        if let Err(err) = self.session.apply_input(player, event) {
                            log::warn!("Dropped input for match {}: {err}", self.session.id());
                        }
                    }
                    Some(SessionCommand::Report { outcome, reply }) => {
                        let result = self.conclude(outcome);
                        let done = result.is_ok();
                        let _ = reply.send(result);
                        if done {
                            return;
                        }
                    }
                },
            }
        }
    }

    fn presence(&self) -> [bool; 2] {
        let game = self.session.game();
        let registry = self.hub.registry();
        [Side::Left, Side::Right].map(|side| {
            game.player_at(side)
                .is_some_and(|player| registry.is_present(player, game.id))
        })
    }

    /// Track absent participants; a forfeit once one has been gone for the whole grace period.
    fn check_presence(&self, absent_since: &mut [Option<Instant>; 2]) -> Option<Outcome> {
        let now = Instant::now();
        let grace = self.hub.config().grace_period;
        let present = self.presence();
        let game = self.session.game();
        let mut expired = false;
        for (i, side) in [Side::Left, Side::Right].into_iter().enumerate() {
            if present[i] {
                if absent_since[i].take().is_some() {
                    log::info!("Player {:?} is back in match {}", game.player_at(side), game.id);
                }
            } else {
                let since = *absent_since[i].get_or_insert_with(|| {
                    log::info!(
                        "Player {:?} absent from match {}, grace period started",
                        game.player_at(side),
                        game.id
                    );
                    now
                });
                expired |= now.duration_since(since) >= grace;
            }
        }
        if !expired {
            return None;
        }
        let outcome = match present {
            [true, _] => game.left.map(|winner| Outcome::Forfeit { winner }),
            [_, true] => game.right.map(|winner| Outcome::Forfeit { winner }),
            [false, false] => None,
        };
        Some(outcome.unwrap_or(Outcome::NoContest))
    }

    fn begin(&mut self) -> Result<(), EngineError> {
        let now = Utc::now();
        let snapshot = self.session.start(now)?;
        let match_id = snapshot.match_id;
        log::info!("Match {match_id} started");
        self.hub.mark_started(match_id);
        let registry = self.hub.registry();
        registry.broadcast(Topic::Match(match_id), &ServerMessage::GameStarted { match_id });
        registry.broadcast(Topic::Match(match_id), &ServerMessage::GameState(snapshot));
        if self
            .coordinator
            .send(CoordinatorCommand::MatchStarted { match_id, at: now })
            .is_err()
        {
            log::debug!("Coordinator gone before match {match_id} started");
        }
        Ok(())
    }

    /// End the session once; later calls are no-ops.
    fn conclude(&mut self, outcome: Outcome) -> Result<(), EngineError> {
        let Some(terminal) = self.session.end(outcome, Utc::now())? else {
            return Ok(());
        };
        let game = self.session.game().clone();
        log::info!(
            "Match {} ended {}-{}, resolution {:?}",
            game.id,
            game.left_score,
            game.right_score,
            game.resolution
        );
        let registry = self.hub.registry();
        registry.broadcast(Topic::Match(game.id), &ServerMessage::GameState(terminal));
        registry.broadcast(
            Topic::Match(game.id),
            &ServerMessage::GameEnded {
                match_id: game.id,
                winner: game.winner,
                left_score: game.left_score,
                right_score: game.right_score,
            },
        );
        if self
            .coordinator
            .send(CoordinatorCommand::MatchCompleted { game })
            .is_err()
        {
            log::debug!("Coordinator gone before match {} was recorded", self.session.id());
        }
        Ok(())
    }
}

/// One client's duplex channel. Dropping it releases all of its subscriptions.
pub struct Connection {
    hub: Hub,
    profile: Profile,
    outbound: mpsc::Sender<ServerMessage>,
    subscriptions: HashMap<Topic, SubscriptionHandle>,
}

impl Connection {
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Decode and handle one raw frame. Failures go back to the client as `error` messages.
    pub async fn handle_text(&mut self, text: &str) {
        match transport::decode(text) {
            Ok(message) => self.handle(message).await,
            Err(err) => self.reject(err.into()),
        }
    }

    pub async fn handle(&mut self, message: ClientMessage) {
        if let Err(err) = self.dispatch(message).await {
            self.reject(err);
        }
    }

    async fn dispatch(&mut self, message: ClientMessage) -> Result<(), EngineError> {
        let me = self.profile.id;
        match message {
            ClientMessage::JoinMatch { match_id } => {
                let handle = self
                    .hub
                    .registry()
                    .join(me, match_id, self.outbound.clone())?;
                self.subscriptions.insert(Topic::Match(match_id), handle);
                let initial = self.hub.initial_state(match_id)?;
                self.send(initial);
                Ok(())
            }
            ClientMessage::LeaveMatch { match_id } => {
                if let Some(handle) = self.subscriptions.remove(&Topic::Match(match_id)) {
                    self.hub.registry().leave(handle);
                }
                Ok(())
            }
            ClientMessage::JoinRoom { tournament_id } => {
                let handle = self
                    .hub
                    .registry()
                    .watch_room(me, tournament_id, self.outbound.clone())?;
                self.subscriptions.insert(Topic::Room(tournament_id), handle);
                Ok(())
            }
            ClientMessage::StartGame { match_id } => self.hub.start_match(Some(me), match_id).await,
            ClientMessage::Keydown {
                key,
                match_id,
                user_id,
            } => self.input(user_id, match_id, &key, InputEvent::KeyDown),
            ClientMessage::Keyup {
                key,
                match_id,
                user_id,
            } => self.input(user_id, match_id, &key, InputEvent::KeyUp),
            ClientMessage::Ready {
                tournament_id,
                ready,
            } => self.hub.set_ready(tournament_id, me, ready).await,
        }
    }

    fn input(
        &self,
        user_id: PlayerId,
        match_id: MatchId,
        key: &str,
        event: fn(Key) -> InputEvent,
    ) -> Result<(), EngineError> {
        if user_id != self.profile.id {
            return Err(EngineError::Unauthorized(
                "input sent on behalf of another user".to_string(),
            ));
        }
        let key = Key::parse(key)?;
        self.hub.send_input(user_id, match_id, event(key))
    }

    fn send(&self, message: ServerMessage) {
        if self.outbound.try_send(message).is_err() {
            log::warn!("Outbound queue of {} is full or closed", self.profile.username);
        }
    }

    fn reject(&self, err: EngineError) {
        log::warn!("Rejected message from {}: {err}", self.profile.username);
        self.send(ServerMessage::Error {
            code: err.kind(),
            message: err.to_string(),
        });
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        log::info!(
            "{} disconnected, releasing {} subscription(s)",
            self.profile.username,
            self.subscriptions.len()
        );
    }
}

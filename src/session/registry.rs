//! Who is connected to what: subscriptions of players to match and room channels.

use crate::models::{GameMatch, MatchId, PlayerId, TournamentId};
use crate::transport::ServerMessage;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

pub type SubscriptionId = u64;

/// Bounded per-subscriber outbound queue.
pub type Outbound = mpsc::Sender<ServerMessage>;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Topic {
    Match(MatchId),
    Room(TournamentId),
}

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum RegistryError {
    #[error("unknown match {0}")]
    UnknownMatch(MatchId),
    #[error("unknown tournament room {0}")]
    UnknownRoom(TournamentId),
    #[error("player {0} is not a participant of match {1}")]
    NotAParticipant(PlayerId, MatchId),
}

/// Slots and owner of a registered match.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MatchEntry {
    pub tournament_id: TournamentId,
    pub left: Option<PlayerId>,
    pub right: Option<PlayerId>,
}

impl MatchEntry {
    pub fn has_player(&self, player: PlayerId) -> bool {
        self.left == Some(player) || self.right == Some(player)
    }
}

struct Subscription {
    player: PlayerId,
    topic: Topic,
    sender: Outbound,
}

#[derive(Default)]
struct Inner {
    next_id: SubscriptionId,
    rooms: HashSet<TournamentId>,
    matches: HashMap<MatchId, MatchEntry>,
    subscriptions: HashMap<SubscriptionId, Subscription>,
    /// At most one live subscription per (player, topic).
    active: HashMap<(PlayerId, Topic), SubscriptionId>,
}

impl Inner {
    fn subscribe(&mut self, player: PlayerId, topic: Topic, sender: Outbound) -> SubscriptionId {
        if let Some(old) = self.active.get(&(player, topic)).copied() {
            if let Some(sub) = self.subscriptions.remove(&old) {
                log::info!(
                    "Player {player} reconnected to {topic:?}, replacing subscription {old}"
                );
                let _ = sub.sender.try_send(ServerMessage::Error {
                    code: crate::error::ErrorKind::InvalidState,
                    message: "superseded by a newer connection".to_string(),
                });
            }
        }
        self.next_id += 1;
        let id = self.next_id;
        self.subscriptions.insert(
            id,
            Subscription {
                player,
                topic,
                sender,
            },
        );
        self.active.insert((player, topic), id);
        id
    }

    fn remove(&mut self, id: SubscriptionId) {
        if let Some(sub) = self.subscriptions.remove(&id) {
            if self.active.get(&(sub.player, sub.topic)) == Some(&id) {
                self.active.remove(&(sub.player, sub.topic));
            }
        }
    }
}

/// Shared, cheaply cloneable registry. All operations are non-blocking.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register_room(&self, tournament_id: TournamentId) {
        self.lock().rooms.insert(tournament_id);
    }

    pub fn register_match(&self, tournament_id: TournamentId, game: &GameMatch) {
        self.lock().matches.insert(
            game.id,
            MatchEntry {
                tournament_id,
                left: game.left,
                right: game.right,
            },
        );
    }

    pub fn match_entry(&self, match_id: MatchId) -> Option<MatchEntry> {
        self.lock().matches.get(&match_id).copied()
    }

    /// Subscribe a participant to a match channel. Replaces any earlier subscription of the
    /// same player to the same match.
    pub fn join(
        &self,
        player: PlayerId,
        match_id: MatchId,
        sender: Outbound,
    ) -> Result<SubscriptionHandle, RegistryError> {
        let mut inner = self.lock();
        let entry = inner
            .matches
            .get(&match_id)
            .ok_or(RegistryError::UnknownMatch(match_id))?;
        if !entry.has_player(player) {
            return Err(RegistryError::NotAParticipant(player, match_id));
        }
        let topic = Topic::Match(match_id);
        let id = inner.subscribe(player, topic, sender);
        Ok(self.handle(id, player, topic))
    }

    /// Subscribe anyone, participant or observer, to a tournament room.
    pub fn watch_room(
        &self,
        player: PlayerId,
        tournament_id: TournamentId,
        sender: Outbound,
    ) -> Result<SubscriptionHandle, RegistryError> {
        let mut inner = self.lock();
        if !inner.rooms.contains(&tournament_id) {
            return Err(RegistryError::UnknownRoom(tournament_id));
        }
        let topic = Topic::Room(tournament_id);
        let id = inner.subscribe(player, topic, sender);
        Ok(self.handle(id, player, topic))
    }

    /// Release a subscription. The session behind it keeps running.
    pub fn leave(&self, handle: SubscriptionHandle) {
        drop(handle);
    }

    /// Whether the player holds a live subscription to the match.
    pub fn is_present(&self, player: PlayerId, match_id: MatchId) -> bool {
        let inner = self.lock();
        inner
            .active
            .get(&(player, Topic::Match(match_id)))
            .and_then(|id| inner.subscriptions.get(id))
            .is_some_and(|sub| !sub.sender.is_closed())
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.lock()
            .subscriptions
            .values()
            .filter(|sub| sub.topic == topic)
            .count()
    }

    /// Fire-and-forget delivery to every subscriber of the topic. Subscribers whose queue is
    /// full are dropped rather than waited on. Returns how many received the message.
    pub fn broadcast(&self, topic: Topic, message: &ServerMessage) -> usize {
        let mut inner = self.lock();
        let mut delivered = 0;
        let mut dropped = Vec::new();
        for (id, sub) in inner.subscriptions.iter().filter(|(_, sub)| sub.topic == topic) {
            match sub.sender.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    log::warn!("Dropping slow subscriber {} of {:?}", sub.player, topic);
                    dropped.push(*id);
                }
                Err(TrySendError::Closed(_)) => dropped.push(*id),
            }
        }
        for id in dropped {
            inner.remove(id);
        }
        delivered
    }

    /// Forget a tournament's room and matches and every subscription to them.
    pub fn release_tournament(&self, tournament_id: TournamentId) -> usize {
        let mut inner = self.lock();
        inner.rooms.remove(&tournament_id);
        let match_ids: HashSet<MatchId> = inner
            .matches
            .iter()
            .filter(|(_, entry)| entry.tournament_id == tournament_id)
            .map(|(id, _)| *id)
            .collect();
        inner.matches.retain(|id, _| !match_ids.contains(id));
        let released: Vec<SubscriptionId> = inner
            .subscriptions
            .iter()
            .filter(|(_, sub)| match sub.topic {
                Topic::Room(id) => id == tournament_id,
                Topic::Match(id) => match_ids.contains(&id),
            })
            .map(|(id, _)| *id)
            .collect();
        for id in &released {
            inner.remove(*id);
        }
        log::info!(
            "Released {} subscription(s) of tournament {}",
            released.len(),
            tournament_id
        );
        released.len()
    }

    fn handle(&self, id: SubscriptionId, player: PlayerId, topic: Topic) -> SubscriptionHandle {
        SubscriptionHandle {
            id,
            player,
            topic,
            registry: Arc::downgrade(&self.inner),
        }
    }
}

/// A held subscription. Dropping it releases the subscription.
pub struct SubscriptionHandle {
    id: SubscriptionId,
    player: PlayerId,
    topic: Topic,
    registry: Weak<Mutex<Inner>>,
}

impl SubscriptionHandle {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn player(&self) -> PlayerId {
        self.player
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// False once replaced by a reconnection, dropped as a slow consumer, or released.
    pub fn is_active(&self) -> bool {
        let Some(inner) = self.registry.upgrade() else {
            return false;
        };
        let guard = inner.lock().unwrap_or_else(PoisonError::into_inner);
        guard.subscriptions.contains_key(&self.id)
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(self.id);
        }
    }
}

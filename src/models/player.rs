//! Player, Profile and Standing data structures.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a player (used in matches, scores and subscriptions).
pub type PlayerId = Uuid;

/// Identity of the acting user, as returned by the profile lookup.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: PlayerId,
    pub username: String,
}

impl Profile {
    pub fn new(id: PlayerId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
        }
    }
}

/// A participant in a tournament. Only `ready` changes once the tournament begins.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub username: String,
    #[serde(default)]
    pub ready: bool,
}

impl Player {
    /// Create a new player with a fresh id. Not ready.
    pub fn new(username: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), username)
    }

    pub fn with_id(id: PlayerId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            ready: false,
        }
    }

    pub fn profile(&self) -> Profile {
        Profile::new(self.id, self.username.clone())
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }
}

impl From<Profile> for Player {
    fn from(profile: Profile) -> Self {
        Self::with_id(profile.id, profile.username)
    }
}

/// One row of the standings table (for API / export).
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    pub player_id: PlayerId,
    pub username: String,
    pub points: u32,
    pub played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub score_for: u32,
    pub score_against: u32,
}

impl Standing {
    pub fn for_player(p: &Player) -> Self {
        Self {
            player_id: p.id,
            username: p.username.clone(),
            ..Self::default()
        }
    }

    /// Score difference across all completed matches.
    pub fn score_difference(&self) -> i64 {
        i64::from(self.score_for) - i64::from(self.score_against)
    }
}

//! Authoritative state of one match and its deterministic Pong simulation.
//!
//! Everything here is integer arithmetic driven only by the current state and the queued
//! input, so replaying the same input against the same start state yields the same snapshots.

use crate::config::SimulationConfig;
use crate::models::{GameMatch, MatchId, Outcome, PlayerId, Side, Status, TournamentError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

pub const FIELD_WIDTH: i32 = 800;
pub const FIELD_HEIGHT: i32 = 400;
pub const PADDLE_HEIGHT: i32 = 80;
pub const PADDLE_INSET: i32 = 20;
pub const BALL_RADIUS: i32 = 6;
const PADDLE_SPEED: i32 = 8;
const SERVE_VX: i32 = 6;
const SERVE_VY: i32 = 4;
const MAX_VY: i32 = 10;

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum SessionError {
    #[error("match {0} has already started")]
    AlreadyStarted(MatchId),
    #[error("match {0} is not in progress")]
    NotStarted(MatchId),
    #[error("input from {player} rejected: {reason}")]
    InvalidInput {
        player: PlayerId,
        reason: &'static str,
    },
    #[error("unknown key {0:?}")]
    UnknownKey(String),
    #[error(transparent)]
    Tournament(#[from] TournamentError),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Up,
    Down,
}

impl Key {
    /// Map a browser key name onto a paddle direction.
    pub fn parse(name: &str) -> Result<Self, SessionError> {
        match name {
            "ArrowUp" | "w" | "W" => Ok(Key::Up),
            "ArrowDown" | "s" | "S" => Ok(Key::Down),
            other => Err(SessionError::UnknownKey(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InputEvent {
    KeyDown(Key),
    KeyUp(Key),
}

/// Immutable view of the session after one tick.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub match_id: MatchId,
    pub tick: u64,
    pub left_score: u32,
    pub right_score: u32,
    pub ball_x: i32,
    pub ball_y: i32,
    pub left_paddle: i32,
    pub right_paddle: i32,
    pub elapsed_ms: u64,
    pub status: Status,
    pub winner: Option<PlayerId>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
struct Field {
    ball_x: i32,
    ball_y: i32,
    vel_x: i32,
    vel_y: i32,
    /// Vertical centre of each paddle, indexed by side.
    paddles: [i32; 2],
}

impl Field {
    fn new() -> Self {
        Self {
            ball_x: FIELD_WIDTH / 2,
            ball_y: FIELD_HEIGHT / 2,
            vel_x: SERVE_VX,
            vel_y: SERVE_VY,
            paddles: [FIELD_HEIGHT / 2; 2],
        }
    }

    /// Re-serve from the centre toward the side that just conceded.
    fn serve(&mut self, toward: Side, points_played: u32) {
        self.ball_x = FIELD_WIDTH / 2;
        self.ball_y = FIELD_HEIGHT / 2;
        self.vel_x = match toward {
            Side::Left => -SERVE_VX,
            Side::Right => SERVE_VX,
        };
        self.vel_y = if points_played % 2 == 0 { SERVE_VY } else { -SERVE_VY };
    }

    fn deflect(&mut self, paddle: i32) {
        let offset = self.ball_y - paddle;
        self.vel_x = -self.vel_x;
        self.vel_y = (self.vel_y + offset / 10).clamp(-MAX_VY, MAX_VY);
    }

    fn covers(&self, side: Side) -> bool {
        (self.ball_y - self.paddles[index(side)]).abs() <= PADDLE_HEIGHT / 2 + BALL_RADIUS
    }
}

fn index(side: Side) -> usize {
    match side {
        Side::Left => 0,
        Side::Right => 1,
    }
}

/// One match being played.
#[derive(Clone, Debug)]
pub struct MatchSession {
    game: GameMatch,
    config: SimulationConfig,
    allow_draw: bool,
    tick: u64,
    scores: [u32; 2],
    field: Field,
    held: [Option<Key>; 2],
    queue: VecDeque<(Side, InputEvent)>,
}

impl MatchSession {
    pub fn new(game: GameMatch, config: SimulationConfig, allow_draw: bool) -> Self {
        Self {
            game,
            config,
            allow_draw,
            tick: 0,
            scores: [0; 2],
            field: Field::new(),
            held: [None; 2],
            queue: VecDeque::new(),
        }
    }

    pub fn id(&self) -> MatchId {
        self.game.id
    }

    pub fn game(&self) -> &GameMatch {
        &self.game
    }

    pub fn is_completed(&self) -> bool {
        self.game.is_completed()
    }

    /// pending -> ongoing; the input queue opens.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<Snapshot, SessionError> {
        if self.game.status != Status::Pending {
            return Err(SessionError::AlreadyStarted(self.game.id));
        }
        self.game.start(now)?;
        Ok(self.snapshot())
    }

    /// Queue input for the next tick. Only the two participants of an ongoing match may send input.
    pub fn apply_input(&mut self, player: PlayerId, event: InputEvent) -> Result<(), SessionError> {
        let side = self.game.side_of(player).ok_or(SessionError::InvalidInput {
            player,
            reason: "not a participant",
        })?;
        if self.game.status != Status::Ongoing {
            return Err(SessionError::InvalidInput {
                player,
                reason: "match is not in progress",
            });
        }
        self.queue.push_back((side, event));
        Ok(())
    }

    /// Advance the simulation by one step.
    pub fn tick(&mut self) -> Result<Snapshot, SessionError> {
        if self.game.status != Status::Ongoing {
            return Err(SessionError::NotStarted(self.game.id));
        }
        while let Some((side, event)) = self.queue.pop_front() {
            let held = &mut self.held[index(side)];
            match event {
                InputEvent::KeyDown(key) => *held = Some(key),
                InputEvent::KeyUp(key) if *held == Some(key) => *held = None,
                InputEvent::KeyUp(_) => {}
            }
        }
        self.move_paddles();
        self.move_ball();
        self.tick += 1;
        Ok(self.snapshot())
    }

    /// The result the simulation has reached, if any.
    pub fn decided(&self) -> Option<Outcome> {
        if self.game.status != Status::Ongoing {
            return None;
        }
        let [left, right] = self.scores;
        let target = self.config.points_to_win;
        if left >= target || right >= target {
            return Some(Outcome::Scored { left, right });
        }
        match self.config.max_ticks {
            Some(max) if self.tick >= max && (left != right || self.allow_draw) => {
                Some(Outcome::Scored { left, right })
            }
            _ => None,
        }
    }

    /// End the match and return the terminal snapshot.
    /// Ending an already completed session is a no-op and returns None.
    pub fn end(
        &mut self,
        outcome: Outcome,
        now: DateTime<Utc>,
    ) -> Result<Option<Snapshot>, SessionError> {
        if self.is_completed() {
            return Ok(None);
        }
        if let Outcome::Scored { left, right } = outcome {
            if left == right && !self.allow_draw {
                return Err(TournamentError::DrawNotAllowed.into());
            }
            self.scores = [left, right];
        }
        self.game.left_score = self.scores[0];
        self.game.right_score = self.scores[1];
        self.game.complete(outcome, now)?;
        self.queue.clear();
        self.held = [None; 2];
        Ok(Some(self.snapshot()))
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            match_id: self.game.id,
            tick: self.tick,
            left_score: self.scores[0],
            right_score: self.scores[1],
            ball_x: self.field.ball_x,
            ball_y: self.field.ball_y,
            left_paddle: self.field.paddles[0],
            right_paddle: self.field.paddles[1],
            elapsed_ms: self.tick * self.config.tick_ms,
            status: self.game.status,
            winner: self.game.winner,
        }
    }

    fn move_paddles(&mut self) {
        let half = PADDLE_HEIGHT / 2;
        for (paddle, held) in self.field.paddles.iter_mut().zip(self.held) {
            let delta = match held {
                Some(Key::Up) => -PADDLE_SPEED,
                Some(Key::Down) => PADDLE_SPEED,
                None => 0,
            };
            *paddle = (*paddle + delta).clamp(half, FIELD_HEIGHT - half);
        }
    }

    fn move_ball(&mut self) {
        let field = &mut self.field;
        let prev_x = field.ball_x;
        field.ball_x += field.vel_x;
        field.ball_y += field.vel_y;

        if field.ball_y - BALL_RADIUS <= 0 {
            field.ball_y = BALL_RADIUS;
            field.vel_y = field.vel_y.abs();
        } else if field.ball_y + BALL_RADIUS >= FIELD_HEIGHT {
            field.ball_y = FIELD_HEIGHT - BALL_RADIUS;
            field.vel_y = -field.vel_y.abs();
        }

        let left_face = PADDLE_INSET + BALL_RADIUS;
        let right_face = FIELD_WIDTH - PADDLE_INSET - BALL_RADIUS;
        if field.vel_x < 0
            && prev_x > left_face
            && field.ball_x <= left_face
            && field.covers(Side::Left)
        {
            field.ball_x = left_face;
            field.deflect(field.paddles[0]);
        } else if field.vel_x > 0
            && prev_x < right_face
            && field.ball_x >= right_face
            && field.covers(Side::Right)
        {
            field.ball_x = right_face;
            field.deflect(field.paddles[1]);
        }

        let scorer = if field.ball_x + BALL_RADIUS < 0 {
            Some(Side::Right)
        } else if field.ball_x - BALL_RADIUS > FIELD_WIDTH {
            Some(Side::Left)
        } else {
            None
        };
        if let Some(side) = scorer {
            self.scores[index(side)] += 1;
            let played = self.scores[0] + self.scores[1];
            self.field.serve(side.opposite(), played);
        }
    }
}

//! Engine configuration. Defaults can be overridden from the environment:
//! TICK_INTERVAL_MS, GRACE_PERIOD_SECS, JOIN_TIMEOUT_SECS, OUTBOUND_QUEUE, POINTS_TO_WIN and
//! MAX_TICKS.

use std::str::FromStr;
use std::time::Duration;

/// Rules of a single simulated match.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SimulationConfig {
    /// First side to reach this many points wins.
    pub points_to_win: u32,
    /// Time limit in ticks. None plays until `points_to_win`.
    pub max_ticks: Option<u64>,
    /// Length of one tick, used for elapsed time in snapshots.
    pub tick_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            points_to_win: default_points_to_win(),
            max_ticks: None,
            tick_ms: default_tick_ms(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EngineConfig {
    pub simulation: SimulationConfig,
    /// How long an absent participant has to reconnect before forfeiting.
    pub grace_period: Duration,
    /// Bounded wait for a match to be started after its round opens.
    pub join_timeout: Duration,
    /// Capacity of each subscriber's outbound queue. Full queues get the subscriber dropped.
    pub outbound_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            grace_period: Duration::from_secs(default_grace_secs()),
            join_timeout: Duration::from_secs(default_join_timeout_secs()),
            outbound_capacity: default_outbound_capacity(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            simulation: SimulationConfig {
                points_to_win: env_or("POINTS_TO_WIN", default_points_to_win),
                max_ticks: env_var("MAX_TICKS"),
                tick_ms: env_or("TICK_INTERVAL_MS", default_tick_ms).max(1),
            },
            grace_period: Duration::from_secs(env_or("GRACE_PERIOD_SECS", default_grace_secs)),
            join_timeout: Duration::from_secs(env_or(
                "JOIN_TIMEOUT_SECS",
                default_join_timeout_secs,
            )),
            outbound_capacity: env_or("OUTBOUND_QUEUE", default_outbound_capacity).max(1),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.simulation.tick_ms)
    }
}

fn env_var<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_or<T: FromStr>(key: &str, default: fn() -> T) -> T {
    env_var(key).unwrap_or_else(default)
}

fn default_points_to_win() -> u32 {
    5
}

fn default_tick_ms() -> u64 {
    50
}

fn default_grace_secs() -> u64 {
    10
}

fn default_join_timeout_secs() -> u64 {
    30
}

fn default_outbound_capacity() -> usize {
    64
}

//! Runtime tunables for table pacing, overridable from the environment.

use std::env;
use std::time::Duration;

pub const DEFAULT_ACTION_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_HAND_DELAY_MS: u64 = 2_500;
pub const DEFAULT_MIN_PLAYERS: usize = 2;

/// Warning pings fire at these fractions of the action deadline.
pub const WARNING_FRACTIONS: [f64; 2] = [0.5, 0.8];

#[derive(Debug, Clone)]
pub struct Timing {
    /// How long the active player has before a default action is applied.
    pub action_timeout: Duration,
    /// Pause between `HAND_END` and the next hand attempt.
    pub hand_delay: Duration,
    /// Ready players with chips required before a hand starts.
    pub min_players: usize,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            action_timeout: Duration::from_millis(DEFAULT_ACTION_TIMEOUT_MS),
            hand_delay: Duration::from_millis(DEFAULT_HAND_DELAY_MS),
            min_players: DEFAULT_MIN_PLAYERS,
        }
    }
}

impl Timing {
    /// Defaults overlaid with `FELT_ACTION_TIMEOUT_MS`,
    /// `FELT_HAND_DELAY_MS`, and `FELT_MIN_PLAYERS` when set and
    /// parseable; anything else is ignored.
    pub fn from_env() -> Self {
        let mut timing = Self::default();
        if let Some(ms) = parse_env::<u64>("FELT_ACTION_TIMEOUT_MS") {
            timing.action_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_env::<u64>("FELT_HAND_DELAY_MS") {
            timing.hand_delay = Duration::from_millis(ms);
        }
        if let Some(n) = parse_env::<usize>("FELT_MIN_PLAYERS") {
            if n >= 2 {
                timing.min_players = n;
            }
        }
        timing
    }

    /// Fast pacing for tests: millisecond-scale timers.
    pub fn for_tests() -> Self {
        Self {
            action_timeout: Duration::from_millis(100),
            hand_delay: Duration::from_millis(10),
            min_players: 2,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let timing = Timing::default();
        assert_eq!(timing.action_timeout, Duration::from_millis(30_000));
        assert_eq!(timing.hand_delay, Duration::from_millis(2_500));
        assert_eq!(timing.min_players, 2);
    }
}

//! Sync tuning loaded from environment variables.
//!
//! Every knob has a default matching the reference client, so an empty
//! environment yields the stock behavior. Unparseable values fall back to
//! the default rather than failing startup.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::time::Duration;

const DEFAULT_DEBOUNCE_MS: u64 = 300;
const DEFAULT_ECHO_GUARD_MS: u64 = 300;
const DEFAULT_PERSIST_INTERVAL_MS: u64 = 1_000_000;
const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;
const DEFAULT_RECONNECT_DELAY_MS: u64 = 2_000;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_CANVAS_WIDTH: f64 = 1_200.0;
const DEFAULT_CANVAS_HEIGHT: f64 = 800.0;

/// Timers, retry policy, and canvas bounds for one sync client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncConfig {
    /// Quiet window before a coalesced local change is broadcast.
    pub debounce: Duration,
    /// How long a snapshot seen on the channel suppresses sending identical content.
    pub echo_guard: Duration,
    /// Period of the persistence dirty check.
    pub persist_interval: Duration,
    /// Reconnection attempts after a drop before going offline.
    pub reconnect_attempts: u32,
    /// Fixed delay between reconnection attempts.
    pub reconnect_delay: Duration,
    /// Upper bound on a single connection attempt.
    pub connect_timeout: Duration,
    /// Canvas container width used to clamp drags.
    pub canvas_width: f64,
    /// Canvas container height used to clamp drags.
    pub canvas_height: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            echo_guard: Duration::from_millis(DEFAULT_ECHO_GUARD_MS),
            persist_interval: Duration::from_millis(DEFAULT_PERSIST_INTERVAL_MS),
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
        }
    }
}

impl SyncConfig {
    /// Read `SYNC_*` variables, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            debounce: Duration::from_millis(env_parse("SYNC_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS)),
            echo_guard: Duration::from_millis(env_parse("SYNC_ECHO_GUARD_MS", DEFAULT_ECHO_GUARD_MS)),
            persist_interval: Duration::from_millis(
                env_parse("SYNC_PERSIST_INTERVAL_MS", DEFAULT_PERSIST_INTERVAL_MS).max(1),
            ),
            reconnect_attempts: env_parse("SYNC_RECONNECT_ATTEMPTS", DEFAULT_RECONNECT_ATTEMPTS),
            reconnect_delay: Duration::from_millis(env_parse("SYNC_RECONNECT_DELAY_MS", DEFAULT_RECONNECT_DELAY_MS)),
            connect_timeout: Duration::from_millis(env_parse("SYNC_CONNECT_TIMEOUT_MS", DEFAULT_CONNECT_TIMEOUT_MS)),
            canvas_width: env_parse("SYNC_CANVAS_WIDTH", DEFAULT_CANVAS_WIDTH),
            canvas_height: env_parse("SYNC_CANVAS_HEIGHT", DEFAULT_CANVAS_HEIGHT),
        }
    }
}

/// Parse `key` from the environment, or return `default` when it is unset
/// or does not parse.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

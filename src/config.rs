//! # Control-plane configuration.
//!
//! [`Config`] centralizes every knob of the supervisor and the push channel.
//!
//! Config is used in three ways:
//! 1. **Supervisor creation**: `Supervisor::builder(config)`
//! 2. **Environment overrides**: [`Config::from_env`] reads `SERVICEVISOR_*`
//! 3. **CLI overrides**: the binary patches individual fields from flags
//!
//! ## Environment variables
//! | Variable | Field | Unit |
//! |---|---|---|
//! | `SERVICEVISOR_TICK_SECS` | `tick_interval` | seconds |
//! | `SERVICEVISOR_PROBE_TIMEOUT_SECS` | `probe_timeout` | seconds |
//! | `SERVICEVISOR_LIFECYCLE_TIMEOUT_SECS` | `lifecycle_timeout` | seconds |
//! | `SERVICEVISOR_CONNECT_ATTEMPTS` | `connect_attempts` | count |
//! | `SERVICEVISOR_LOG_CAPACITY` | `log_capacity` | entries |
//! | `SERVICEVISOR_SUBSCRIBER_CAPACITY` | `subscriber_capacity` | events |
//! | `SERVICEVISOR_BACKLOG` | `default_backlog` | entries |
//! | `SERVICEVISOR_GRACE_SECS` | `grace` | seconds |
//! | `SERVICEVISOR_BACKOFF_FIRST_MS` | `backoff.first` | milliseconds |
//! | `SERVICEVISOR_BACKOFF_MAX_SECS` | `backoff.max` | seconds |
//! | `SERVICEVISOR_RESTART_ALL_PAUSE_MS` | `restart_all_pause` | milliseconds |
//! | `SERVICEVISOR_AUTOSTART` | `autostart` | `true`/`false` |
//!
//! Unparsable values are ignored with a warning and the default is kept.

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::policies::BackoffPolicy;

/// Configuration of the control plane.
///
/// ## Field semantics
/// - `tick_interval`: period of the reconciliation loop
/// - `probe_timeout`: upper bound for one health probe
/// - `lifecycle_timeout`: upper bound for one `start()` or `stop()`
/// - `connect_attempts`: unhealthy probes tolerated while `Connecting` (min 1)
/// - `log_capacity`: activity-log ring size (min 1)
/// - `subscriber_capacity`: live events buffered per observer before it is dropped
/// - `default_backlog`: log entries replayed to a new push-channel client
/// - `grace`: how long shutdown waits for in-flight restarts
/// - `backoff`: delay growth between failed restarts
/// - `restart_all_pause`: pause between the stop and start phases of `restart_all`
/// - `autostart`: run `start_all` once at boot
#[derive(Clone, Debug)]
pub struct Config {
    pub tick_interval: Duration,
    pub probe_timeout: Duration,
    pub lifecycle_timeout: Duration,
    pub connect_attempts: u32,
    pub log_capacity: usize,
    pub subscriber_capacity: usize,
    pub default_backlog: usize,
    /// Maximum time to wait for in-flight restarts after cancellation.
    ///
    /// If exceeded, `run()` returns `RuntimeError::GraceExceeded`.
    pub grace: Duration,
    pub backoff: BackoffPolicy,
    pub restart_all_pause: Duration,
    pub autostart: bool,
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `tick_interval = 10s`
    /// - `probe_timeout = 5s`
    /// - `lifecycle_timeout = 30s`
    /// - `connect_attempts = 3`
    /// - `log_capacity = 1000`
    /// - `subscriber_capacity = 256`
    /// - `default_backlog = 50`
    /// - `grace = 10s`
    /// - `backoff = BackoffPolicy::default()` (1s doubling, capped at 60s)
    /// - `restart_all_pause = 2s`
    /// - `autostart = false`
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(5),
            lifecycle_timeout: Duration::from_secs(30),
            connect_attempts: 3,
            log_capacity: 1000,
            subscriber_capacity: 256,
            default_backlog: 50,
            grace: Duration::from_secs(10),
            backoff: BackoffPolicy::default(),
            restart_all_pause: Duration::from_secs(2),
            autostart: false,
        }
    }
}

impl Config {
    /// Defaults overridden by `SERVICEVISOR_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        let secs = |key: &str, d: &mut Duration| {
            if let Some(v) = parse::<u64>(&lookup, key) {
                *d = Duration::from_secs(v);
            }
        };

        secs("SERVICEVISOR_TICK_SECS", &mut cfg.tick_interval);
        secs("SERVICEVISOR_PROBE_TIMEOUT_SECS", &mut cfg.probe_timeout);
        secs("SERVICEVISOR_LIFECYCLE_TIMEOUT_SECS", &mut cfg.lifecycle_timeout);
        secs("SERVICEVISOR_GRACE_SECS", &mut cfg.grace);
        secs("SERVICEVISOR_BACKOFF_MAX_SECS", &mut cfg.backoff.max);

        if let Some(ms) = parse::<u64>(&lookup, "SERVICEVISOR_BACKOFF_FIRST_MS") {
            cfg.backoff.first = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64>(&lookup, "SERVICEVISOR_RESTART_ALL_PAUSE_MS") {
            cfg.restart_all_pause = Duration::from_millis(ms);
        }
        if let Some(n) = parse(&lookup, "SERVICEVISOR_CONNECT_ATTEMPTS") {
            cfg.connect_attempts = n;
        }
        if let Some(n) = parse(&lookup, "SERVICEVISOR_LOG_CAPACITY") {
            cfg.log_capacity = n;
        }
        if let Some(n) = parse(&lookup, "SERVICEVISOR_SUBSCRIBER_CAPACITY") {
            cfg.subscriber_capacity = n;
        }
        if let Some(n) = parse(&lookup, "SERVICEVISOR_BACKLOG") {
            cfg.default_backlog = n;
        }
        if let Some(b) = parse(&lookup, "SERVICEVISOR_AUTOSTART") {
            cfg.autostart = b;
        }
        cfg
    }

    /// Unhealthy probes tolerated while `Connecting`, clamped to at least 1.
    #[inline]
    pub fn connect_attempts_clamped(&self) -> u32 {
        self.connect_attempts.max(1)
    }

    /// Tick interval clamped to a non-zero value (`tokio::time::interval` panics on zero).
    #[inline]
    pub fn tick_interval_clamped(&self) -> Duration {
        self.tick_interval.max(Duration::from_millis(1))
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable configuration value");
            None
        }
    }
}

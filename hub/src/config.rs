use std::{default::Default, env, str::FromStr, time::Duration};

use log::warn;

pub const MAX_SEND_BACKLOG_VAR: &str = "MESHLINK_MAX_SEND_BACKLOG";
pub const MAX_RECEIVE_BACKLOG_VAR: &str = "MESHLINK_MAX_RECEIVE_BACKLOG";
pub const RESOLVER_CACHE_SIZE_VAR: &str = "MESHLINK_RESOLVER_CACHE_SIZE";
pub const METRICS_INTERVAL_VAR: &str = "MESHLINK_METRICS_INTERVAL_MS";

/// Contains Config properties which will be used by a RemoteLinkHub
#[derive(Clone, Debug)]
pub struct HubConfig {
    /// Outbound envelopes queued on links but not yet written, past which
    /// transport reads are paused
    pub max_send_backlog: usize,
    /// Inbound envelopes queued toward local contexts but not yet delivered,
    /// past which transport reads are paused
    pub max_receive_backlog: usize,
    /// Entries kept by the node URI resolution cache
    pub resolver_cache_size: usize,
    /// Minimum time between two profiles handed to the metrics sink
    pub metrics_report_interval: Duration,
    /// Backoff between reconnect attempts
    pub reconnect: ReconnectConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_send_backlog: default_backlog(),
            max_receive_backlog: default_backlog(),
            resolver_cache_size: 8,
            metrics_report_interval: Duration::from_secs(1),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl HubConfig {
    /// Defaults, overridden by any `MESHLINK_*` environment variables that
    /// are set.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Defaults, overridden by whatever `lookup` returns for each
    /// `MESHLINK_*` variable name. Values that do not parse keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            max_send_backlog: override_with(&lookup, MAX_SEND_BACKLOG_VAR, defaults.max_send_backlog),
            max_receive_backlog: override_with(
                &lookup,
                MAX_RECEIVE_BACKLOG_VAR,
                defaults.max_receive_backlog,
            ),
            resolver_cache_size: override_with(
                &lookup,
                RESOLVER_CACHE_SIZE_VAR,
                defaults.resolver_cache_size,
            ),
            metrics_report_interval: Duration::from_millis(override_with(
                &lookup,
                METRICS_INTERVAL_VAR,
                defaults.metrics_report_interval.as_millis() as u64,
            )),
            reconnect: defaults.reconnect,
        }
    }
}

/// Governs the delay between reconnect attempts.
///
/// The first attempt waits `initial_timeout` plus up to `jitter`; every
/// further failed attempt multiplies the previous delay by `multiplier`,
/// never exceeding `max_timeout`.
#[derive(Clone, Debug)]
pub struct ReconnectConfig {
    pub initial_timeout: Duration,
    pub jitter: Duration,
    pub multiplier: f64,
    pub max_timeout: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_timeout: Duration::from_millis(500),
            jitter: Duration::from_millis(1000),
            multiplier: 1.8,
            max_timeout: Duration::from_millis(15_000),
        }
    }
}

fn override_with<T: FromStr + Copy>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> T {
    let Some(raw) = lookup(name) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            warn!("ignoring {}={:?}: not a valid number", name, raw);
            default
        }
    }
}

fn default_backlog() -> usize {
    usize::max(512, 128 * core_count())
}

cfg_if! {
    if #[cfg(target_arch = "wasm32")] {
        fn core_count() -> usize {
            1
        }
    } else {
        fn core_count() -> usize {
            std::thread::available_parallelism()
                .map(|count| count.get())
                .unwrap_or(1)
        }
    }
}

//! Server configuration loaded from the environment.
//!
//! Every setting is optional. A missing, empty, or unparseable value
//! falls back to its default without failing startup.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `SERVER_HOST` | `0.0.0.0` |
//! | `SERVER_PORT` | `8080` |
//! | `READ_TIMEOUT` | `15s` |
//! | `WRITE_TIMEOUT` | `15s` |
//! | `IDLE_TIMEOUT` | `60s` |
//! | `SHUTDOWN_GRACE` | `10s` |
//! | `STATIC_DIR` | `./public` |
//! | `STATS_INTERVAL` | `30s` |
//! | `BROADCAST_QUEUE_CAPACITY` | `256` |
//!
//! Durations are written as `<number><unit>` pairs, e.g. `90s`, `1m30s`,
//! `250ms`. Accepted units: `ns`, `us`, `ms`, `s`, `m`, `h`.

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;
use waypost_hub::HubConfig;

/// Shortest keepalive ping interval.
const MIN_PING_INTERVAL: Duration = Duration::from_millis(10);

/// Complete server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface to bind (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port to listen on.
    pub port: u16,
    /// Deadline for plain HTTP requests.
    pub read_timeout: Duration,
    /// Deadline for writing one outbound `WebSocket` frame.
    pub write_timeout: Duration,
    /// A `WebSocket` with no inbound traffic for this long is closed.
    pub idle_timeout: Duration,
    /// How long shutdown waits for connections before force-closing.
    pub shutdown_grace: Duration,
    /// Directory served for `GET /` and unmatched paths.
    pub static_dir: PathBuf,
    /// Interval between hub stats log lines.
    pub stats_interval: Duration,
    /// Ingress queue slots.
    pub queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from("0.0.0.0"),
            port: 8080,
            read_timeout: Duration::from_secs(15),
            write_timeout: Duration::from_secs(15),
            idle_timeout: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(10),
            static_dir: PathBuf::from("./public"),
            stats_interval: Duration::from_secs(30),
            queue_capacity: 256,
        }
    }
}

/// Per-connection timing derived from [`ServerConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Idle read deadline, refreshed by every inbound frame.
    pub idle_timeout: Duration,
    /// Deadline for one outbound frame.
    pub write_timeout: Duration,
    /// Interval between keepalive pings.
    pub ping_interval: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        ServerConfig::default().connection_settings()
    }
}

impl ServerConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let duration = |key: &str, default: Duration| {
            get(key).map_or(default, |raw| {
                parse_duration(&raw).filter(|d| !d.is_zero()).unwrap_or_else(|| {
                    debug!(key, value = %raw, "Invalid duration, using default");
                    default
                })
            })
        };

        let port = get("SERVER_PORT").map_or(defaults.port, |raw| {
            raw.trim()
                .parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .unwrap_or_else(|| {
                    debug!(value = %raw, "Invalid SERVER_PORT, using default");
                    defaults.port
                })
        });

        let queue_capacity = get("BROADCAST_QUEUE_CAPACITY").map_or(defaults.queue_capacity, |raw| {
            raw.trim()
                .parse::<usize>()
                .ok()
                .filter(|c| *c != 0)
                .unwrap_or_else(|| {
                    debug!(value = %raw, "Invalid BROADCAST_QUEUE_CAPACITY, using default");
                    defaults.queue_capacity
                })
        });

        Self {
            host: get("SERVER_HOST").unwrap_or(defaults.host),
            port,
            read_timeout: duration("READ_TIMEOUT", defaults.read_timeout),
            write_timeout: duration("WRITE_TIMEOUT", defaults.write_timeout),
            idle_timeout: duration("IDLE_TIMEOUT", defaults.idle_timeout),
            shutdown_grace: duration("SHUTDOWN_GRACE", defaults.shutdown_grace),
            static_dir: get("STATIC_DIR").map_or(defaults.static_dir, PathBuf::from),
            stats_interval: duration("STATS_INTERVAL", defaults.stats_interval),
            queue_capacity,
        }
    }

    /// `host:port` string for binding.
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Hub tunables.
    pub const fn hub_config(&self) -> HubConfig {
        HubConfig {
            queue_capacity: self.queue_capacity,
            stats_interval: self.stats_interval,
        }
    }

    /// Per-connection timing. Pings go out at nine tenths of the idle
    /// deadline so a healthy client always answers in time.
    pub fn connection_settings(&self) -> ConnectionSettings {
        let ping_interval = (self.idle_timeout.saturating_mul(9) / 10).max(MIN_PING_INTERVAL);
        ConnectionSettings {
            idle_timeout: self.idle_timeout,
            write_timeout: self.write_timeout,
            ping_interval,
        }
    }
}

/// Parse a duration such as `15s`, `1m30s`, `250ms`, or `0`.
///
/// Returns `None` for empty, negative, or otherwise malformed input.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let mut rest = input.trim();
    if rest == "0" {
        return Some(Duration::ZERO);
    }
    if rest.is_empty() {
        return None;
    }

    let mut total = Duration::ZERO;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_end == 0 {
            return None;
        }
        let (number, tail) = rest.split_at(number_end);
        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_end);

        let nanos_per_unit: u64 = match unit {
            "ns" => 1,
            "us" | "\u{b5}s" | "\u{3bc}s" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            _ => return None,
        };

        let part = if number.contains('.') {
            let value: f64 = number.parse().ok()?;
            let seconds_per_unit = Duration::from_nanos(nanos_per_unit).as_secs_f64();
            Duration::try_from_secs_f64(value * seconds_per_unit).ok()?
        } else {
            Duration::from_nanos(number.parse::<u64>().ok()?.checked_mul(nanos_per_unit)?)
        };
        total = total.checked_add(part)?;
        rest = next;
    }

    Some(total)
}

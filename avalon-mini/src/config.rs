//! Configuration.
//!
//! Everything is read from environment variables, the same way in the
//! daemon and in tests. Parsing goes through [`Config::from_vars`] so tests
//! can supply variables without touching the process environment.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::protocol::{DEFAULT_STATUS_COMMAND, DEFAULT_TIMEOUT};

/// cgminer API port.
pub const DEFAULT_PORT: u16 = 4028;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// How long a new power state must hold before it is reported.
pub const DEFAULT_POWER_GRACE: Duration = Duration::from_secs(15);

pub const DEFAULT_API_ADDR: &str = "127.0.0.1:7785";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{name} must not be empty")]
    Empty { name: &'static str },

    #[error("{name}={value:?} is not valid: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Where a device lives. Immutable once validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEndpoint {
    host: String,
    port: u16,
    name: String,
}

impl DeviceEndpoint {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        name: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let host = host.into().trim().to_string();
        let name = name.into().trim().to_string();

        if host.is_empty() {
            return Err(ConfigError::Empty { name: "host" });
        }
        if name.is_empty() {
            return Err(ConfigError::Empty { name: "name" });
        }
        if port == 0 {
            return Err(ConfigError::Invalid {
                name: "port",
                value: port.to_string(),
                reason: "port 0 cannot be connected to".into(),
            });
        }

        Ok(Self { host, port, name })
    }

    /// Parse `host` or `host:port`, e.g. from the command line.
    pub fn parse(target: &str, name: impl Into<String>) -> Result<Self, ConfigError> {
        let (host, port) = match target.rsplit_once(':') {
            // Bare IPv6 addresses contain colons but no port.
            Some((host, port)) if !host.contains(':') || host.ends_with(']') => {
                let port = port.parse().map_err(|e: std::num::ParseIntError| {
                    ConfigError::Invalid {
                        name: "port",
                        value: port.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                (host.trim_start_matches('[').trim_end_matches(']'), port)
            }
            _ => (target, DEFAULT_PORT),
        };
        Self::new(host, port, name)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Friendly name; entity names and ids derive from it.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for DeviceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address())
    }
}

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: DeviceEndpoint,

    /// Bound on every device exchange.
    pub timeout: Duration,

    pub poll_interval: Duration,

    /// Power debounce grace period. Long enough to cover the device's
    /// `In Init` → `In Work` transition, short enough that a real change
    /// shows up within a poll or two.
    pub power_grace: Duration,

    /// Keyword sent to request status.
    pub status_command: String,

    /// Where the HTTP API listens.
    pub api_addr: SocketAddr,
}

impl Config {
    /// Parse configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `AVALON_HOST`: device host (required)
    /// - `AVALON_PORT`: device port (default: 4028)
    /// - `AVALON_NAME`: friendly name (required)
    /// - `AVALON_TIMEOUT_SECS`: per-exchange timeout (default: 5)
    /// - `AVALON_POLL_INTERVAL_SECS`: polling interval (default: 30)
    /// - `AVALON_POWER_GRACE_SECS`: power debounce grace (default: 15)
    /// - `AVALON_STATUS_COMMAND`: status request keyword (default: estats)
    /// - `AVALON_API_ADDR`: HTTP API listen address (default: 127.0.0.1:7785)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Parse configuration from any variable lookup.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = var("AVALON_HOST").ok_or(ConfigError::Missing("AVALON_HOST"))?;
        let name = var("AVALON_NAME").ok_or(ConfigError::Missing("AVALON_NAME"))?;
        let port = parse_or(&var, "AVALON_PORT", DEFAULT_PORT)?;
        let endpoint = DeviceEndpoint::new(host, port, name)?;

        let timeout = seconds_or(&var, "AVALON_TIMEOUT_SECS", DEFAULT_TIMEOUT)?;
        let poll_interval = seconds_or(&var, "AVALON_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL)?;
        let power_grace = seconds_or(&var, "AVALON_POWER_GRACE_SECS", DEFAULT_POWER_GRACE)?;

        let status_command = var("AVALON_STATUS_COMMAND")
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| DEFAULT_STATUS_COMMAND.to_string());
        if status_command.is_empty() {
            return Err(ConfigError::Empty {
                name: "AVALON_STATUS_COMMAND",
            });
        }

        let api_addr = match var("AVALON_API_ADDR") {
            Some(value) => parse_value("AVALON_API_ADDR", &value)?,
            None => DEFAULT_API_ADDR
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                    name: "AVALON_API_ADDR",
                    value: DEFAULT_API_ADDR.to_string(),
                    reason: e.to_string(),
                })?,
        };

        Ok(Self {
            endpoint,
            timeout,
            poll_interval,
            power_grace,
            status_command,
            api_addr,
        })
    }
}

fn parse_value<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_or<T>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match var(name) {
        Some(value) => parse_value(name, &value),
        None => Ok(default),
    }
}

/// Whole seconds; zero is rejected since every duration here bounds a wait
/// or paces a loop.
fn seconds_or(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let Some(value) = var(name) else {
        return Ok(default);
    };
    match parse_value::<u64>(name, &value)? {
        0 => Err(ConfigError::Invalid {
            name,
            value,
            reason: "must be at least 1 second".into(),
        }),
        secs => Ok(Duration::from_secs(secs)),
    }
}

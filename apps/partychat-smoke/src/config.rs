//! Environment-backed configuration for the smoke run.

use std::{env, error::Error, fmt, time::Duration};

const DEFAULT_HOST_NICKNAME: &str = "Alice";
const DEFAULT_GUEST_NICKNAME: &str = "Bob";
const DEFAULT_GREETING: &str = "hi";
const DEFAULT_LOOPBACK_LATENCY_MS: u64 = 0;
const DEFAULT_SETTLE_TIMEOUT_MS: u64 = 2_000;

/// Smoke run parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeConfig {
    /// Nickname of the participant that creates the room.
    pub host_nickname: String,
    /// Nickname of the participant that joins it.
    pub guest_nickname: String,
    /// Body the guest sends once joined.
    pub greeting: String,
    pub loopback_latency: Duration,
    /// Upper bound for each wait on a snapshot condition.
    pub settle_timeout: Duration,
}

impl SmokeConfig {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let host_nickname = optional_trimmed_env("PARTYCHAT_HOST_NICKNAME", &mut lookup)
            .unwrap_or_else(|| DEFAULT_HOST_NICKNAME.to_owned());
        let guest_nickname = optional_trimmed_env("PARTYCHAT_GUEST_NICKNAME", &mut lookup)
            .unwrap_or_else(|| DEFAULT_GUEST_NICKNAME.to_owned());
        let greeting = optional_trimmed_env("PARTYCHAT_GREETING", &mut lookup)
            .unwrap_or_else(|| DEFAULT_GREETING.to_owned());

        let loopback_latency_ms = parse_optional_u64_with_default(
            "PARTYCHAT_LOOPBACK_LATENCY_MS",
            DEFAULT_LOOPBACK_LATENCY_MS,
            &mut lookup,
        )?;
        let settle_timeout_ms = parse_optional_u64_with_default(
            "PARTYCHAT_SETTLE_TIMEOUT_MS",
            DEFAULT_SETTLE_TIMEOUT_MS,
            &mut lookup,
        )?;

        if settle_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "PARTYCHAT_SETTLE_TIMEOUT_MS",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }
        if host_nickname == guest_nickname {
            return Err(ConfigError::InvalidValue {
                key: "PARTYCHAT_GUEST_NICKNAME",
                value: guest_nickname,
                reason: "must differ from the host nickname".to_owned(),
            });
        }

        Ok(Self {
            host_nickname,
            guest_nickname,
            greeting,
            loopback_latency: Duration::from_millis(loopback_latency_ms),
            settle_timeout: Duration::from_millis(settle_timeout_ms),
        })
    }
}

/// Errors produced while parsing runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid {key}='{value}': {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

fn optional_trimmed_env<F>(key: &'static str, lookup: &mut F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_optional_u64_with_default<F>(
    key: &'static str,
    default: u64,
    lookup: &mut F,
) -> Result<u64, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(default);
    };
    value
        .parse::<u64>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}

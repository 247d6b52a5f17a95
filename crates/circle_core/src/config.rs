//! Engine configuration.
//!
//! # Responsibility
//! - Describe tunables for transactions, transports and inactivity policy.
//! - Load them from JSON with per-field defaults.
//!
//! # Invariants
//! - A validated config has at least one transaction attempt and a non-zero
//!   transport timeout.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Duration;

const MAX_TRANSACTION_ATTEMPTS: u32 = 10;
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// Configuration load/validation errors.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read configuration: {err}"),
            Self::Parse(err) => write!(f, "failed to parse configuration: {err}"),
            Self::Invalid(message) => write!(f, "invalid configuration: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

/// Tunables for [`crate::CircleEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Attempts for one check-in transaction before `StoreConflict`.
    pub transaction_max_attempts: u32,
    /// Upper bound for any single transport call.
    pub transport_timeout_ms: u64,
    /// How long a connection waits on a held write lock.
    pub busy_timeout_ms: u64,
    /// Days without a check-in before escalation.
    pub escalation_threshold_days: i64,
    /// Offset used to decide calendar days.
    pub utc_offset_minutes: i32,
    /// Log level handed to `init_logging`.
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            transaction_max_attempts: 3,
            transport_timeout_ms: 10_000,
            busy_timeout_ms: 5_000,
            escalation_threshold_days: 2,
            utc_offset_minutes: 0,
            log_level: default_log_level().to_string(),
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON document. Missing fields take defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transaction_max_attempts == 0
            || self.transaction_max_attempts > MAX_TRANSACTION_ATTEMPTS
        {
            return Err(ConfigError::Invalid(format!(
                "transaction_max_attempts must be within 1..={MAX_TRANSACTION_ATTEMPTS}, got {}",
                self.transaction_max_attempts
            )));
        }
        if self.transport_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "transport_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.escalation_threshold_days < 1 {
            return Err(ConfigError::Invalid(format!(
                "escalation_threshold_days must be at least 1, got {}",
                self.escalation_threshold_days
            )));
        }
        if self.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(ConfigError::Invalid(format!(
                "utc_offset_minutes must be within +/-{MAX_UTC_OFFSET_MINUTES}, got {}",
                self.utc_offset_minutes
            )));
        }
        Ok(())
    }

    pub fn transport_timeout(&self) -> Duration {
        Duration::from_millis(self.transport_timeout_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

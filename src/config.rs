use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::principal::Principal;
use crate::types::{DEFAULT_BACKOFF_STEP_MS, DEFAULT_MAX_ATTEMPTS, MAX_TIME_TO_LIVE_NS};

/// Principal of the identity service the proof-of-work is bound to, `rdmx6-jaaaa-aaaaa-aaadq-cai`.
pub const DEFAULT_SERVICE_ID: [u8; 10] = [0, 0, 0, 0, 0, 0, 0, 7, 1, 1];

/// Bounded linear backoff for `get_delegation`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_step_ms: DEFAULT_BACKOFF_STEP_MS,
        }
    }
}

impl RetryPolicy {
    /// Wait before 0-based `attempt`: `attempt * step`.
    #[must_use]
    pub fn delay_before(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_step_ms.saturating_mul(u64::from(attempt)))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProtocolConfig {
    pub retry: RetryPolicy,
    /// Default and upper bound for a delegation's lifetime.
    pub max_time_to_live_ns: u64,
    pub service_id: Principal,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            max_time_to_live_ns: MAX_TIME_TO_LIVE_NS,
            service_id: Principal::from_known(&DEFAULT_SERVICE_ID),
        }
    }
}

impl ProtocolConfig {
    /// Parse a JSON config; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// `ConfigError::Parse` on bad JSON or unknown fields, `ConfigError::NoAttempts` for a
    /// retry policy of zero attempts.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// `ConfigError::NoAttempts` if `retry.max_attempts` is zero.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::NoAttempts);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// `ConfigError::ServiceId` if `text` is not a valid principal.
    pub fn with_service_id(mut self, text: &str) -> Result<Self, ConfigError> {
        self.service_id = Principal::from_text(text)?;
        Ok(self)
    }

    /// TTL sent to `prepare_delegation`: the request's value capped at the maximum, or the
    /// maximum when absent.
    #[must_use]
    pub fn effective_ttl(&self, requested: Option<u64>) -> u64 {
        requested.map_or(self.max_time_to_live_ns, |ttl| {
            ttl.min(self.max_time_to_live_ns)
        })
    }
}

//! Coordinator configuration.

use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, WaitResult};

/// Settings for an [`crate::EventWaiter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventWaiterConfig {
    /// Names the worker threads: `event-waiter-{identifier}-{index}`.
    /// The owning bot or service name is a good choice.
    pub identifier: String,
    /// Number of expiry workers. Each holds any number of deadlines.
    pub workers: usize,
}

impl Default for EventWaiterConfig {
    fn default() -> Self {
        Self {
            identifier: "default".to_string(),
            workers: 8,
        }
    }
}

impl EventWaiterConfig {
    /// Config with the given identifier and default sizing.
    #[must_use]
    pub fn named(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Self::default()
        }
    }

    /// Parse a JSON config. Missing fields take their defaults.
    pub fn from_json(raw: &str) -> WaitResult<Self> {
        let cfg: Self = serde_json::from_str(raw).map_err(|e| ValidationError::InvalidConfig {
            reason: format!("invalid event waiter config: {e}"),
        })?;
        Ok(cfg)
    }

    /// Worker count clamped to at least one.
    #[inline]
    #[must_use]
    pub fn workers_clamped(&self) -> usize {
        self.workers.max(1)
    }

    pub(crate) fn thread_name(&self, index: usize) -> String {
        format!("event-waiter-{}-{index}", self.identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = EventWaiterConfig::default();
        assert_eq!(cfg.identifier, "default");
        assert_eq!(cfg.workers, 8);
    }

    #[test]
    fn json_fills_missing_fields() {
        let cfg = EventWaiterConfig::from_json(r#"{"identifier":"alyx"}"#).unwrap();
        assert_eq!(cfg.identifier, "alyx");
        assert_eq!(cfg.workers, 8);
        assert_eq!(cfg.thread_name(3), "event-waiter-alyx-3");
    }

    #[test]
    fn json_rejects_wrong_types() {
        let err = EventWaiterConfig::from_json(r#"{"workers":"many"}"#).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.as_label(), "invalid_config");
    }

    #[test]
    fn zero_workers_is_clamped() {
        let cfg = EventWaiterConfig {
            workers: 0,
            ..EventWaiterConfig::default()
        };
        assert_eq!(cfg.workers_clamped(), 1);
    }
}

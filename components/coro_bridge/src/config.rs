//! Runtime configuration.

use serde::{Deserialize, Serialize};

/// Tuning knobs for a [`Runtime`](crate::Runtime).
///
/// # Examples
///
/// ```
/// use coro_bridge::RuntimeConfig;
///
/// let config = RuntimeConfig::from_json(r#"{ "max_polls_per_turn": 8 }"#).unwrap();
/// assert_eq!(config.max_polls_per_turn, 8);
/// assert_eq!(RuntimeConfig::from_json("{}").unwrap(), RuntimeConfig::default());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Task polls allowed per host turn before control goes back to the
    /// event loop. Zero is treated as one.
    pub max_polls_per_turn: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_polls_per_turn: 64,
        }
    }
}

impl RuntimeConfig {
    /// Builder-style setter for `max_polls_per_turn`.
    pub fn with_max_polls_per_turn(mut self, polls: usize) -> Self {
        self.max_polls_per_turn = polls;
        self
    }

    /// Parses a configuration; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serializes the configuration.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

//! Graph configuration.

use serde::{Deserialize, Serialize};

fn default_capacity() -> usize {
  32
}

/// Settings a [`crate::graph::Graph`] is created with.
///
/// Deserializes from JSON with every field optional:
///
/// ```rust
/// use weaveflow::config::GraphConfig;
///
/// let config = GraphConfig::from_json(r#"{ "buffer_size": 4 }"#).unwrap();
/// assert_eq!(config.buffer_size, 4);
/// assert_eq!(config.capacity, 32);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
  /// Buffer size for channels created by `connect` (`0` = rendezvous).
  #[serde(default)]
  pub buffer_size: usize,
  /// Expected number of processes. A sizing hint for the graph's tables
  /// only; it does not limit or otherwise change behaviour.
  #[serde(default = "default_capacity")]
  pub capacity: usize,
}

impl Default for GraphConfig {
  fn default() -> Self {
    Self {
      buffer_size: 0,
      capacity: default_capacity(),
    }
  }
}

impl GraphConfig {
  /// Sets the default channel buffer size.
  pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
    self.buffer_size = buffer_size;
    self
  }

  /// Sets the expected number of processes.
  pub fn with_capacity(mut self, capacity: usize) -> Self {
    self.capacity = capacity;
    self
  }

  /// Parses a configuration from JSON.
  pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(json)
  }
}

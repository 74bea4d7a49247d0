//! Engine configuration options.

use crate::config::NetworkConfig;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Network parameters (reserve, paging, audit gates).
    pub network: NetworkConfig,
    /// Maximum number of events to retain in memory.
    pub max_events: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(NetworkConfig::default())
    }
}

impl EngineConfig {
    pub fn new(network: NetworkConfig) -> Self {
        Self {
            network,
            max_events: 100_000,
        }
    }

    pub fn with_max_events(mut self, max_events: usize) -> Self {
        self.max_events = max_events;
        self
    }
}

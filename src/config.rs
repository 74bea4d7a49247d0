// 6.0 config.rs: network-level settings in one place. reserves, paging, audit gates.
// 6.1 the base reserve is the only input to the native minimum balance.

use serde::{Deserialize, Serialize};

// Network parameters the offer book reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    // Per-entry reserve in stroops. minimum balance = (2 + sub entries) * base_reserve
    pub base_reserve: i64,
    // Largest page best_offers will return
    pub max_offers_page: usize,
    // Allow O(total offers) scans (load_all_offers, reconciliation)
    pub allow_full_scan: bool,
    // Reconcile every liability counter before each commit
    pub audit_on_commit: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            base_reserve: 5_000_000, // 0.5 native units
            max_offers_page: 1_000,
            allow_full_scan: false,
            audit_on_commit: false,
        }
    }
}

impl NetworkConfig {
    // Testnet: same reserve, scans allowed so operators can audit freely
    pub fn testnet() -> Self {
        Self {
            allow_full_scan: true,
            ..Self::default()
        }
    }

    // Mainnet: conservative paging, no full scans on the serving path
    pub fn mainnet() -> Self {
        Self {
            max_offers_page: 200,
            ..Self::default()
        }
    }

    // Development: everything audited on every commit
    pub fn development() -> Self {
        Self {
            allow_full_scan: true,
            audit_on_commit: true,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_reserve < 0 {
            return Err(ConfigError::InvalidReserve {
                reason: format!("base reserve must not be negative, got {}", self.base_reserve),
            });
        }

        if self.max_offers_page == 0 {
            return Err(ConfigError::InvalidPaging {
                reason: "page size must be at least 1".to_string(),
            });
        }

        // the audit walks every offer
        if self.audit_on_commit && !self.allow_full_scan {
            return Err(ConfigError::InvalidAudit {
                reason: "audit_on_commit requires allow_full_scan".to_string(),
            });
        }

        Ok(())
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid reserve: {reason}")]
    InvalidReserve { reason: String },

    #[error("Invalid paging: {reason}")]
    InvalidPaging { reason: String },

    #[error("Invalid audit settings: {reason}")]
    InvalidAudit { reason: String },
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> NetworkConfig {
        match self {
            Environment::Development => NetworkConfig::development(),
            Environment::Testnet => NetworkConfig::testnet(),
            Environment::Mainnet => NetworkConfig::mainnet(),
        }
    }
}

//! Runtime configuration assembled from CLI flags and environment

use crate::error::{InventoryError, Result};
use crate::gateway::GatewayConfig;
use crate::reconciler::SyncPolicy;
use std::path::PathBuf;
use std::time::Duration;

/// Default database path: `<data dir>/inventory_tracker/inventory.db`
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("inventory_tracker")
        .join("inventory.db")
}

/// Everything needed to wire a store, a gateway and a reconciler together
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub database: PathBuf,
    pub gateway: GatewayConfig,
    pub policy: SyncPolicy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            database: default_db_path(),
            gateway: GatewayConfig::default(),
            policy: SyncPolicy::default(),
        }
    }
}

impl TrackerConfig {
    pub fn with_timeout_secs(mut self, secs: u64) -> Result<Self> {
        if secs == 0 {
            return Err(InventoryError::InvalidInput(
                "Timeout must be at least one second".to_string(),
            ));
        }
        self.gateway.timeout = Duration::from_secs(secs);
        Ok(self)
    }

    pub fn with_max_push_attempts(mut self, attempts: u32) -> Result<Self> {
        if attempts == 0 {
            return Err(InventoryError::InvalidInput(
                "Max push attempts must be at least 1".to_string(),
            ));
        }
        self.policy.max_push_attempts = attempts;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_db_path_ends_with_app_dir() {
        let path = default_db_path();
        assert!(path.ends_with("inventory_tracker/inventory.db"));
    }

    #[test]
    fn rejects_zero_limits() {
        assert!(TrackerConfig::default().with_timeout_secs(0).is_err());
        assert!(TrackerConfig::default().with_max_push_attempts(0).is_err());

        let config = TrackerConfig::default()
            .with_timeout_secs(5)
            .unwrap()
            .with_max_push_attempts(7)
            .unwrap();
        assert_eq!(config.gateway.timeout, Duration::from_secs(5));
        assert_eq!(config.policy.max_push_attempts, 7);
    }
}

//! Scheduler settings, loadable from TOML.
use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{LapseError, LapseResult};

pub const DEFAULT_RENEWAL_INTERVAL_MS: u64 = 3_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How often an idle loop re-reads the time index, to catch entries written by another
    /// process into a shared store.
    pub renewal_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            renewal_interval_ms: DEFAULT_RENEWAL_INTERVAL_MS,
        }
    }
}

impl SchedulerConfig {
    pub fn renewal_interval(&self) -> Duration {
        Duration::from_millis(self.renewal_interval_ms)
    }

    pub fn validate(&self) -> LapseResult<()> {
        if self.renewal_interval_ms == 0 {
            return Err(LapseError::InvalidConfig(
                "renewal_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_toml_str(raw: &str) -> LapseResult<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| LapseError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> LapseResult<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }
}

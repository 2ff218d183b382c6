use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use daygrid_core::UserId;

use crate::error::EngineError;
use crate::gateway::RetryPolicy;

pub const OWNER_ENV_VAR: &str = "DAYGRID_OWNER_ID";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Trailing days kept in view, ending today.
    pub window_days: u32,
    /// How long an edited day is shielded from remote snapshots.
    pub quarantine_ms: u64,
    /// Pause between a failed save and its single retry.
    pub retry_backoff_ms: u64,
    pub refresh_interval_secs: u64,
    pub today_poll_secs: u64,
    /// The only user allowed to write. Unset means everyone is read-only.
    pub owner_id: Option<UserId>,
    pub task_labels: [String; 3],
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            window_days: 182,
            quarantine_ms: 1_200,
            retry_backoff_ms: 400,
            refresh_interval_secs: 60,
            today_poll_secs: 60,
            owner_id: None,
            task_labels: [
                "Do LeetCode".to_string(),
                "Work on projects".to_string(),
                "Learn tech-related stuff".to_string(),
            ],
        }
    }
}

impl TrackerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, EngineError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Apply `DAYGRID_OWNER_ID` from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, EngineError> {
        self.with_owner_override(std::env::var(OWNER_ENV_VAR).ok())
    }

    pub fn with_owner_override(mut self, owner: Option<String>) -> Result<Self, EngineError> {
        if let Some(raw) = owner.filter(|s| !s.trim().is_empty()) {
            self.owner_id = Some(raw.parse()?);
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.window_days == 0 {
            return Err(EngineError::InvalidConfig("window_days must be at least 1".into()));
        }
        if self.refresh_interval_secs == 0 || self.today_poll_secs == 0 {
            return Err(EngineError::InvalidConfig("poll intervals must be non-zero".into()));
        }
        Ok(())
    }

    pub fn quarantine(&self) -> Duration {
        Duration::from_millis(self.quarantine_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::single_retry(Duration::from_millis(self.retry_backoff_ms))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn today_poll(&self) -> Duration {
        Duration::from_secs(self.today_poll_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = TrackerConfig::default();
        assert_eq!(c.window_days, 182);
        assert_eq!(c.quarantine(), Duration::from_millis(1200));
        assert_eq!(c.retry_policy().backoff, Duration::from_millis(400));
        assert_eq!(c.retry_policy().max_attempts, 2);
        assert!(c.owner_id.is_none());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let owner = UserId::new();
        let c = TrackerConfig::from_toml_str(&format!(
            "window_days = 30\nowner_id = \"{owner}\"\n"
        ))
        .unwrap();
        assert_eq!(c.window_days, 30);
        assert_eq!(c.owner_id, Some(owner));
        assert_eq!(c.quarantine_ms, 1200);
    }

    #[test]
    fn zero_window_is_rejected() {
        let err = TrackerConfig::from_toml_str("window_days = 0").unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[test]
    fn malformed_owner_is_rejected() {
        assert!(TrackerConfig::from_toml_str("owner_id = \"nope\"").is_err());
        let err = TrackerConfig::default()
            .with_owner_override(Some("nope".into()))
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(_)));
    }

    #[test]
    fn owner_override_wins_and_blank_is_ignored() {
        let owner = UserId::new();
        let c = TrackerConfig::default()
            .with_owner_override(Some(owner.to_string()))
            .unwrap();
        assert_eq!(c.owner_id, Some(owner));
        let c = c.with_owner_override(Some("  ".into())).unwrap();
        assert_eq!(c.owner_id, Some(owner));
    }

    #[test]
    fn load_reads_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("daygrid.toml");
        std::fs::write(&path, "quarantine_ms = 500\n")?;
        let c = TrackerConfig::load(&path)?;
        assert_eq!(c.quarantine_ms, 500);
        Ok(())
    }
}

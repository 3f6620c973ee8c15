//! Reporting configuration

use serde::{Deserialize, Serialize};

/// Configuration consumed by the launch coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingConfig {
    /// Wall-clock budget for the blocking launch-finish wait, in seconds
    pub reporting_timeout_secs: u64,

    /// Item display-name truncation policy
    pub truncation: TruncationConfig,

    /// When false, skipped items are reported with a "not an issue" marker
    pub skipped_is_issue: bool,

    /// Marks the launch as a rerun of a previous one
    pub rerun: bool,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            reporting_timeout_secs: 300,
            truncation: TruncationConfig::default(),
            skipped_is_issue: true,
            rerun: false,
        }
    }
}

/// Item display-name truncation policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TruncationConfig {
    pub enabled: bool,

    /// Maximum item-name length, replacement suffix included
    pub limit: usize,

    /// Suffix appended in place of the truncated tail
    pub replacement: String,
}

impl Default for TruncationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: 1024,
            replacement: "...".to_string(),
        }
    }
}

impl ReportingConfig {
    /// Load configuration from file, falling back to defaults if absent
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reporting timeout as a [`std::time::Duration`]
    pub fn reporting_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.reporting_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReportingConfig::default();
        assert_eq!(config.reporting_timeout_secs, 300);
        assert!(config.truncation.enabled);
        assert_eq!(config.truncation.limit, 1024);
        assert_eq!(config.truncation.replacement, "...");
        assert!(config.skipped_is_issue);
        assert!(!config.rerun);
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReportingConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.reporting_timeout_secs, 300);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reporting.toml");

        let mut config = ReportingConfig::default();
        config.reporting_timeout_secs = 30;
        config.truncation.limit = 64;
        config.skipped_is_issue = false;
        config.save(&path).unwrap();

        let loaded = ReportingConfig::load(&path).unwrap();
        assert_eq!(loaded.reporting_timeout_secs, 30);
        assert_eq!(loaded.truncation.limit, 64);
        assert!(!loaded.skipped_is_issue);
    }
}

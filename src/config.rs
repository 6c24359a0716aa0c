use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_RETRY_LIMIT: u32 = 5;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Retry behaviour of an [`Aggregator`](crate::Aggregator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorConfig {
    /// Maximum number of locate-and-stream attempts, at least one.
    pub retry_limit: u32,
    /// Pause between two consecutive attempts.
    pub retry_delay: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            retry_limit: DEFAULT_RETRY_LIMIT,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl AggregatorConfig {
    pub fn with_retry_limit(mut self, retry_limit: u32) -> Self {
        self.retry_limit = retry_limit.max(1);
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }
}

/// Optional YAML settings file. Every field may be omitted.
///
/// ```yaml
/// retries: 10
/// retry_delay_ms: 2000
/// ready_timeout_secs: 120
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub ready_timeout_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Applies CLI overrides on top of the file values, falling back to defaults.
    pub fn resolve(
        &self,
        retries: Option<u32>,
        retry_delay_ms: Option<u64>,
        ready_timeout_secs: Option<u64>,
    ) -> (AggregatorConfig, Duration) {
        let mut config = AggregatorConfig::default();
        if let Some(n) = retries.or(self.retries) {
            config = config.with_retry_limit(n);
        }
        if let Some(ms) = retry_delay_ms.or(self.retry_delay_ms) {
            config = config.with_retry_delay(Duration::from_millis(ms));
        }
        let ready_timeout = ready_timeout_secs
            .or(self.ready_timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_READY_TIMEOUT);
        (config, ready_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AggregatorConfig::default();
        assert_eq!(config.retry_limit, 5);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_zero_retries_clamped() {
        let config = AggregatorConfig::default().with_retry_limit(0);
        assert_eq!(config.retry_limit, 1);
    }

    #[test]
    fn test_parse_partial_file() {
        let file = FileConfig::parse("retries: 3\n").unwrap();
        assert_eq!(file.retries, Some(3));
        assert_eq!(file.retry_delay_ms, None);
    }

    #[test]
    fn test_parse_empty_file() {
        assert_eq!(FileConfig::parse("  \n").unwrap(), FileConfig::default());
    }

    #[test]
    fn test_parse_rejects_unknown_keys() {
        assert!(FileConfig::parse("retires: 3\n").is_err());
    }

    #[test]
    fn test_resolve_precedence() {
        let file = FileConfig {
            retries: Some(3),
            retry_delay_ms: Some(250),
            ready_timeout_secs: None,
        };
        let (config, ready) = file.resolve(Some(7), None, Some(30));
        assert_eq!(config.retry_limit, 7);
        assert_eq!(config.retry_delay, Duration::from_millis(250));
        assert_eq!(ready, Duration::from_secs(30));

        let (config, ready) = FileConfig::default().resolve(None, None, None);
        assert_eq!(config, AggregatorConfig::default());
        assert_eq!(ready, DEFAULT_READY_TIMEOUT);
    }
}

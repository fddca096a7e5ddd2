//! speedwatch.toml configuration parser.
//!
//! Every field has a default, so a missing or empty file yields the
//! baseline behavior: listen on `0.0.0.0:9101`, measure every 5 minutes,
//! wait 100ms for a fresh hand-off per scrape, retry failed cycles
//! immediately.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::duration::HumanDuration;

/// Route serving the JSON snapshot.
pub const MEASUREMENT_PATH: &str = "/api/v1/measurement";

/// Liveness route.
pub const HEALTHZ_PATH: &str = "/healthz";

/// Upper bound for `sampler.handoff_wait`; a scrape must stay cheap.
pub const MAX_HANDOFF_WAIT: Duration = Duration::from_secs(1);

/// Errors raised while loading or validating a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpeedwatchConfig {
    pub server: ServerConfig,
    pub sampler: SamplerConfig,
    pub probe: ProbeConfig,
    pub exposition: ExpositionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub metrics_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 9101)),
            metrics_path: "/metrics".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplerConfig {
    /// Pause after a successful cycle.
    pub interval: HumanDuration,
    /// How long a scrape waits for a fresh hand-off before falling back.
    pub handoff_wait: HumanDuration,
    /// Backoff between failed cycles. Absent means retry immediately.
    pub retry_backoff: Option<RetryBackoffConfig>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: HumanDuration::from_secs(5 * 60),
            handoff_wait: HumanDuration::from_millis(100),
            retry_backoff: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryBackoffConfig {
    pub initial: HumanDuration,
    pub max: HumanDuration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeConfig {
    /// Candidate measurement servers as `host:port`.
    pub targets: Vec<String>,
    pub latency_path: String,
    pub download_path: String,
    pub upload_path: String,
    pub ping_count: u32,
    pub upload_bytes: usize,
    pub connect_timeout: HumanDuration,
    pub request_timeout: HumanDuration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            targets: vec!["speedtest.tele2.net:80".to_string()],
            latency_path: "/".to_string(),
            download_path: "/10MB.zip".to_string(),
            upload_path: "/upload.php".to_string(),
            ping_count: 5,
            upload_bytes: 4 * 1024 * 1024,
            connect_timeout: HumanDuration::from_secs(5),
            request_timeout: HumanDuration::from_secs(60),
        }
    }
}

/// Which instant the exported gauge timestamps carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampSource {
    /// Wall-clock time of the scrape. Hides sample age.
    #[default]
    Scrape,
    /// Completion time of the reported measurement.
    Measurement,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExpositionConfig {
    pub timestamp: TimestampSource,
    /// Also export `measurement_age_seconds`.
    pub staleness_gauge: bool,
}

impl SpeedwatchConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: SpeedwatchConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let metrics_path = self.server.metrics_path.as_str();
        if !metrics_path.starts_with('/') {
            return Err(invalid(format!(
                "server.metrics_path must start with '/', got {metrics_path:?}"
            )));
        }
        if metrics_path.contains(['{', '}']) {
            return Err(invalid(format!(
                "server.metrics_path must be a literal path, got {metrics_path:?}"
            )));
        }
        if [MEASUREMENT_PATH, HEALTHZ_PATH].contains(&metrics_path) {
            return Err(invalid(format!(
                "server.metrics_path {metrics_path:?} is already served by another route"
            )));
        }
        if self.sampler.interval.get().is_zero() {
            return Err(invalid("sampler.interval must be non-zero"));
        }
        let handoff_wait = self.sampler.handoff_wait;
        if handoff_wait.get().is_zero() {
            return Err(invalid("sampler.handoff_wait must be non-zero"));
        }
        if handoff_wait.get() > MAX_HANDOFF_WAIT || handoff_wait > self.sampler.interval {
            return Err(invalid(format!(
                "sampler.handoff_wait ({handoff_wait}) must not exceed {} or sampler.interval ({})",
                HumanDuration::from(MAX_HANDOFF_WAIT),
                self.sampler.interval,
            )));
        }
        if let Some(backoff) = self.sampler.retry_backoff {
            if backoff.initial.get().is_zero() {
                return Err(invalid("sampler.retry_backoff.initial must be non-zero"));
            }
            if backoff.max < backoff.initial {
                return Err(invalid(format!(
                    "sampler.retry_backoff.max ({}) is below initial ({})",
                    backoff.max, backoff.initial
                )));
            }
        }
        if self.probe.targets.is_empty() {
            return Err(invalid("probe.targets must list at least one host:port"));
        }
        if let Some(bad) = self.probe.targets.iter().find(|t| !t.contains(':')) {
            return Err(invalid(format!("probe target {bad:?} is not host:port")));
        }
        if self.probe.ping_count == 0 {
            return Err(invalid("probe.ping_count must be at least 1"));
        }
        if self.probe.upload_bytes == 0 {
            return Err(invalid("probe.upload_bytes must be non-zero"));
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn empty_file_yields_baseline_defaults() {
        let config = SpeedwatchConfig::from_toml("").unwrap();
        assert_eq!(config, SpeedwatchConfig::default());
        assert_eq!(config.server.listen.port(), 9101);
        assert_eq!(config.server.metrics_path, "/metrics");
        assert_eq!(config.sampler.interval.get(), Duration::from_secs(300));
        assert_eq!(config.sampler.handoff_wait.get(), Duration::from_millis(100));
        assert!(config.sampler.retry_backoff.is_none());
        assert_eq!(config.exposition.timestamp, TimestampSource::Scrape);
        assert!(!config.exposition.staleness_gauge);
    }

    #[test]
    fn parse_overrides() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:9200"

[sampler]
interval = "30s"
retry_backoff = { initial = "1s", max = "1m" }

[probe]
targets = ["10.0.0.1:8080", "10.0.0.2:8080"]
ping_count = 3

[exposition]
timestamp = "measurement"
staleness_gauge = true
"#;
        let config = SpeedwatchConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:9200".parse().unwrap());
        assert_eq!(config.server.metrics_path, "/metrics");
        assert_eq!(config.sampler.interval.get(), Duration::from_secs(30));
        let backoff = config.sampler.retry_backoff.unwrap();
        assert_eq!(backoff.initial.get(), Duration::from_secs(1));
        assert_eq!(backoff.max.get(), Duration::from_secs(60));
        assert_eq!(config.probe.targets.len(), 2);
        assert_eq!(config.probe.ping_count, 3);
        assert_eq!(config.exposition.timestamp, TimestampSource::Measurement);
        assert!(config.exposition.staleness_gauge);
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = SpeedwatchConfig::from_toml("[sampler]\ninterval_secs = 5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_bad_duration() {
        let err = SpeedwatchConfig::from_toml("[sampler]\ninterval = \"often\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_empty_targets() {
        let err = SpeedwatchConfig::from_toml("[probe]\ntargets = []\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_handoff_wait() {
        let err = SpeedwatchConfig::from_toml("[sampler]\nhandoff_wait = \"0ms\"\n").unwrap_err();
        assert!(err.to_string().contains("handoff_wait"));
    }

    #[test]
    fn rejects_oversized_handoff_wait() {
        for wait in ["18446744073709551615", "2s", "5m"] {
            let toml_str = format!("[sampler]\nhandoff_wait = \"{wait}\"\n");
            let err = SpeedwatchConfig::from_toml(&toml_str).unwrap_err();
            assert!(err.to_string().contains("handoff_wait"), "{wait}: {err}");
        }
        let toml_str = "[sampler]\ninterval = \"200ms\"\nhandoff_wait = \"500ms\"\n";
        assert!(SpeedwatchConfig::from_toml(toml_str).is_err());
        assert!(SpeedwatchConfig::from_toml("[sampler]\nhandoff_wait = \"1s\"\n").is_ok());
    }

    #[test]
    fn rejects_metrics_path_colliding_with_other_routes() {
        for path in [HEALTHZ_PATH, MEASUREMENT_PATH, "/{name}", "/metrics/{*rest}"] {
            let toml_str = format!("[server]\nmetrics_path = \"{path}\"\n");
            let err = SpeedwatchConfig::from_toml(&toml_str).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{path}: {err}");
        }
        let ok = SpeedwatchConfig::from_toml("[server]\nmetrics_path = \"/probe/metrics\"\n");
        assert_eq!(ok.unwrap().server.metrics_path, "/probe/metrics");
    }

    #[test]
    fn rejects_inverted_backoff() {
        let toml_str = "[sampler]\nretry_backoff = { initial = \"10s\", max = \"1s\" }\n";
        let err = SpeedwatchConfig::from_toml(toml_str).unwrap_err();
        assert!(err.to_string().contains("retry_backoff.max"));
    }

    #[test]
    fn roundtrips_through_toml() {
        let config = SpeedwatchConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("interval = \"5m\""));
        assert_eq!(SpeedwatchConfig::from_toml(&toml_str).unwrap(), config);
    }
}

//! Configuration module for sitepulse.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Targets are configured as a JSON array so that per-target polling
//! intervals can be expressed without a config file.

use std::env;
use std::fmt;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration error types. All of these fail fast: a target with an
/// invalid configuration is never admitted into the monitor.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("polling interval must be greater than zero")]
    InvalidInterval,
    #[error("window duration {duration_ms}ms is shorter than the polling interval {interval_ms}ms")]
    WindowTooShort { duration_ms: u64, interval_ms: u64 },
    #[error("invalid target url: {0}")]
    InvalidTargetUrl(String),
    #[error("invalid targets JSON: {0}")]
    InvalidTargetsJson(#[from] serde_json::Error),
}

/// A normalized endpoint identifier (scheme + host + path).
///
/// Two spellings of the same endpoint (with or without a default port,
/// with query strings or fragments) normalize to the same identifier, so
/// per-target state is keyed consistently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    /// Parse and normalize an endpoint address.
    ///
    /// A missing scheme defaults to `http://`.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let with_scheme = if input.contains("://") {
            input.to_string()
        } else {
            format!("http://{}", input)
        };

        let url = Url::parse(&with_scheme)
            .map_err(|_| ConfigError::InvalidTargetUrl(input.to_string()))?;
        let host = url
            .host_str()
            .ok_or_else(|| ConfigError::InvalidTargetUrl(input.to_string()))?;

        let mut normalized = format!("{}://{}", url.scheme(), host);
        if let Some(port) = url.port() {
            normalized.push_str(&format!(":{}", port));
        }
        normalized.push_str(url.path());

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A display window: how much history it covers and how often a
/// statistics snapshot for it is published.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WindowSpec {
    pub duration_ms: u64,
    pub emit_period_ms: u64,
}

/// A monitored endpoint with its polling interval.
#[derive(Debug, Clone)]
pub struct TargetConfig {
    pub id: TargetId,
    pub interval_ms: u64,
}

/// Raw shape of one entry in the `SITEPULSE_TARGETS` JSON array.
#[derive(Debug, Deserialize)]
struct RawTarget {
    url: String,
    #[serde(default)]
    interval_ms: Option<u64>,
}

/// Monitor configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Default polling interval for targets that do not set their own.
    pub polling_interval_ms: u64,
    /// Probe timeout; a probe exceeding it is recorded as a down observation.
    pub probe_timeout_ms: u64,
    /// Display windows published to the presentation sink.
    pub display_windows: Vec<WindowSpec>,
    /// Duration of the dedicated alarm-evaluation window.
    pub alarm_window_ms: u64,
    /// Availability percentage below which the alarm is raised.
    pub alarm_threshold: f64,
    /// Monitored endpoints.
    pub targets: Vec<TargetConfig>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            polling_interval_ms: 10_000,
            probe_timeout_ms: 5_000,
            display_windows: vec![
                // 10 minutes of history, refreshed every 10 seconds
                WindowSpec {
                    duration_ms: 10 * 60 * 1000,
                    emit_period_ms: 10 * 1000,
                },
                // 1 hour of history, refreshed every minute
                WindowSpec {
                    duration_ms: 60 * 60 * 1000,
                    emit_period_ms: 60 * 1000,
                },
            ],
            alarm_window_ms: 2 * 60 * 1000,
            alarm_threshold: 80.0,
            targets: Vec::new(),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SITEPULSE_POLLING_INTERVAL_MS`: default polling interval (default: 10000)
    /// - `SITEPULSE_TIMEOUT_MS`: probe timeout (default: 5000)
    /// - `SITEPULSE_ALARM_WINDOW_MS`: alarm window duration (default: 120000)
    /// - `SITEPULSE_ALARM_THRESHOLD`: availability threshold percent (default: 80)
    /// - `SITEPULSE_TARGETS`: JSON array, e.g.
    ///   `[{"url":"https://example.com","interval_ms":1000}]`
    pub fn load() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        if let Ok(s) = env::var("SITEPULSE_POLLING_INTERVAL_MS") {
            if let Ok(v) = s.parse() {
                if v == 0 {
                    return Err(ConfigError::InvalidInterval);
                }
                cfg.polling_interval_ms = v;
            }
        }

        if let Ok(s) = env::var("SITEPULSE_TIMEOUT_MS") {
            if let Ok(v) = s.parse() {
                cfg.probe_timeout_ms = v;
            }
        }

        if let Ok(s) = env::var("SITEPULSE_ALARM_WINDOW_MS") {
            if let Ok(v) = s.parse() {
                cfg.alarm_window_ms = v;
            }
        }

        if let Ok(s) = env::var("SITEPULSE_ALARM_THRESHOLD") {
            if let Ok(v) = s.parse() {
                cfg.alarm_threshold = v;
            }
        }

        if let Ok(s) = env::var("SITEPULSE_TARGETS") {
            cfg.targets = parse_targets(&s, cfg.polling_interval_ms)?;
        }

        Ok(cfg)
    }

    /// Check that a target polled at `interval_ms` fits every configured
    /// window: the interval must be positive and each window must hold at
    /// least one observation. The same derivation the windows apply at
    /// construction, surfaced here so a bad target is rejected before any
    /// probe loop starts.
    pub fn validate_interval(&self, interval_ms: u64) -> Result<(), ConfigError> {
        if interval_ms == 0 {
            return Err(ConfigError::InvalidInterval);
        }

        for window in &self.display_windows {
            if window.duration_ms / interval_ms == 0 {
                return Err(ConfigError::WindowTooShort {
                    duration_ms: window.duration_ms,
                    interval_ms,
                });
            }
        }

        if self.alarm_window_ms / interval_ms == 0 {
            return Err(ConfigError::WindowTooShort {
                duration_ms: self.alarm_window_ms,
                interval_ms,
            });
        }

        Ok(())
    }
}

fn parse_targets(json: &str, default_interval_ms: u64) -> Result<Vec<TargetConfig>, ConfigError> {
    let raw: Vec<RawTarget> = serde_json::from_str(json)?;

    let mut targets = Vec::with_capacity(raw.len());
    for entry in raw {
        let interval_ms = entry.interval_ms.unwrap_or(default_interval_ms);
        if interval_ms == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        targets.push(TargetConfig {
            id: TargetId::parse(&entry.url)?,
            interval_ms,
        });
    }

    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = MonitorConfig::default();
        assert_eq!(cfg.polling_interval_ms, 10_000);
        assert_eq!(cfg.probe_timeout_ms, 5_000);
        assert_eq!(cfg.display_windows.len(), 2);
        assert_eq!(cfg.alarm_window_ms, 120_000);
        assert_eq!(cfg.alarm_threshold, 80.0);
        assert!(cfg.targets.is_empty());
    }

    #[test]
    fn test_load_rejects_zero_interval_env() {
        env::set_var("SITEPULSE_POLLING_INTERVAL_MS", "0");
        let res = MonitorConfig::load();
        env::remove_var("SITEPULSE_POLLING_INTERVAL_MS");

        assert!(matches!(res, Err(ConfigError::InvalidInterval)));
    }

    #[test]
    fn test_validate_interval() {
        let cfg = MonitorConfig::default();
        assert!(cfg.validate_interval(10_000).is_ok());
        assert!(matches!(
            cfg.validate_interval(0),
            Err(ConfigError::InvalidInterval)
        ));

        // The 2-minute alarm window cannot hold a single observation
        // at a 5-minute polling interval.
        assert!(matches!(
            cfg.validate_interval(300_000),
            Err(ConfigError::WindowTooShort { .. })
        ));

        let mut cfg = cfg;
        cfg.display_windows[0].duration_ms = 5_000;
        assert!(matches!(
            cfg.validate_interval(10_000),
            Err(ConfigError::WindowTooShort { .. })
        ));
    }

    #[test]
    fn test_target_id_normalization() {
        let id = TargetId::parse("https://example.com:443/status?q=1#frag").unwrap();
        // 443 is the default https port, so it is dropped
        assert_eq!(id.as_str(), "https://example.com/status");

        let id = TargetId::parse("example.com").unwrap();
        assert_eq!(id.as_str(), "http://example.com/");

        let id = TargetId::parse("http://example.com:8080/api").unwrap();
        assert_eq!(id.as_str(), "http://example.com:8080/api");
    }

    #[test]
    fn test_target_id_rejects_garbage() {
        assert!(TargetId::parse("http://").is_err());
        assert!(TargetId::parse("").is_err());
    }

    #[test]
    fn test_parse_targets_json() {
        let json = r#"[
            {"url": "https://example.com", "interval_ms": 1000},
            {"url": "example.org/health"}
        ]"#;
        let targets = parse_targets(json, 10_000).unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].interval_ms, 1000);
        assert_eq!(targets[1].interval_ms, 10_000);
        assert_eq!(targets[1].id.as_str(), "http://example.org/health");
    }

    #[test]
    fn test_parse_targets_rejects_zero_interval() {
        let json = r#"[{"url": "https://example.com", "interval_ms": 0}]"#;
        assert!(matches!(
            parse_targets(json, 10_000),
            Err(ConfigError::InvalidInterval)
        ));
    }

    #[test]
    fn test_parse_targets_rejects_bad_json() {
        assert!(matches!(
            parse_targets("not json", 10_000),
            Err(ConfigError::InvalidTargetsJson(_))
        ));
    }
}

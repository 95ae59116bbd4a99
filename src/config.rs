//! YAML configuration loading and default-resolution.
//!
//! The raw, `serde`-deserialized `Config` carries optional per-monitor/per-group
//! overrides; `Config::resolve()` merges them against `monitoring`'s
//! defaults, following `monitor ?? group ?? default` for each of interval,
//! timeout, and (for HTTP monitors) the SSL expiry warning window.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;
use crate::model::MonitorSpec;

/// A duration parsed from the `Ns|Nm|Nh` suffix grammar.
#[derive(Debug, Clone, Copy)]
pub struct Dur(pub Duration);

pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let input = input.trim();
    let (number, unit) = input.split_at(input.len().saturating_sub(1));
    let value: u64 = number
        .parse()
        .map_err(|_| ConfigError::InvalidDuration(input.to_string()))?;
    let seconds = match unit {
        "s" => value,
        "m" => value * 60,
        "h" => value * 3600,
        _ => return Err(ConfigError::InvalidDuration(input.to_string())),
    };
    Ok(Duration::from_secs(seconds))
}

impl<'de> Deserialize<'de> for Dur {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_duration(&raw)
            .map(Dur)
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    #[serde(default = "default_api_bind")]
    pub bind: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    pub auth_token: Option<String>,
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

fn default_api_bind() -> String {
    "127.0.0.1".to_string()
}
fn default_api_port() -> u16 {
    8080
}
fn default_true() -> bool {
    true
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: default_api_bind(),
            port: default_api_port(),
            auth_token: None,
            enable_cors: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Storage backend selector. `badger` selects the embedded, persistent
/// `sled`-backed KV store; `noop` disables persistence entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    Badger,
    Noop,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackendKind,
    #[serde(default = "default_storage_path")]
    pub path: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default = "default_true")]
    pub enable_aggregation: bool,
}

fn default_storage_backend() -> StorageBackendKind {
    StorageBackendKind::Badger
}
fn default_storage_path() -> String {
    "./data".to_string()
}
fn default_retention_days() -> u32 {
    30
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: default_storage_backend(),
            path: default_storage_path(),
            retention_days: default_retention_days(),
            enable_aggregation: true,
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retention_days < 1 || self.retention_days > 3650 {
            return Err(ConfigError::InvalidStorage(
                "retention_days must be between 1 and 3650".to_string(),
            ));
        }
        Ok(())
    }
}

/// One monitor entry as written in YAML: common fields plus the
/// kind-specific spec, flattened.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorEntry {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub interval: Option<Dur>,
    pub timeout: Option<Dur>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(flatten)]
    pub spec: MonitorSpec,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    pub interval: Option<Dur>,
    #[serde(default)]
    pub monitors: Vec<MonitorEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringConfig {
    #[serde(default = "default_interval")]
    pub default_interval: Dur,
    #[serde(default = "default_timeout")]
    pub default_timeout: Dur,
    #[serde(default = "default_ssl_warning_days", rename = "defaultSSLCertExpiryWarningDays")]
    pub default_ssl_cert_expiry_warning_days: u32,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

fn default_interval() -> Dur {
    Dur(Duration::from_secs(30))
}
fn default_timeout() -> Dur {
    Dur(Duration::from_secs(5))
}
fn default_ssl_warning_days() -> u32 {
    14
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

pub fn read_config_file(path: &str) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })
}

/// A monitor entry with interval/timeout/ssl_warning_days already merged
/// against its group and the top-level defaults.
#[derive(Debug, Clone)]
pub struct ResolvedMonitorEntry {
    pub name: String,
    pub group: String,
    pub enabled: bool,
    pub interval: Duration,
    pub timeout: Duration,
    pub ssl_warning_days: u32,
    pub labels: HashMap<String, String>,
    pub spec: MonitorSpec,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub api: ApiConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
    pub storage: StorageConfig,
    pub monitors: Vec<ResolvedMonitorEntry>,
}

impl Config {
    pub fn resolve(self) -> Result<ResolvedConfig, ConfigError> {
        self.storage.validate()?;

        let default_interval = self.monitoring.default_interval.0;
        let default_timeout = self.monitoring.default_timeout.0;
        let default_ssl_warning_days = self.monitoring.default_ssl_cert_expiry_warning_days;

        let mut monitors = Vec::new();
        for group in &self.monitoring.groups {
            let group_interval = group.interval.map(|d| d.0);
            for entry in &group.monitors {
                let interval = entry
                    .interval
                    .map(|d| d.0)
                    .or(group_interval)
                    .unwrap_or(default_interval);
                let timeout = entry.timeout.map(|d| d.0).unwrap_or(default_timeout);
                let ssl_warning_days = match &entry.spec {
                    MonitorSpec::Http {
                        ssl_warning_days, ..
                    } => ssl_warning_days.unwrap_or(default_ssl_warning_days),
                    _ => default_ssl_warning_days,
                };

                monitors.push(ResolvedMonitorEntry {
                    name: entry.name.clone(),
                    group: group.name.clone(),
                    enabled: entry.enabled,
                    interval,
                    timeout,
                    ssl_warning_days,
                    labels: entry.labels.clone(),
                    spec: entry.spec.clone(),
                });
            }
        }

        Ok(ResolvedConfig {
            api: self.server,
            logging: self.logging,
            metrics: self.metrics,
            storage: self.storage,
            monitors,
        })
    }
}

pub fn read_and_resolve(path: impl AsRef<Path>) -> Result<ResolvedConfig, ConfigError> {
    let path = path.as_ref().to_string_lossy().to_string();
    read_config_file(&path)?.resolve()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration_suffixes() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert!(parse_duration("30").is_err());
        assert!(parse_duration("30x").is_err());
    }

    #[test]
    fn resolves_interval_from_monitor_then_group_then_default() {
        let yaml = r#"
monitoring:
  defaultInterval: "30s"
  defaultTimeout: "5s"
  defaultSSLCertExpiryWarningDays: 14
  groups:
    - name: web
      interval: "15s"
      monitors:
        - name: a
          kind: tcp
          target: "example.com:443"
        - name: b
          kind: tcp
          target: "example.com:80"
          interval: "5s"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let resolved = config.resolve().unwrap();
        let a = resolved.monitors.iter().find(|m| m.name == "a").unwrap();
        let b = resolved.monitors.iter().find(|m| m.name == "b").unwrap();
        assert_eq!(a.interval, Duration::from_secs(15));
        assert_eq!(b.interval, Duration::from_secs(5));
        assert_eq!(a.timeout, Duration::from_secs(5));
    }

    #[test]
    fn reads_camel_case_monitor_and_storage_fields() {
        let yaml = r#"
storage:
  retentionDays: 90
  enableAggregation: false
monitoring:
  groups:
    - name: web
      monitors:
        - name: a
          kind: http
          url: "https://example.com"
          expectedStatus: 201
        - name: b
          kind: dns
          server: "1.1.1.1"
          queryName: "example.com"
          queryType: AAAA
          expectedResponse: "93.184.216.34"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.storage.retention_days, 90);
        assert!(!config.storage.enable_aggregation);

        let resolved = config.resolve().unwrap();
        let a = resolved.monitors.iter().find(|m| m.name == "a").unwrap();
        match &a.spec {
            MonitorSpec::Http { expected_status, .. } => assert_eq!(*expected_status, 201),
            other => panic!("expected Http spec, got {other:?}"),
        }

        let b = resolved.monitors.iter().find(|m| m.name == "b").unwrap();
        match &b.spec {
            MonitorSpec::Dns {
                query_name,
                query_type,
                expected_response,
                ..
            } => {
                assert_eq!(query_name, "example.com");
                assert_eq!(*query_type, crate::model::DnsQueryType::Aaaa);
                assert_eq!(expected_response.as_deref(), Some("93.184.216.34"));
            }
            other => panic!("expected Dns spec, got {other:?}"),
        }
    }
}

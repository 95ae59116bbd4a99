//! Monitor manager: turns a `ResolvedConfig` into the set of monitors the
//! scheduler will run.
//!
//! Disabled entries are dropped silently. A malformed entry is recorded and
//! skipped; load continues with the rest. A duplicate name aborts the whole
//! load, since the scheduler and storage layers both key off monitor name.

use tracing::warn;

use crate::config::ResolvedConfig;
use crate::error::{ConfigError, ValidationError};
use crate::model::{Monitor, MonitorSpec};

pub struct LoadedMonitors {
    pub monitors: Vec<Monitor>,
    pub invalid: Vec<ValidationError>,
}

pub fn load_monitors(resolved: ResolvedConfig) -> Result<LoadedMonitors, ConfigError> {
    let mut monitors = Vec::new();
    let mut invalid = Vec::new();
    let mut seen_names = std::collections::HashSet::new();

    for entry in resolved.monitors {
        if !entry.enabled {
            continue;
        }

        if let Err(reason) = validate_spec(&entry.spec) {
            warn!(monitor = %entry.name, %reason, "skipping invalid monitor");
            invalid.push(ValidationError::InvalidMonitor {
                name: entry.name,
                reason,
            });
            continue;
        }

        if !seen_names.insert(entry.name.clone()) {
            return Err(ConfigError::DuplicateMonitorName(entry.name));
        }

        monitors.push(Monitor {
            name: entry.name,
            group: entry.group,
            enabled: entry.enabled,
            interval: entry.interval,
            timeout: entry.timeout,
            ssl_warning_days: entry.ssl_warning_days,
            labels: entry.labels,
            spec: entry.spec,
        });
    }

    Ok(LoadedMonitors { monitors, invalid })
}

fn validate_spec(spec: &MonitorSpec) -> Result<(), String> {
    match spec {
        MonitorSpec::Http { url, .. } => {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!("url '{url}' must start with http:// or https://"));
            }
        }
        MonitorSpec::Tcp { target } => {
            if target.rsplit_once(':').is_none() {
                return Err(format!("target '{target}' must be host:port"));
            }
        }
        MonitorSpec::Dns {
            server,
            query_name,
            ..
        } => {
            if server.is_empty() {
                return Err("server must not be empty".to_string());
            }
            if query_name.is_empty() {
                return Err("query_name must not be empty".to_string());
            }
        }
        MonitorSpec::Ping { target, .. } => {
            if target.is_empty() {
                return Err("target must not be empty".to_string());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiConfig, LoggingConfig, MetricsConfig, ResolvedMonitorEntry, StorageConfig};
    use std::collections::HashMap;
    use std::time::Duration;

    fn base_config(monitors: Vec<ResolvedMonitorEntry>) -> ResolvedConfig {
        ResolvedConfig {
            api: ApiConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
            storage: StorageConfig::default(),
            monitors,
        }
    }

    fn tcp_entry(name: &str, enabled: bool) -> ResolvedMonitorEntry {
        ResolvedMonitorEntry {
            name: name.to_string(),
            group: "web".to_string(),
            enabled,
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(5),
            ssl_warning_days: 14,
            labels: HashMap::new(),
            spec: MonitorSpec::Tcp {
                target: "example.com:443".to_string(),
            },
        }
    }

    #[test]
    fn skips_disabled_entries() {
        let loaded = load_monitors(base_config(vec![tcp_entry("a", false)])).unwrap();
        assert!(loaded.monitors.is_empty());
    }

    #[test]
    fn rejects_duplicate_names() {
        let result = load_monitors(base_config(vec![tcp_entry("a", true), tcp_entry("a", true)]));
        assert_matches::assert_matches!(result, Err(ConfigError::DuplicateMonitorName(_)));
    }

    #[test]
    fn records_invalid_entries_without_aborting() {
        let mut bad = tcp_entry("bad", true);
        bad.spec = MonitorSpec::Tcp {
            target: "no-port-here".to_string(),
        };
        let loaded = load_monitors(base_config(vec![bad, tcp_entry("good", true)])).unwrap();
        assert_eq!(loaded.monitors.len(), 1);
        assert_eq!(loaded.invalid.len(), 1);
    }
}

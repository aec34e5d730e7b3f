//! Optional configuration file.
//!
//! The only configurable surface is the list of custom metrics: counters
//! keyed by name, matched against each record's message with a regex filter.
//!
//! ```yaml
//! custom_metrics:
//!   - name: errors
//!     type: count
//!     filter: "regex:ERROR"
//! ```

use crate::error::PulseError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub custom_metrics: Vec<CustomMetricConfig>,
}

/// One declared custom metric, as written in the config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CustomMetricConfig {
    pub name: String,
    /// Metric type; only "count" is supported.
    #[serde(rename = "type")]
    pub kind: String,
    /// Filter expression, currently `regex:<pattern>`.
    pub filter: String,
}

/// Load the configuration file.
///
/// With an explicit path the file must exist; otherwise `pulsewatch.{yaml,
/// toml,json}` in the current directory is tried and its absence is fine.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let builder = match path {
        Some(p) => config::Config::builder().add_source(config::File::from(p)),
        None => config::Config::builder()
            .add_source(config::File::with_name("pulsewatch").required(false)),
    };

    let cfg: Config = builder.build()?.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    for metric in &cfg.custom_metrics {
        if metric.name.is_empty() {
            anyhow::bail!("Custom metric name cannot be empty");
        }
        if metric.kind != "count" {
            anyhow::bail!(
                "Custom metric '{}' has unsupported type '{}' (only 'count' is supported)",
                metric.name,
                metric.kind
            );
        }
        if !metric.filter.starts_with("regex:") {
            anyhow::bail!(
                "Custom metric '{}' has unsupported filter '{}' (expected 'regex:<pattern>')",
                metric.name,
                metric.filter
            );
        }
    }

    Ok(())
}

/// A custom metric with its filter compiled, ready for the engine.
#[derive(Debug, Clone)]
pub struct CustomMetric {
    pub name: String,
    pub pattern: Regex,
}

impl CustomMetric {
    pub fn compile(cfg: &CustomMetricConfig) -> Result<Self, PulseError> {
        let pattern = cfg.filter.strip_prefix("regex:").ok_or_else(|| {
            PulseError::Config(format!(
                "custom metric '{}': filter must start with 'regex:'",
                cfg.name
            ))
        })?;

        Ok(Self {
            name: cfg.name.clone(),
            pattern: Regex::new(pattern)?,
        })
    }
}

/// Compile every declared metric, failing fast on the first bad one.
pub fn compile_custom_metrics(cfg: &Config) -> Result<Vec<CustomMetric>, PulseError> {
    cfg.custom_metrics.iter().map(CustomMetric::compile).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_metric(name: &str, filter: &str) -> CustomMetricConfig {
        CustomMetricConfig {
            name: name.to_string(),
            kind: "count".to_string(),
            filter: filter.to_string(),
        }
    }

    #[test]
    fn test_validate_rejects_unknown_type() {
        let cfg = Config {
            custom_metrics: vec![CustomMetricConfig {
                kind: "gauge".to_string(),
                ..count_metric("errors", "regex:ERROR")
            }],
        };

        let result = validate_config(&cfg);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("unsupported type"));
    }

    #[test]
    fn test_validate_rejects_bad_filter_prefix() {
        let cfg = Config {
            custom_metrics: vec![count_metric("errors", "glob:*ERROR*")],
        };

        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn test_compile_matches() {
        let metric = CustomMetric::compile(&count_metric("errors", "regex:ERROR")).unwrap();
        assert_eq!(metric.name, "errors");
        assert!(metric.pattern.is_match("2024-01-01 ERROR boom"));
        assert!(!metric.pattern.is_match("2024-01-01 INFO ok"));
    }

    #[test]
    fn test_compile_rejects_invalid_regex() {
        let result = CustomMetric::compile(&count_metric("bad", "regex:("));
        assert!(result.is_err());
    }
}

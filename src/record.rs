//! Core data types shared across the pipeline.
//!
//! A [`LogRecord`] is the parsed form of one raw line; everything downstream
//! of the parser (store, engine, snapshots) speaks in these types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Debug,
    Unknown,
}

impl LogLevel {
    /// Parse a level string, case-insensitively.
    ///
    /// `WARN`/`WARNING` map to [`LogLevel::Warn`], `ERR`/`ERROR` to
    /// [`LogLevel::Error`]; anything unrecognized is [`LogLevel::Unknown`].
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "INFO" => Self::Info,
            "WARN" | "WARNING" => Self::Warn,
            "ERROR" | "ERR" => Self::Error,
            "DEBUG" => Self::Debug,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Debug => "DEBUG",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single parsed log line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Wall-clock instant of the event; `Utc::now()` when the line carried
    /// no parseable timestamp.
    pub timestamp: DateTime<Utc>,
    /// Original or extracted payload text.
    pub message: String,
    pub level: LogLevel,
    /// HTTP-style status code; 0 when the line carried none.
    pub status_code: u16,
    /// Request latency; zero when the line carried none.
    pub latency: Duration,
    /// Request path; may be empty.
    pub endpoint: String,
    /// All attributes the parser extracted, keyed by their original names.
    pub fields: HashMap<String, serde_json::Value>,
}

impl LogRecord {
    /// A record with only a timestamp, message and level; the shape the
    /// fallback parser produces.
    pub fn bare(timestamp: DateTime<Utc>, message: String, level: LogLevel) -> Self {
        Self {
            timestamp,
            message,
            level,
            status_code: 0,
            latency: Duration::ZERO,
            endpoint: String::new(),
            fields: HashMap::new(),
        }
    }

    /// True for records that count toward the error rate.
    pub fn is_error(&self) -> bool {
        self.status_code >= 400
    }

    /// True for records whose latency participates in percentiles:
    /// successful (status < 400) with a positive latency.
    pub fn has_valid_latency(&self) -> bool {
        self.status_code < 400 && self.latency > Duration::ZERO
    }
}

/// A detected anomaly. Append-only for the lifetime of the engine; consumers
/// apply their own dedup policy if they need one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub message: String,
}

/// One sample of the trend series, captured at each published tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendPoint {
    pub rps: f64,
    pub p95_latency: Duration,
    pub error_rate: f64,
}

/// Aggregates over one window at one instant.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WindowedMetrics {
    /// Requests per second over the window's horizon; 0 for the synthetic
    /// `all` window.
    pub rps: f64,
    /// Percent of records with status >= 400, over all records.
    pub error_rate: f64,
    pub p50_latency: Duration,
    pub p90_latency: Duration,
    pub p95_latency: Duration,
    pub p99_latency: Duration,
    pub total_requests: u64,
    pub total_errors: u64,
    pub top_endpoints: HashMap<String, u64>,
    /// Counts bucketed by the status code's hundreds digit
    /// (`1xx`..`5xx`, `Other`).
    pub status_code_distribution: HashMap<String, u64>,
    /// User-declared counters, keyed by metric name.
    pub custom: HashMap<String, u64>,
}

/// An immutable metrics snapshot, published at most once per tick.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub windows: BTreeMap<String, WindowedMetrics>,
    pub anomalies: Vec<Anomaly>,
    pub start_time: DateTime<Utc>,
    pub trend_history: Vec<TrendPoint>,
}

impl MetricsSnapshot {
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            windows: BTreeMap::new(),
            anomalies: Vec::new(),
            start_time,
            trend_history: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parse_aliases() {
        assert_eq!(LogLevel::parse("warning"), LogLevel::Warn);
        assert_eq!(LogLevel::parse("WARN"), LogLevel::Warn);
        assert_eq!(LogLevel::parse("err"), LogLevel::Error);
        assert_eq!(LogLevel::parse("Error"), LogLevel::Error);
        assert_eq!(LogLevel::parse("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::parse("notice"), LogLevel::Unknown);
    }

    #[test]
    fn test_error_boundary_at_400() {
        let mut record = LogRecord::bare(Utc::now(), "x".into(), LogLevel::Info);
        record.status_code = 399;
        assert!(!record.is_error());
        record.status_code = 400;
        assert!(record.is_error());
    }

    #[test]
    fn test_latency_validity() {
        let mut record = LogRecord::bare(Utc::now(), "x".into(), LogLevel::Info);
        record.status_code = 200;
        assert!(!record.has_valid_latency());
        record.latency = Duration::from_millis(1);
        assert!(record.has_valid_latency());
        record.status_code = 500;
        assert!(!record.has_valid_latency());
    }
}
